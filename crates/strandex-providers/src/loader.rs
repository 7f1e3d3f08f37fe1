//! Construction of the local llama.cpp backend.
//!
//! The loader either attaches to a running `llama-server` or spawns one for
//! the duration of a single agent run. A spawned server is killed when the
//! provider that owns it is dropped.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use strandex_core::{BackendLoader, Error, Provider};

use crate::llama::LlamaServerProvider;

const DEFAULT_CTX: u32 = 4096;
const DEFAULT_PORT: u16 = 8089;
const DEFAULT_SERVER_BIN: &str = "llama-server";
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Backend construction parameters, read once at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlamaConfig {
    /// GGUF model file. Required unless `server_url` points at a running server.
    pub model_path: Option<PathBuf>,
    /// Context window in tokens.
    pub ctx: u32,
    /// Compute threads for the backend.
    pub threads: usize,
    /// Layers offloaded to the GPU.
    pub gpu_layers: u32,
    /// Let the server write its own logs to stderr.
    pub verbose: bool,
    /// Executable used to spawn the server.
    pub server_bin: String,
    /// Attach to this server instead of spawning one.
    pub server_url: Option<String>,
    /// Port for a spawned server.
    pub port: u16,
    /// How long to wait for a spawned server to load the model.
    pub startup_timeout: Duration,
}

/// All cores but two, at least one.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
        .saturating_sub(2)
        .max(1)
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            ctx: DEFAULT_CTX,
            threads: default_threads(),
            gpu_layers: 0,
            verbose: false,
            server_bin: DEFAULT_SERVER_BIN.to_string(),
            server_url: None,
            port: DEFAULT_PORT,
            startup_timeout: Duration::from_secs(120),
        }
    }
}

impl LlamaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_ctx(mut self, ctx: u32) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_gpu_layers(mut self, gpu_layers: u32) -> Self {
        self.gpu_layers = gpu_layers;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_server_bin(mut self, server_bin: impl Into<String>) -> Self {
        self.server_bin = server_bin.into();
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Command-line arguments for a spawned `llama-server`.
    pub fn server_args(&self, model_path: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            model_path.display().to_string(),
            "-c".to_string(),
            self.ctx.to_string(),
            "-t".to_string(),
            self.threads.to_string(),
            "-ngl".to_string(),
            self.gpu_layers.to_string(),
            "--host".to_string(),
            "127.0.0.1".to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ];
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args
    }

    /// The model path, checked to be set and to exist.
    pub fn validated_model_path(&self) -> Result<PathBuf, Error> {
        let path = self.model_path.clone().ok_or_else(|| {
            Error::config("Set STRANDEX_LLAMA_MODEL_PATH to the local GGUF model file.")
        })?;
        if !path.is_file() {
            return Err(Error::config(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// A `llama-server` child process owned by a provider.
pub struct LlamaServerProcess {
    child: Child,
}

/// Fails if something already listens on `port`, so a stale server is never
/// mistaken for the one about to be spawned.
pub fn ensure_port_free(port: u16) -> Result<(), Error> {
    std::net::TcpListener::bind(("127.0.0.1", port))
        .map(drop)
        .map_err(|e| {
            Error::backend(format!(
                "Port {} is already in use ({}); stop the other server or set STRANDEX_LLAMA_PORT",
                port, e
            ))
        })
}

impl LlamaServerProcess {
    fn spawn(config: &LlamaConfig) -> Result<Self, Error> {
        let model_path = config.validated_model_path()?;
        ensure_port_free(config.port)?;
        let args = config.server_args(&model_path);
        info!(
            bin = %config.server_bin,
            model = %model_path.display(),
            ctx = config.ctx,
            threads = config.threads,
            gpu_layers = config.gpu_layers,
            "Starting llama-server"
        );

        let stderr = if config.verbose {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let child = Command::new(&config.server_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::backend(format!("Failed to start {}: {}", config.server_bin, e))
            })?;

        Ok(Self { child })
    }

    /// Fails if the process has already exited.
    fn check_alive(&mut self) -> Result<(), Error> {
        match self.child.try_wait() {
            Ok(Some(status)) => Err(Error::backend(format!(
                "llama-server exited during startup ({})",
                status
            ))),
            Ok(None) => Ok(()),
            Err(e) => Err(Error::backend(format!("Failed to poll llama-server: {}", e))),
        }
    }
}

/// [`BackendLoader`] for the llama.cpp server backend.
pub struct LlamaLoader {
    config: LlamaConfig,
}

impl LlamaLoader {
    pub fn new(config: LlamaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LlamaConfig {
        &self.config
    }

    async fn wait_until_healthy(
        &self,
        base_url: &str,
        mut process: Option<&mut LlamaServerProcess>,
    ) -> Result<(), Error> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", base_url);
        let attempts = (self.config.startup_timeout.as_millis()
            / HEALTH_POLL_INTERVAL.as_millis())
        .max(1) as u64;

        for attempt in 0..attempts {
            if let Some(process) = process.as_deref_mut() {
                process.check_alive()?;
            }

            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt, "llama-server is healthy");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(attempt, status = response.status().as_u16(), "llama-server not ready");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "llama-server not reachable yet");
                }
            }

            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }

        Err(Error::backend(format!(
            "llama-server at {} did not become ready within {:?}",
            base_url, self.config.startup_timeout
        )))
    }
}

#[async_trait]
impl BackendLoader for LlamaLoader {
    async fn load(&self) -> Result<Arc<dyn Provider>, Error> {
        if let Some(url) = &self.config.server_url {
            if self.config.model_path.is_some() {
                warn!("STRANDEX_LLAMA_URL is set; the model path is ignored");
            }
            let provider = LlamaServerProvider::new(url.as_str());
            self.wait_until_healthy(provider.base_url(), None).await?;
            info!(url = %provider.base_url(), "Connected to llama-server");
            return Ok(Arc::new(provider));
        }

        let mut process = LlamaServerProcess::spawn(&self.config)?;
        let base_url = format!("http://127.0.0.1:{}", self.config.port);
        self.wait_until_healthy(&base_url, Some(&mut process)).await?;
        process.check_alive()?;
        info!(url = %base_url, "llama-server ready");

        Ok(Arc::new(
            LlamaServerProvider::new(base_url).with_process(process),
        ))
    }
}
