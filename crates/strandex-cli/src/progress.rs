//! Terminal progress for agent runs: a spinner while the backend loads,
//! a bar over chunks, and streamed summary tokens on stderr.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use strandex_core::PipelineObserver;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed}]";
const BAR_TEMPLATE: &str = "{bar:30.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

fn spinner(hidden: bool, message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    pb.set_style(style);
    pb.set_message(message.into());
    if !hidden {
        pb.enable_steady_tick(Duration::from_millis(80));
    }
    pb
}

fn chunk_bar(hidden: bool, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS);
    pb.set_style(style);
    pb
}

/// Pipeline observer that draws progress on stderr.
pub struct TerminalObserver {
    active: Mutex<Option<ProgressBar>>,
    streamed: Mutex<String>,
    echo_tokens: bool,
    hidden: bool,
    stream_started: AtomicBool,
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            streamed: Mutex::new(String::new()),
            echo_tokens: true,
            hidden: false,
            stream_started: AtomicBool::new(false),
        }
    }

    /// Observer that draws nothing, for tests and non-terminal output.
    pub fn hidden() -> Self {
        Self {
            echo_tokens: false,
            hidden: true,
            ..Self::new()
        }
    }

    /// Text received through streamed tokens so far.
    pub fn streamed_text(&self) -> String {
        self.streamed
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Current bar position and length, if a bar is shown.
    pub fn position(&self) -> Option<(u64, Option<u64>)> {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().map(|pb| (pb.position(), pb.length())))
    }

    fn replace(&self, next: Option<ProgressBar>) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.take() {
                previous.finish_and_clear();
            }
            *active = next;
        }
    }

    fn with_active(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut active) = self.active.lock() {
            f(&mut active);
        }
    }
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for TerminalObserver {
    fn backend_loading(&self) {
        self.replace(Some(spinner(self.hidden, "Loading model...")));
    }

    fn backend_ready(&self) {
        self.replace(None);
    }

    fn chunk_started(&self, index: usize, total: usize) {
        let hidden = self.hidden;
        self.with_active(|active| {
            let reuse = active
                .as_ref()
                .is_some_and(|pb| pb.length() == Some(total as u64));
            if !reuse {
                if let Some(previous) = active.take() {
                    previous.finish_and_clear();
                }
                *active = Some(chunk_bar(hidden, total));
            }
            if let Some(pb) = active.as_ref() {
                pb.set_position(index.saturating_sub(1) as u64);
                pb.set_message(format!("Summarizing chunk {}/{}", index, total));
            }
        });
    }

    fn reduce_started(&self, chunks: usize) {
        self.replace(Some(spinner(
            self.hidden,
            format!("Combining {} chunk summaries...", chunks),
        )));
    }

    fn token(&self, fragment: &str) {
        if !self.stream_started.swap(true, Ordering::SeqCst) {
            self.replace(None);
        }
        if let Ok(mut streamed) = self.streamed.lock() {
            streamed.push_str(fragment);
        }
        if self.echo_tokens {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{}", fragment);
            let _ = stderr.flush();
        }
    }

    fn finished(&self) {
        self.replace(None);
        if self.echo_tokens && self.stream_started.load(Ordering::SeqCst) {
            eprintln!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_bar_tracks_progress() {
        let observer = TerminalObserver::hidden();
        observer.backend_loading();
        observer.backend_ready();
        assert!(observer.position().is_none());

        observer.chunk_started(1, 3);
        assert_eq!(observer.position(), Some((0, Some(3))));
        observer.chunk_started(3, 3);
        assert_eq!(observer.position(), Some((2, Some(3))));

        observer.reduce_started(3);
        assert_eq!(observer.position().map(|(_, len)| len), Some(None));

        observer.finished();
        assert!(observer.position().is_none());
    }

    #[test]
    fn test_tokens_collected() {
        let observer = TerminalObserver::hidden();
        observer.reduce_started(2);
        observer.token("Hello ");
        observer.token("world");
        assert!(observer.position().is_none());
        assert_eq!(observer.streamed_text(), "Hello world");
        observer.finished();
    }
}
