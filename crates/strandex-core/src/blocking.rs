//! Offloading blocking work (PDF parsing, filesystem writes) from the
//! async runtime.

use crate::Error;

/// Execute a blocking closure on Tokio's blocking threadpool.
///
/// A panic inside `f` is reported as an error instead of unwinding
/// into the caller.
///
/// # Example
///
/// ```ignore
/// let document = run_blocking(move || extractor.extract(&path)).await??;
/// ```
pub async fn run_blocking<F, T>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Unknown(format!("Blocking task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_catches_panic() {
        let result: Result<(), Error> = run_blocking(|| panic!("broken pdf")).await;
        assert!(result.is_err());
    }
}
