//! Small helpers for logging, the file system and shutdown signals.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last character boundary at or before `max`
/// bytes, with `"…(+N bytes)"` appended.
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// `ip_data_8_8_8_8.json` for `8.8.8.8`; colons in IPv6 addresses are
/// replaced the same way.
pub fn output_file_name(ip: &str) -> String {
    format!("ip_data_{}.json", ip.trim().replace(['.', ':'], "_"))
}

pub fn output_path(output_dir: &str, ip: &str) -> PathBuf {
    Path::new(output_dir).join(output_file_name(ip))
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = Path::new(path).join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Resolve when `signal` fires.
///
/// A signal that cannot be listened for (its future resolves with `Err`)
/// never resolves here, so callers racing work against it keep running
/// instead of cancelling at once.
///
/// # Arguments
///
/// * `signal` - e.g. `tokio::signal::ctrl_c()`
pub async fn shutdown_on(signal: impl Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for shutdown signal; continuing without it");
            futures::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 1 would split it.
        assert_eq!(truncate_for_log("éa", 1), "…(+3 bytes)");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("8.8.8.8"), "ip_data_8_8_8_8.json");
        assert_eq!(
            output_file_name("2001:db8::1"),
            "ip_data_2001_db8__1.json"
        );
    }

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let fired = tokio::time::timeout(
            Duration::from_millis(100),
            shutdown_on(async { Ok(()) }),
        )
        .await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_on_unavailable_signal_never_fires() {
        let fired = tokio::time::timeout(
            Duration::from_millis(20),
            shutdown_on(async { Err(io::Error::other("no signal handler")) }),
        )
        .await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }
}
