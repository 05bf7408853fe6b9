//! Per-worker, per-start, append-only log file contract: a startup header,
//! the raw PTY bytes, and an end marker with total bytes written on crash
//! or cancellation.

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub fn log_path(logs_dir: &Path, worker_id: &str, started_at_epoch_secs: i64) -> PathBuf {
    logs_dir.join(format!("{worker_id}_{started_at_epoch_secs}.log"))
}

pub fn write_header(path: &Path, worker_id: &str, role: &str, project_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        f,
        "=== worker {worker_id} ({role}) started in {} ===",
        project_path.display()
    )?;
    Ok(())
}

pub fn write_end_marker(path: &Path, total_bytes: u64, reason: &str) -> std::io::Result<()> {
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "=== worker ended ({reason}), {total_bytes} bytes written ===")?;
    Ok(())
}

/// Background task: copy bytes from `reader` (the PTY master) to the log
/// file until either side closes. Returns total bytes copied.
pub async fn copy_to_log<R>(mut reader: R, log_path: PathBuf) -> std::io::Result<u64>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut log_file = File::options().create(true).append(true).open(&log_path).await?;
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        log_file.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    log_file.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_includes_worker_id_and_timestamp() {
        let path = log_path(Path::new("/tmp/logs"), "worker-dev-1", 1000);
        assert_eq!(path, PathBuf::from("/tmp/logs/worker-dev-1_1000.log"));
    }

    #[test]
    fn header_and_end_marker_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.log");
        write_header(&path, "worker-dev-1", "dev", Path::new("/tmp/p")).unwrap();
        write_end_marker(&path, 128, "crashed").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("worker-dev-1"));
        assert!(contents.contains("128 bytes written"));
    }

    #[tokio::test]
    async fn copy_to_log_streams_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.log");
        let data = b"hello pty output".to_vec();
        let cursor = std::io::Cursor::new(data.clone());
        let total = copy_to_log(cursor, path.clone()).await.unwrap();
        assert_eq!(total, data.len() as u64);
        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, data);
    }
}
