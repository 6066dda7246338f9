//! Integration tests for crash-safe iteration log persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ralph::stream::{LogStatus, StreamPersister};

fn read_log(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn log_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("0.log")
}

#[tokio::test]
async fn buffers_until_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("Hello, ", false).await;
    persister.append("World!", false).await;
    assert!(!path.exists(), "no file before the first flush");

    persister.flush().await;
    let content = read_log(&path);
    assert!(content.starts_with("# Iteration Log\n"));
    assert!(content.contains("Status: in_progress\n---\n"));
    assert!(content.ends_with("Hello, World!"));

    persister.destroy().await;
}

#[tokio::test]
async fn empty_flush_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.flush().await;
    assert!(!path.exists());

    persister.destroy().await;
}

#[tokio::test]
async fn header_is_written_once_across_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("first\n", false).await;
    persister.flush().await;
    persister.append("second\n", false).await;
    persister.flush().await;

    let content = read_log(&path);
    assert_eq!(content.matches("# Iteration Log").count(), 1);
    assert!(content.contains("first\nsecond\n"));

    persister.destroy().await;
}

#[tokio::test]
async fn header_timestamp_is_rfc3339_utc() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("x", false).await;
    persister.flush().await;

    let content = read_log(&path);
    let ts_line = content.lines().nth(1).unwrap();
    let value = ts_line.strip_prefix("Timestamp: ").unwrap();
    assert!(value.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(value).is_ok());

    persister.destroy().await;
}

#[tokio::test]
async fn event_boundary_flushes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("assistant said a thing\n", true).await;
    assert!(read_log(&path).ends_with("assistant said a thing\n"));

    persister.destroy().await;
}

#[tokio::test]
async fn timer_flushes_buffered_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::with_flush_interval(&path, Duration::from_millis(20));

    persister.append("slow drip", false).await;
    assert!(!path.exists());

    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if path.exists() {
            break;
        }
    }
    assert!(read_log(&path).ends_with("slow drip"));

    persister.destroy().await;
}

#[tokio::test]
async fn stderr_lines_are_prefixed() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("stdout line\n", false).await;
    persister.append_stderr("warning: odd input\nanother\n").await;
    persister.flush().await;

    let content = read_log(&path);
    assert!(content.contains("stdout line\n[stderr] warning: odd input\n[stderr] another\n"));

    persister.destroy().await;
}

#[tokio::test]
async fn complete_writes_footer_with_exit_code_and_duration() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("body\n", false).await;
    persister.complete(0, 1500).await;

    let content = read_log(&path);
    assert!(content.contains("body\n"));
    assert!(content.ends_with("\n---\nStatus: completed\nExit Code: 0\nDuration: 1500ms\n"));
    assert_eq!(persister.status().await, LogStatus::Completed);
    assert!(persister.is_finalized().await);
}

#[tokio::test]
async fn header_still_says_in_progress_after_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("body\n", false).await;
    persister.complete(0, 10).await;

    let content = read_log(&path);
    let header = content.split("---").next().unwrap();
    assert!(header.contains("Status: in_progress"));
}

#[tokio::test]
async fn abort_persists_unflushed_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("partial output before ctrl-c", false).await;
    persister.abort("SIGINT").await;

    let content = read_log(&path);
    assert!(content.contains("partial output before ctrl-c"));
    assert!(content.ends_with("\n---\nStatus: aborted\nInterrupted: SIGINT\n"));
    assert_eq!(persister.status().await, LogStatus::Aborted);
}

#[tokio::test]
async fn abort_with_empty_body_still_writes_header_and_footer() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.abort("SIGTERM").await;

    let content = read_log(&path);
    assert!(content.starts_with("# Iteration Log\n"));
    assert!(content.ends_with("\n---\nStatus: aborted\nInterrupted: SIGTERM\n"));
}

#[tokio::test]
async fn crash_records_fault_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("got this far\n", false).await;
    persister.crash("agent process vanished").await;

    let content = read_log(&path);
    assert!(content.contains("got this far\n"));
    assert!(content.ends_with("\n---\nStatus: crashed\nError: agent process vanished\n"));
    assert_eq!(persister.status().await, LogStatus::Crashed);
}

#[tokio::test]
async fn finalization_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("body\n", false).await;
    persister.complete(0, 100).await;
    persister.abort("SIGINT").await;
    persister.complete(1, 999).await;

    let content = read_log(&path);
    assert_eq!(content.matches("Status: completed").count(), 1);
    assert!(!content.contains("Status: aborted"));
    assert!(!content.contains("Duration: 999ms"));
    assert_eq!(persister.status().await, LogStatus::Completed);
}

#[tokio::test]
async fn appends_after_finalization_are_ignored_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("body\n", false).await;
    persister.complete(0, 100).await;

    persister.append("late arrival", true).await;
    let content = read_log(&path);
    assert!(!content.contains("late arrival"));
    assert!(content.ends_with("Duration: 100ms\n"));
}

#[tokio::test]
async fn two_persisters_do_not_cross_contaminate() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("0.log");
    let path_b = dir.path().join("1.log");
    let a = StreamPersister::new(&path_a);
    let b = StreamPersister::new(&path_b);

    a.append("only in a\n", false).await;
    b.append("only in b\n", false).await;
    a.complete(0, 1).await;
    b.complete(1, 2).await;

    let content_a = read_log(&path_a);
    let content_b = read_log(&path_b);
    assert!(content_a.contains("only in a") && !content_a.contains("only in b"));
    assert!(content_b.contains("only in b") && !content_b.contains("only in a"));
    assert!(content_a.contains("Exit Code: 0"));
    assert!(content_b.contains("Exit Code: 1"));
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions").join("abc").join("0.log");
    let persister = StreamPersister::new(&path);

    persister.append("nested\n", false).await;
    persister.complete(0, 1).await;

    assert!(read_log(&path).contains("nested"));
}

#[tokio::test]
async fn destroy_writes_no_footer() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir);
    let persister = StreamPersister::new(&path);

    persister.append("body\n", false).await;
    persister.flush().await;
    persister.destroy().await;

    let content = read_log(&path);
    assert!(content.contains("body\n"));
    assert!(!content.contains("Status: completed"));
    assert!(!content.contains("Status: aborted"));
    assert!(!persister.is_finalized().await);
}

#[tokio::test]
async fn unwritable_path_degrades_to_noop() {
    // A directory at the log path makes every open fail.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0.log");
    std::fs::create_dir(&path).unwrap();

    let persister = StreamPersister::new(&path);
    persister.append("doomed\n", true).await;
    persister.flush().await;
    persister.complete(0, 1).await;

    assert!(path.is_dir());
    assert_eq!(persister.status().await, LogStatus::Completed);
    assert!(persister.is_finalized().await);
}
