//! Orphaned-artifact sweeper.
//!
//! Failsafe, not the primary cleanup path: the controller removes a job's
//! staged artifacts at terminal states. The sweeper reaps what a crashed
//! or killed task left behind — any file in the staging areas older than
//! the retirement age. It runs once at startup and then on a fixed
//! interval.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

/// Delete files in `dirs` whose modification time is older than `max_age`.
/// Returns how many were removed. Missing directories are skipped.
pub fn sweep_once(dirs: &[&Path], max_age: Duration) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(age) = file_age(&path, now) else {
                continue;
            };
            if age > max_age {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), age_secs = age.as_secs(), "orphan reaped");
                        removed += 1;
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "orphan removal failed"),
                }
            }
        }
    }

    if removed > 0 {
        info!(removed, "orphaned staged artifacts reaped");
    }
    removed
}

fn file_age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    now.duration_since(modified).ok()
}

/// Sweep forever on `interval`. Spawn as a background task.
pub async fn run_periodic(dirs: Vec<PathBuf>, max_age: Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let borrowed: Vec<&Path> = dirs.iter().map(PathBuf::as_path).collect();
        sweep_once(&borrowed, max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("live.pdf"), b"x").unwrap();

        let removed = sweep_once(&[dir.path()], Duration::from_secs(3600));
        assert_eq!(removed, 0);
        assert!(dir.path().join("live.pdf").exists());
    }

    #[test]
    fn test_stale_files_are_reaped() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("stale.pdf");
        std::fs::write(&stale, b"x").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let removed = sweep_once(&[dir.path()], Duration::from_millis(1));
        assert_eq!(removed, 1);
        assert!(!stale.exists());
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let removed = sweep_once(&[Path::new("/nonexistent/flatpress")], Duration::ZERO);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_subdirectories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        sweep_once(&[dir.path()], Duration::from_millis(1));
        assert!(dir.path().join("keep").exists());
    }
}
