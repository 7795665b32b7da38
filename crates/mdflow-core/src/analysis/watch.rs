use super::AnalysisError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Completion handshake between a producer (the simulation) and a watcher:
/// the producer sets the flag after its last frame is fully written, the
/// watcher then runs one final sweep and stops. Cloning shares the flag.
#[derive(Clone, Default)]
pub struct CompletionToken(Arc<AtomicBool>);

impl CompletionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Polls a trajectory directory and hands every numbered frame file to a
/// handler in increasing step order, exactly once each.
///
/// While the producer is still running, the newest file is held back: it
/// may be mid-write. Once the completion token is set, a final sweep
/// processes everything that remains.
pub struct TrajectoryWatcher {
    dir: PathBuf,
    poll_interval: Duration,
}

impl TrajectoryWatcher {
    pub fn new<P: AsRef<Path>>(dir: P, poll_interval: Duration) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            poll_interval,
        }
    }

    fn numbered_files(&self) -> Result<Vec<(u64, PathBuf)>, AnalysisError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let step = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok());
            if let Some(step) = step {
                files.push((step, path));
            }
        }
        files.sort_unstable_by_key(|(step, _)| *step);
        Ok(files)
    }

    /// Watches until the token is set and the final sweep completes. The
    /// handler error aborts the watch immediately.
    pub fn watch<F>(&self, token: &CompletionToken, mut handle: F) -> Result<(), AnalysisError>
    where
        F: FnMut(&Path) -> Result<(), AnalysisError>,
    {
        info!(dir = %self.dir.display(), "Watching trajectory directory");
        let mut processed: BTreeSet<u64> = BTreeSet::new();

        loop {
            let finished = token.is_finished();
            let mut pending = self.numbered_files()?;
            if !finished {
                // The producer may still be writing the newest file.
                pending.pop();
            }

            for (step, path) in pending {
                if processed.insert(step) {
                    debug!(step, "Processing frame file");
                    handle(&path)?;
                }
            }

            if finished {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        info!(frames = processed.len(), "Trajectory watch finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"frame").unwrap();
    }

    #[test]
    fn final_sweep_processes_everything_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        // Names chosen so lexicographic order differs from numeric order.
        for name in ["100.trj", "20.trj", "3.trj"] {
            touch(dir.path(), name);
        }
        touch(dir.path(), "notes.txt");

        let token = CompletionToken::new();
        token.finish();

        let seen = Mutex::new(Vec::new());
        let watcher = TrajectoryWatcher::new(dir.path(), Duration::from_millis(1));
        watcher
            .watch(&token, |path| {
                seen.lock()
                    .unwrap()
                    .push(path.file_name().unwrap().to_string_lossy().into_owned());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["3.trj", "20.trj", "100.trj"]
        );
    }

    #[test]
    fn files_appearing_during_the_watch_are_picked_up_once() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "0.trj");
        touch(dir.path(), "10.trj");

        let token = CompletionToken::new();
        let producer_token = token.clone();
        let dir_path = dir.path().to_path_buf();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            fs::write(dir_path.join("20.trj"), b"frame").unwrap();
            producer_token.finish();
        });

        let seen = Mutex::new(Vec::new());
        let watcher = TrajectoryWatcher::new(dir.path(), Duration::from_millis(1));
        watcher
            .watch(&token, |path| {
                seen.lock()
                    .unwrap()
                    .push(path.file_stem().unwrap().to_string_lossy().into_owned());
                Ok(())
            })
            .unwrap();
        producer.join().unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), ["0", "10", "20"]);
    }

    #[test]
    fn handler_error_aborts_the_watch() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "0.trj");

        let token = CompletionToken::new();
        token.finish();

        let watcher = TrajectoryWatcher::new(dir.path(), Duration::from_millis(1));
        let err = watcher
            .watch(&token, |_| {
                Err(AnalysisError::Plot("handler refused".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Plot(_)));
    }
}
