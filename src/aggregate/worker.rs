use super::batch::{progress_interval, StreamAggregator};
use crate::error::{ReconError, Result};
use crate::report::BatchReport;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info};

/// Receives progress and per-file errors from a running batch.
///
/// `on_progress` is called after every file; `status` is only set at the
/// batch-size dependent reporting interval and on the last file.
pub trait BatchObserver {
    fn on_progress(&self, _current: usize, _total: usize, _status: Option<&str>) {}

    fn on_file_error(&self, _file: &Path, _error: &ReconError) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Observer that logs status lines and file errors through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_progress(&self, current: usize, total: usize, status: Option<&str>) {
        if let Some(status) = status {
            info!(current, total, "{}", status);
        }
    }

    fn on_file_error(&self, file: &Path, error: &ReconError) {
        error!(file = %file.display(), kind = error.kind(), "{}", error);
    }
}

/// Event forwarded by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Progress {
        current: usize,
        total: usize,
        status: Option<String>,
    },
    FileError {
        file: PathBuf,
        kind: &'static str,
        message: String,
    },
}

/// Observer that forwards events to a channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::Sender<BatchEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::Receiver<BatchEvent>) {
        let (sender, receiver) = mpsc::channel();
        (ChannelObserver { sender }, receiver)
    }
}

impl BatchObserver for ChannelObserver {
    fn on_progress(&self, current: usize, total: usize, status: Option<&str>) {
        // A dropped receiver only means nobody is listening
        let _ = self.sender.send(BatchEvent::Progress {
            current,
            total,
            status: status.map(str::to_string),
        });
    }

    fn on_file_error(&self, file: &Path, error: &ReconError) {
        let _ = self.sender.send(BatchEvent::FileError {
            file: file.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Cooperative cancellation flag, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress shared between the worker and the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub current: usize,
    pub total: usize,
    pub status: Option<String>,
    pub finished: bool,
}

/// Run a batch on the current thread.
pub fn run_batch(
    aggregator: &StreamAggregator,
    files: &[PathBuf],
    observer: &dyn BatchObserver,
    cancel: &CancelToken,
) -> BatchReport {
    let total = files.len();
    let interval = progress_interval(total);
    let mut run = aggregator.begin(total);
    let mut cancelled = false;

    for (index, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(processed = index, total, "batch cancelled");
            cancelled = true;
            break;
        }

        if let Err(err) = run.process_file(path) {
            observer.on_file_error(path, &err);
        }

        let current = index + 1;
        let status = (current % interval == 0 || current == total)
            .then(|| format!("Processed {}/{} files", current, total));
        observer.on_progress(current, total, status.as_deref());
    }

    run.finish(cancelled)
}

/// Handle to a batch running on a worker thread
pub struct BatchHandle {
    progress: Arc<Mutex<ProgressSnapshot>>,
    cancel: CancelToken,
    handle: thread::JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Latest progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        match self.progress.lock() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Ask the worker to stop after the file in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and take its report.
    pub fn join(self) -> Result<BatchReport> {
        self.handle.join().map_err(|_| ReconError::WorkerPanicked)
    }
}

/// Updates the shared snapshot, then forwards to the caller's observer
struct SnapshotObserver<O> {
    progress: Arc<Mutex<ProgressSnapshot>>,
    inner: O,
}

impl<O: BatchObserver> BatchObserver for SnapshotObserver<O> {
    fn on_progress(&self, current: usize, total: usize, status: Option<&str>) {
        if let Ok(mut snapshot) = self.progress.lock() {
            snapshot.current = current;
            snapshot.total = total;
            if let Some(status) = status {
                snapshot.status = Some(status.to_string());
            }
        }
        self.inner.on_progress(current, total, status);
    }

    fn on_file_error(&self, file: &Path, error: &ReconError) {
        self.inner.on_file_error(file, error);
    }
}

/// Run a batch on a dedicated worker thread.
///
/// The worker owns the aggregator and all per-batch state. The caller only
/// shares the progress snapshot and receives the report from [`BatchHandle::join`].
pub fn spawn_batch<O>(aggregator: StreamAggregator, files: Vec<PathBuf>, observer: O) -> BatchHandle
where
    O: BatchObserver + Send + 'static,
{
    let progress = Arc::new(Mutex::new(ProgressSnapshot {
        total: files.len(),
        ..ProgressSnapshot::default()
    }));
    let cancel = CancelToken::new();

    let observer = SnapshotObserver {
        progress: Arc::clone(&progress),
        inner: observer,
    };
    let progress_thread = Arc::clone(&progress);
    let cancel_thread = cancel.clone();

    let handle = thread::spawn(move || {
        let report = run_batch(&aggregator, &files, &observer, &cancel_thread);
        if let Ok(mut snapshot) = progress_thread.lock() {
            snapshot.finished = true;
        }
        report
    });

    BatchHandle {
        progress,
        cancel,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BatchConfig;
    use crate::catalog::CategoryMap;
    use std::cell::RefCell;
    use std::fs;

    fn aggregator() -> StreamAggregator {
        StreamAggregator::from_parts(
            vec!["CompoundID".to_string(), "Species".to_string()],
            CategoryMap::new(),
            vec![],
            BatchConfig::default(),
        )
    }

    fn corpus(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("f{:02}.json", i));
                fs::write(&path, format!(r#"{{"compound_id": "{}"}}"#, i)).unwrap();
                path
            })
            .collect()
    }

    #[derive(Default)]
    struct Recorder {
        statuses: RefCell<Vec<Option<String>>>,
        errors: RefCell<Vec<String>>,
    }

    impl BatchObserver for Recorder {
        fn on_progress(&self, _current: usize, _total: usize, status: Option<&str>) {
            self.statuses.borrow_mut().push(status.map(str::to_string));
        }

        fn on_file_error(&self, _file: &Path, error: &ReconError) {
            self.errors.borrow_mut().push(error.kind().to_string());
        }
    }

    #[test]
    fn test_run_batch_reports_progress_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = corpus(dir.path(), 11);
        files.insert(3, dir.path().join("absent.json"));

        let recorder = Recorder::default();
        let report = run_batch(&aggregator(), &files, &recorder, &CancelToken::new());

        assert_eq!(report.processed, 12);
        assert_eq!(report.failed, 1);
        assert_eq!(*recorder.errors.borrow(), vec!["io"]);

        let statuses = recorder.statuses.borrow();
        assert_eq!(statuses.len(), 12);
        // every 10th file and the last one carry a status line
        assert_eq!(statuses.iter().filter(|s| s.is_some()).count(), 2);
        assert_eq!(statuses[9].as_deref(), Some("Processed 10/12 files"));
        assert_eq!(statuses[11].as_deref(), Some("Processed 12/12 files"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let files = corpus(dir.path(), 3);
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = run_batch(&aggregator(), &files, &NoopObserver, &cancel);
        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
    }

    /// Cancels the batch once `after` files are done
    struct CancelAfter {
        after: usize,
        token: CancelToken,
    }

    impl BatchObserver for CancelAfter {
        fn on_progress(&self, current: usize, _total: usize, _status: Option<&str>) {
            if current == self.after {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn test_cancel_mid_batch_stops_after_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = corpus(dir.path(), 10);
        let token = CancelToken::new();
        let observer = CancelAfter {
            after: 4,
            token: token.clone(),
        };

        let report = run_batch(&aggregator(), &files, &observer, &token);
        assert!(report.cancelled);
        assert_eq!(report.processed, 4);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.field("compoundid").unwrap().matched, 4);
    }

    #[test]
    fn test_spawned_batch_completes() {
        let dir = tempfile::tempdir().unwrap();
        let files = corpus(dir.path(), 5);
        let (observer, events) = ChannelObserver::new();

        let handle = spawn_batch(aggregator(), files, observer);
        let report = handle.join().unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.field("compoundid").unwrap().matched, 5);

        let events: Vec<BatchEvent> = events.iter().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events.last(),
            Some(&BatchEvent::Progress {
                current: 5,
                total: 5,
                status: Some("Processed 5/5 files".to_string()),
            })
        );
    }

    #[test]
    fn test_spawned_batch_snapshot_and_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let files = corpus(dir.path(), 50);

        let handle = spawn_batch(aggregator(), files, NoopObserver);
        handle.cancel();
        let snapshot_total = handle.progress().total;
        let report = handle.join().unwrap();

        assert_eq!(snapshot_total, 50);
        assert!(report.cancelled || report.processed == 50);
        assert!(report.processed <= 50);
    }
}
