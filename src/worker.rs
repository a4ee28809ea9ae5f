use crate::crawler::{ProgressReporter, ScanOptions, ScanProgress, TreeScanner};
use crate::deletion::{delete_many, Outcome};
use crate::error::ScanError;
use crate::node::ScanResult;
use log::warn;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

pub enum ScanEvent {
    Progress(ScanProgress),
    Completed(Result<ScanResult, ScanError>),
}

/// Releases the in-flight flag when the job ends, panicking or not.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs scans and deletions off the calling thread, one job at a time.
///
/// A request made while a job is in flight is rejected with
/// [`ScanError::Busy`] rather than queued.
#[derive(Clone, Default)]
pub struct ScanWorker {
    busy: Arc<AtomicBool>,
}

impl ScanWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<BusyGuard, ScanError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(self.busy.clone()))
            .map_err(|_| {
                warn!("request rejected: a job is already running");
                ScanError::Busy
            })
    }

    pub fn start_scan(&self, root: PathBuf, options: ScanOptions) -> Result<ScanHandle, ScanError> {
        let guard = self.acquire()?;
        let (tx, rx) = mpsc::channel::<ScanEvent>();

        thread::spawn(move || {
            let progress_tx = tx.clone();
            let reporter: ProgressReporter = Arc::new(move |progress: ScanProgress| {
                let _ = progress_tx.send(ScanEvent::Progress(progress));
            });

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                TreeScanner::new(options).scan_with_progress(&root, Some(reporter))
            }));

            let event = match result {
                Ok(scan_result) => ScanEvent::Completed(scan_result),
                Err(_) => ScanEvent::Completed(Err(ScanError::WorkerPanicked)),
            };

            drop(guard);
            let _ = tx.send(event);
        });

        Ok(ScanHandle {
            rx,
            finished: Cell::new(false),
        })
    }

    pub fn start_delete(&self, paths: Vec<PathBuf>) -> Result<DeleteHandle, ScanError> {
        let guard = self.acquire()?;
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| delete_many(&paths)))
                .map_err(|_| ScanError::WorkerPanicked);
            drop(guard);
            let _ = tx.send(result);
        });

        Ok(DeleteHandle {
            rx,
            finished: Cell::new(false),
        })
    }
}

pub struct ScanHandle {
    rx: Receiver<ScanEvent>,
    finished: Cell<bool>,
}

impl ScanHandle {
    /// Next pending event without blocking. Returns `None` for good once
    /// `Completed` has been handed out.
    pub fn try_recv(&self) -> Option<ScanEvent> {
        if self.finished.get() {
            return None;
        }
        let event = match self.rx.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => ScanEvent::Completed(Err(ScanError::WorkerPanicked)),
        };
        if matches!(event, ScanEvent::Completed(_)) {
            self.finished.set(true);
        }
        Some(event)
    }

    pub fn wait(self) -> Result<ScanResult, ScanError> {
        self.wait_with(|_| {})
    }

    /// Block until the scan finishes, handing each progress event to `on_progress`.
    pub fn wait_with<F: FnMut(&ScanProgress)>(self, mut on_progress: F) -> Result<ScanResult, ScanError> {
        loop {
            match self.rx.recv() {
                Ok(ScanEvent::Progress(progress)) => on_progress(&progress),
                Ok(ScanEvent::Completed(result)) => return result,
                Err(_) => return Err(ScanError::WorkerPanicked),
            }
        }
    }
}

pub struct DeleteHandle {
    rx: Receiver<Result<Vec<Outcome>, ScanError>>,
    finished: Cell<bool>,
}

impl DeleteHandle {
    /// The batch result once it is ready. Handed out only once.
    pub fn try_result(&self) -> Option<Result<Vec<Outcome>, ScanError>> {
        if self.finished.get() {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ScanError::WorkerPanicked),
        };
        self.finished.set(true);
        Some(result)
    }

    pub fn wait(self) -> Result<Vec<Outcome>, ScanError> {
        self.rx.recv().unwrap_or(Err(ScanError::WorkerPanicked))
    }
}
