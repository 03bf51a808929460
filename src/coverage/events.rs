use std::io::Read;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use super::scanner::{CoverageScanner, MatchEvent, ScanError, ScanSummary};

/// Default number of events buffered ahead of a slow consumer
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Lazy sequence of match events from a scan running on a worker thread.
///
/// The worker blocks once `capacity` events are waiting, so memory stays
/// bounded no matter how far ahead the decoder could run. Dropping the
/// iterator stops the worker at its next group boundary and waits for it to
/// exit, so the underlying reader is closed once `drop` returns.
pub struct MatchEvents {
    receiver: Option<Receiver<MatchEvent>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<ScanSummary, ScanError>>>,
}

impl MatchEvents {
    pub(crate) fn spawn<R>(scanner: CoverageScanner, reader: R, capacity: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let worker = std::thread::spawn(move || {
            scanner.scan_cancellable(reader, &flag, |event| {
                // A closed channel means the consumer went away
                match sender.send(event) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                }
            })
        });

        Self {
            receiver: Some(receiver),
            cancel,
            worker: Some(worker),
        }
    }

    /// Ask the worker to stop. Events already buffered can still be read.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Stop consuming and wait for the scan's outcome.
    ///
    /// If the iterator was exhausted this is the result of the full scan;
    /// otherwise the scan is cancelled and its summary has `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns the `ScanError` the scan failed with, if any.
    pub fn finish(mut self) -> Result<ScanSummary, ScanError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<ScanSummary, ScanError> {
        self.cancel();
        // Unblocks a worker waiting on a full channel
        self.receiver = None;

        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            None => Ok(ScanSummary {
                cancelled: true,
                ..ScanSummary::default()
            }),
        }
    }
}

impl Iterator for MatchEvents {
    type Item = MatchEvent;

    fn next(&mut self) -> Option<MatchEvent> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for MatchEvents {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!("Match event stream dropped; stopping coverage scan");
            self.cancel();
            self.receiver = None;
            // Never resume a worker panic here; it would abort an unwinding thread
            if worker.join().is_err() {
                warn!("Coverage scan worker panicked");
            }
        }
    }
}
