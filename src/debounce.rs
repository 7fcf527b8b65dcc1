use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error};

use crate::{Result, StorageError};

enum Signal {
    Trigger,
    Shutdown,
}

/// A single-slot delayed task.
///
/// [`trigger`](Self::trigger) arms a timer of `window` length on a
/// dedicated worker thread; triggering again before it fires restarts the
/// timer instead of queueing a second run. When the timer elapses the
/// action runs once. Dropping the debouncer cancels a pending run and joins
/// the worker.
pub struct Debouncer {
    tx: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Starts a worker thread named `name` running `action` at most once
    /// per `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new<F>(name: &str, window: Duration, action: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        // One slot: a trigger that finds the slot full is already covered
        // by the one waiting in it.
        let (tx, rx) = channel::bounded::<Signal>(1);
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(rx, window, action))
            .map_err(|e| StorageError::Worker(e.to_string()))?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Schedules the action, restarting the timer if it is already armed.
    pub fn trigger(&self) {
        match self.tx.try_send(Signal::Trigger) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => error!("Debounce worker is gone"),
        }
    }
}

fn run<F: Fn()>(rx: Receiver<Signal>, window: Duration, action: F) {
    loop {
        match rx.recv() {
            Ok(Signal::Trigger) => {}
            Ok(Signal::Shutdown) | Err(_) => break,
        }
        // Armed: wait for a quiet window.
        loop {
            match rx.recv_timeout(window) {
                Ok(Signal::Trigger) => continue,
                Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("Debounce worker stopping with a pending run");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if panic::catch_unwind(AssertUnwindSafe(&action)).is_err() {
                        error!("Debounced action panicked, continuing");
                    }
                    break;
                }
            }
        }
    }
    debug!("Debounce worker stopped");
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        // Blocks only until the worker drains the slot; a full slot means
        // the worker is about to read it.
        let _ = self.tx.send(Signal::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Debounce worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(window: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let debouncer = Debouncer::new("debounce-test", window, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (debouncer, runs)
    }

    #[test]
    fn burst_collapses_into_one_run() {
        let (debouncer, runs) = counting(Duration::from_millis(100));
        for _ in 0..50 {
            debouncer.trigger();
        }
        thread::sleep(Duration::from_millis(400));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nothing_runs_without_trigger() {
        let (_debouncer, runs) = counting(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn separate_bursts_run_separately() {
        let (debouncer, runs) = counting(Duration::from_millis(50));
        debouncer.trigger();
        thread::sleep(Duration::from_millis(300));
        debouncer.trigger();
        thread::sleep(Duration::from_millis(300));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_cancels_pending_run() {
        let (debouncer, runs) = counting(Duration::from_millis(500));
        debouncer.trigger();
        drop(debouncer);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_action_keeps_worker_alive() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let debouncer = Debouncer::new("debounce-panic", Duration::from_millis(20), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first run fails");
            }
        })
        .unwrap();
        debouncer.trigger();
        thread::sleep(Duration::from_millis(200));
        debouncer.trigger();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
