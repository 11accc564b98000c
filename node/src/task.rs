//! Cancellable background threads.
//!
//! A periodic task waits on its stop channel between ticks instead of
//! sleeping, so a stop request interrupts the wait immediately rather than
//! being noticed one interval later. Stopping joins the thread. A tick that
//! is blocked in socket I/O still has to return on its own; closing the
//! socket is the way to unblock it.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a named background thread.
#[derive(Debug)]
pub struct BackgroundTask {
    name: String,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Run `tick` now and then once per `interval` until stopped.
    pub fn spawn_periodic<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || loop {
            tick();
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;
        tracing::debug!(target: "task", task = name, interval_ms = interval.as_millis() as u64, "task started");
        Ok(Self {
            name: name.to_string(),
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Run `job` once on its own thread.
    pub fn spawn_once<F>(name: &str, job: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(job)?;
        Ok(Self {
            name: name.to_string(),
            stop: None,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the task and join it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(target: "task", task = %self.name, "task panicked");
            } else {
                tracing::debug!(target: "task", task = %self.name, "task stopped");
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_stop_interrupts_long_interval() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut task = BackgroundTask::spawn_periodic("test-long", Duration::from_secs(3600), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        // first tick runs immediately
        while ticks.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let started = Instant::now();
        task.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(task.is_finished());
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_periodic_ticks_repeat() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut task = BackgroundTask::spawn_periodic("test-fast", Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        while ticks.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        task.stop();
        let after = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_once_runs_to_completion() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        let mut task = BackgroundTask::spawn_once("test-once", move || {
            flag.store(1, Ordering::SeqCst);
        })
        .unwrap();
        task.stop();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(task.name(), "test-once");
    }
}
