//! Filesystem Access Monitor
//!
//! Records every file-open the OS reports below a set of watch roots while a
//! subprocess runs. Raw capture only: paths are neither normalized nor
//! filtered here.
//!
//! Architecture:
//! ```text
//! inotify → notify event loop → std mpsc → listener thread (owns buffer)
//!                                                   │
//!                      stop(): grace sleep → drop watcher → join → Vec<AccessEvent>
//! ```
//!
//! The buffer is owned by the listener thread and only handed over once the
//! thread has finished, so it is never read while an append is in progress.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::PackError;

mod event;


pub use event::AccessEvent;

/// Delay between subprocess exit and flushing, covering delivery lag.
pub const DEFAULT_GRACE_MS: u64 = 250;

/// Upper bound on buffered events for one monitor.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub grace: Duration,
    pub capacity: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// What the listener thread hands back on stop.
#[derive(Default)]
struct Capture {
    events: Vec<AccessEvent>,
    /// Set when events may have been lost.
    fault: Option<String>,
}

/// Scoped access monitor: one instance per monitored subprocess.
///
/// Always end with [`AccessMonitor::stop`]; a monitor dropped without it
/// (early return, panic) still detaches its watches and joins its thread.
pub struct AccessMonitor {
    /// Watcher handle (dropping it closes the event channel)
    watcher: Option<RecommendedWatcher>,
    listener: Option<JoinHandle<Capture>>,
    options: MonitorOptions,
}

impl AccessMonitor {
    /// Begin observing `roots` recursively.
    pub fn start(roots: &[PathBuf], options: MonitorOptions) -> Result<Self, PackError> {
        ensure_open_events_supported()?;

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(|e| PackError::monitor(format!("cannot create watcher: {e}")))?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| PackError::monitor(format!("cannot watch `{}`: {e}", root.display())))?;
            crate::debug!("monitor"; "watching {}", root.display());
        }

        let capacity = options.capacity;
        let listener = std::thread::Builder::new()
            .name("arxify-monitor".into())
            .spawn(move || listen(rx, capacity))
            .map_err(|e| PackError::monitor(format!("cannot spawn listener: {e}")))?;

        Ok(Self {
            watcher: Some(watcher),
            listener: Some(listener),
            options,
        })
    }

    /// Flush pending events and end observation.
    ///
    /// Blocks for the grace period, detaches all watches, then waits for the
    /// listener to drain the channel.
    pub fn stop(mut self) -> Result<Vec<AccessEvent>, PackError> {
        std::thread::sleep(self.options.grace);
        let capture = self.shutdown()?;
        if let Some(fault) = capture.fault {
            return Err(PackError::MonitorUnavailable(fault));
        }
        crate::debug!("monitor"; "captured {} access events", capture.events.len());
        Ok(capture.events)
    }

    fn shutdown(&mut self) -> Result<Capture, PackError> {
        // Dropping the watcher ends its event loop, which drops the sender.
        drop(self.watcher.take());
        match self.listener.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PackError::monitor("listener thread panicked")),
            None => Ok(Capture::default()),
        }
    }
}

impl Drop for AccessMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Run `f` under a monitor and return its result with the captured events.
///
/// The monitor is stopped whatever `f` returns.
pub fn observe<T>(
    roots: &[PathBuf],
    options: MonitorOptions,
    f: impl FnOnce() -> T,
) -> Result<(T, Vec<AccessEvent>), PackError> {
    let monitor = AccessMonitor::start(roots, options)?;
    let value = f();
    let events = monitor.stop()?;
    Ok((value, events))
}

/// Listener loop: append until every sender is gone.
fn listen(rx: mpsc::Receiver<notify::Result<notify::Event>>, capacity: usize) -> Capture {
    let mut capture = Capture::default();

    while let Ok(result) = rx.recv() {
        if capture.fault.is_some() {
            continue; // keep draining so the sender never blocks
        }
        match result {
            Ok(event) if event.need_rescan() => {
                capture.fault = Some("kernel event queue overflowed, accesses were lost".into());
            }
            Ok(event) => {
                let events = event::from_notify(&event, Instant::now());
                if capture.events.len() + events.len() > capacity {
                    capture.fault = Some(format!("more than {capacity} access events in one pass"));
                } else {
                    capture.events.extend(events);
                }
            }
            Err(e) => capture.fault = Some(format!("watcher error: {e}")),
        }
    }

    capture
}

/// Only inotify reports open events; other backends would silently record
/// nothing.
fn ensure_open_events_supported() -> Result<(), PackError> {
    if cfg!(any(target_os = "linux", target_os = "android")) {
        Ok(())
    } else {
        Err(PackError::monitor(format!(
            "file-open events are not reported by the {} watcher backend (Linux inotify required)",
            std::env::consts::OS
        )))
    }
}
