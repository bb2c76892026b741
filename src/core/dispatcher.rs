//! Record dispatch to writers
//!
//! Each writer of a snapshot gets one route. A direct route writes on the
//! calling thread under the writer's lock. A queued route hands the record to
//! a bounded channel drained in FIFO order by one worker thread that owns the
//! writer; producers block while the channel is full so no record is lost.

use super::error::LoggerError;
use super::fields::RequiredFields;
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::LoggerMetrics;
use super::report::SharedReporter;
use super::writer::Writer;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining writer queues (5 seconds)
///
/// Used when a snapshot is retired by reconfiguration or dropped. Use
/// [`Logger::shutdown`](super::Logger::shutdown) for a custom timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A created writer and how it should be driven
pub(crate) struct Target {
    /// Minimum level the writer accepts
    pub level: LogLevel,
    /// Drive through a queue and a worker thread
    pub queued: bool,
    pub writer: Box<dyn Writer>,
}

enum Command {
    Write(Arc<LogRecord>),
    /// Acknowledged once every command queued before it was handled
    Flush(Sender<()>),
}

/// Per-writer state shared between producers and the worker thread
struct Slot {
    name: String,
    level: LogLevel,
    fields: RequiredFields,
    /// Set after the first failure has been reported
    failed: AtomicBool,
    reporter: SharedReporter,
    metrics: Arc<LoggerMetrics>,
}

impl Slot {
    fn write(&self, writer: &mut dyn Writer, record: &LogRecord) {
        let result = catch_unwind(AssertUnwindSafe(|| writer.write(record)));
        let message = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(&panic)),
        };

        self.metrics.record_dropped();
        // Reported once per writer; later failures only show in the metrics
        if !self.failed.swap(true, Ordering::Relaxed) {
            self.reporter.report(
                LogLevel::Error,
                &LoggerError::write(&self.name, message).to_string(),
            );
        }
    }

    fn flush(&self, writer: &mut dyn Writer) {
        match catch_unwind(AssertUnwindSafe(|| writer.flush())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.reporter.report(
                LogLevel::Error,
                &format!("Writer '{}' flush failed: {}", self.name, e),
            ),
            Err(panic) => self.reporter.report(
                LogLevel::Error,
                &format!(
                    "Writer '{}' panicked during flush: {}",
                    self.name,
                    panic_message(&panic)
                ),
            ),
        }
    }

    fn close(&self, writer: &mut dyn Writer) {
        match catch_unwind(AssertUnwindSafe(|| writer.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.reporter.report(
                LogLevel::Error,
                &format!("Writer '{}' close failed: {}", self.name, e),
            ),
            Err(panic) => self.reporter.report(
                LogLevel::Error,
                &format!(
                    "Writer '{}' panicked during close: {}",
                    self.name,
                    panic_message(&panic)
                ),
            ),
        }
    }
}

enum Route {
    /// `None` once closed
    Direct(Mutex<Option<Box<dyn Writer>>>),
    Queued {
        sender: RwLock<Option<Sender<Command>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Routes records of one snapshot to its writers
pub(crate) struct Dispatcher {
    routes: Vec<(Arc<Slot>, Route)>,
    /// Lowest level any writer accepts, `Off` without writers
    min_level: LogLevel,
    reporter: SharedReporter,
    metrics: Arc<LoggerMetrics>,
}

impl Dispatcher {
    pub(crate) fn new(
        targets: Vec<Target>,
        queue_capacity: usize,
        reporter: SharedReporter,
        metrics: Arc<LoggerMetrics>,
    ) -> Self {
        let mut routes = Vec::with_capacity(targets.len());

        for target in targets {
            let slot = Arc::new(Slot {
                name: target.writer.name().to_string(),
                level: target.level,
                fields: target.writer.required_fields(),
                failed: AtomicBool::new(false),
                reporter: Arc::clone(&reporter),
                metrics: Arc::clone(&metrics),
            });

            let route = if target.queued {
                let (sender, receiver) = bounded(queue_capacity);
                let worker_slot = Arc::clone(&slot);
                let writer = target.writer;
                let spawned = thread::Builder::new()
                    .name(format!("logger-{}", slot.name))
                    .spawn(move || run_worker(writer, receiver, worker_slot));

                match spawned {
                    Ok(handle) => Route::Queued {
                        sender: RwLock::new(Some(sender)),
                        worker: Mutex::new(Some(handle)),
                    },
                    Err(e) => {
                        reporter.report(
                            LogLevel::Error,
                            &format!("Cannot start writing thread for '{}': {}", slot.name, e),
                        );
                        continue;
                    }
                }
            } else {
                Route::Direct(Mutex::new(Some(target.writer)))
            };

            routes.push((slot, route));
        }

        let min_level = routes
            .iter()
            .map(|(slot, _)| slot.level)
            .min()
            .unwrap_or(LogLevel::Off);

        Self {
            routes,
            min_level,
            reporter,
            metrics,
        }
    }

    /// Whether at least one writer accepts `level`
    #[inline]
    pub(crate) fn accepts(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.min_level
    }

    /// Union of the required fields of the writers accepting `level`
    pub(crate) fn required_fields(&self, level: LogLevel) -> RequiredFields {
        if !self.accepts(level) {
            return RequiredFields::empty();
        }
        self.routes
            .iter()
            .filter(|(slot, _)| level >= slot.level)
            .fold(RequiredFields::empty(), |acc, (slot, _)| acc | slot.fields)
    }

    pub(crate) fn dispatch(&self, record: LogRecord) {
        let record = Arc::new(record);
        let mut delivered = false;

        for (slot, route) in &self.routes {
            if record.level < slot.level {
                continue;
            }
            match route {
                Route::Direct(writer) => {
                    if let Some(writer) = writer.lock().as_mut() {
                        slot.write(writer.as_mut(), &record);
                        delivered = true;
                    }
                }
                Route::Queued { sender, .. } => {
                    if let Some(sender) = sender.read().as_ref() {
                        delivered |= self.enqueue(sender, Command::Write(Arc::clone(&record)));
                    }
                }
            }
        }

        if delivered {
            self.metrics.record_logged();
        }
    }

    /// Blocking send; returns false if the worker is gone
    fn enqueue(&self, sender: &Sender<Command>, command: Command) -> bool {
        match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                self.metrics.record_block();
                sender.send(command).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Flush every writer. Queued writers are flushed by their worker after
    /// everything enqueued before this call was written.
    pub(crate) fn flush(&self) {
        for (slot, route) in &self.routes {
            match route {
                Route::Direct(writer) => {
                    if let Some(writer) = writer.lock().as_mut() {
                        slot.flush(writer.as_mut());
                    }
                }
                Route::Queued { sender, .. } => {
                    let (ack, done) = bounded(1);
                    let sent = match sender.read().as_ref() {
                        Some(sender) => self.enqueue(sender, Command::Flush(ack)),
                        None => false,
                    };
                    if sent && done.recv_timeout(DEFAULT_SHUTDOWN_TIMEOUT).is_err() {
                        self.reporter.report(
                            LogLevel::Warn,
                            &format!(
                                "Writer '{}' did not flush within {:?}",
                                slot.name, DEFAULT_SHUTDOWN_TIMEOUT
                            ),
                        );
                    }
                }
            }
        }
    }

    /// Drain queues, then flush and close every writer.
    ///
    /// Returns `true` if all workers finished within `timeout`. Idempotent.
    pub(crate) fn shutdown(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut clean = true;

        for (slot, route) in &self.routes {
            match route {
                Route::Direct(writer) => {
                    if let Some(mut writer) = writer.lock().take() {
                        slot.close(writer.as_mut());
                    }
                }
                Route::Queued { sender, worker } => {
                    // Closing the channel lets the worker drain and exit
                    drop(sender.write().take());

                    if let Some(handle) = worker.lock().take() {
                        clean &= self.join_worker(slot, handle, start, timeout);
                    }
                }
            }
        }

        clean
    }

    fn join_worker(
        &self,
        slot: &Slot,
        handle: JoinHandle<()>,
        start: Instant,
        timeout: Duration,
    ) -> bool {
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    self.reporter.report(
                        LogLevel::Error,
                        &format!(
                            "Writing thread of '{}' panicked during shutdown: {}",
                            slot.name,
                            panic_message(&e)
                        ),
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                self.reporter.report(
                    LogLevel::Warn,
                    &format!(
                        "Writing thread of '{}' did not finish within {:?}. Some records may be lost.",
                        slot.name, timeout
                    ),
                );
                return false;
            }

            // Small sleep to avoid busy-waiting
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

fn run_worker(mut writer: Box<dyn Writer>, receiver: Receiver<Command>, slot: Arc<Slot>) {
    // Ends once every sender is gone and the queue is drained
    for command in receiver.iter() {
        match command {
            Command::Write(record) => {
                slot.write(writer.as_mut(), &record);
                // Flush at the end of each burst to keep output timely
                if receiver.is_empty() {
                    slot.flush(writer.as_mut());
                }
            }
            Command::Flush(ack) => {
                slot.flush(writer.as_mut());
                let _ = ack.send(());
            }
        }
    }
    slot.close(writer.as_mut());
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
