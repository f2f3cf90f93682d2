use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One timestamped line of the activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: String,
    pub severity: Severity,
    pub message: String,
}

impl LogLine {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            severity,
            message: message.into(),
        }
    }

    pub fn render(&self) -> String {
        let prefix = match self.severity {
            Severity::Info => "",
            Severity::Warn => "WARN: ",
            Severity::Error => "ERROR: ",
        };
        format!("[{}] {}{}", self.timestamp, prefix, self.message)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the UI thread and the background task.
#[derive(Clone)]
pub struct WorkerShared {
    running: Arc<AtomicBool>,
    status: Arc<Mutex<String>>,
    log: Arc<Mutex<Vec<LogLine>>>,
    progress: Arc<Mutex<(usize, usize)>>,
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new("Ready".to_string())),
            log: Arc::new(Mutex::new(Vec::new())),
            progress: Arc::new(Mutex::new((0, 0))),
        }
    }
}

impl WorkerShared {
    pub fn running_flag(&self) -> &AtomicBool {
        &self.running
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::SeqCst);
    }

    pub fn set_status(&self, text: &str) {
        *lock(&self.status) = text.to_string();
    }

    pub fn status(&self) -> String {
        lock(&self.status).clone()
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        lock(&self.log).push(LogLine::new(severity, message));
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }

    pub fn log_snapshot(&self) -> Vec<LogLine> {
        lock(&self.log).clone()
    }

    pub fn set_progress(&self, done: usize, total: usize) {
        *lock(&self.progress) = (done, total);
    }

    pub fn progress(&self) -> (usize, usize) {
        *lock(&self.progress)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one task at a time on a background thread.
#[derive(Default)]
pub struct Worker {
    shared: WorkerShared,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> &WorkerShared {
        &self.shared
    }

    pub fn start<F>(&mut self, task: F)
    where
        F: FnOnce(WorkerShared) + Send + 'static,
    {
        self.shared.set_running(true);

        let shared = self.shared.clone();
        self.handle = Some(thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(shared.clone())));
            if let Err(payload) = outcome {
                let reason = panic_message(payload.as_ref());
                tracing::error!("Worker task panicked: {}", reason);
                shared.log(Severity::Error, format!("Internal error: {}", reason));
                shared.set_status("Aborted");
            }
            shared.set_running(false);
        }));
    }

    /// Ask the task to stop at its next checkpoint.
    pub fn stop(&self) {
        self.shared.set_running(false);
        self.set_status("Stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn get_status(&self) -> String {
        self.shared.status()
    }

    pub fn set_status(&self, text: &str) {
        self.shared.set_status(text);
    }

    /// Block until the current task returns.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
