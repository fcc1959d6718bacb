use std::sync::Mutex;

/// ProgressPhase tags which stage of an index pass a callback reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ProgressPhase {
    /// Full sequential scan of a source file without a usable index.
    Scanning = 1,
    /// Copying staged entries into the final index file.
    Creating = 2,
    /// Scan of the newly appended region of a grown source file.
    Appending = 3,
}

type ProgressCallback = Box<dyn Fn(ProgressPhase, i32) + Send>;

lazy_static! {
    static ref PROGRESS_CALLBACK: Mutex<Option<ProgressCallback>> = Mutex::new(None);
}

/// register_progress_callback installs the process-wide progress hook.
/// A later registration replaces an earlier one.
pub fn register_progress_callback<F>(callback: F)
where
    F: Fn(ProgressPhase, i32) + Send + 'static,
{
    *PROGRESS_CALLBACK.lock().unwrap() = Some(Box::new(callback));
}

/// clear_progress_callback removes the hook; nothing fires afterwards.
pub fn clear_progress_callback() {
    *PROGRESS_CALLBACK.lock().unwrap() = None;
}

/// ProgressReporter throttles one pass phase: each distinct percentage
/// is delivered once, in non-decreasing order.
pub(crate) struct ProgressReporter {
    phase: ProgressPhase,
    last_percent: i32,
}

impl ProgressReporter {
    pub fn new(phase: ProgressPhase) -> Self {
        Self {
            phase,
            last_percent: -1,
        }
    }

    /// report computes completed/total as a rounded-down percentage and
    /// invokes the registered callback when the value moved.
    pub fn report(&mut self, completed: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (completed.saturating_mul(100) / total).min(100) as i32;
        if percent == self.last_percent {
            return;
        }
        self.last_percent = percent;
        if let Some(callback) = PROGRESS_CALLBACK.lock().unwrap().as_ref() {
            callback(self.phase, percent);
        }
    }
}
