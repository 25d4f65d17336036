use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Subjects with a claim run currently in progress
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    subjects: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Mark `subject_id` busy; `None` if a run for it is already in progress
    pub fn try_begin(&self, subject_id: &str) -> Option<InFlightGuard> {
        if !self.subjects.lock().insert(subject_id.to_string()) {
            return None;
        }

        Some(InFlightGuard {
            subjects: self.subjects.clone(),
            subject_id: subject_id.to_string(),
        })
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.subjects.lock().contains(subject_id)
    }
}

/// Releases the subject when dropped, including when the request is cancelled
#[derive(Debug)]
pub struct InFlightGuard {
    subjects: Arc<Mutex<HashSet<String>>>,
    subject_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.subjects.lock().remove(&self.subject_id);
    }
}
