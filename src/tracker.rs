use crate::source::{SourceHandle, SourceId};

/// Outcome of comparing a request's source with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Unchanged,
    /// A different source than the last one observed.
    NewSource,
    /// Same source, but the caller asked for a reload.
    ForcedReset,
}

impl Observation {
    pub fn requires_reset(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Default)]
pub struct SourceIdentityTracker {
    previous: Option<SourceId>,
}

impl SourceIdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` as the source in use. A new source wins over a
    /// forced reset when both apply.
    pub fn observe(&mut self, current: &SourceHandle, force_reset: bool) -> Observation {
        let id = current.id();
        if self.previous.as_ref() != Some(id) {
            log::debug!("new source: {}", current.describe());
            self.previous = Some(id.clone());
            Observation::NewSource
        } else if force_reset {
            log::debug!("reloading source: {}", current.describe());
            Observation::ForcedReset
        } else {
            Observation::Unchanged
        }
    }
}
