/// Holds the flag value of the last completed synchronization pass.
///
/// A delivery only reloads its page when the delivered value differs from
/// this one. `None` means no pass has completed and nothing was seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionTracker {
    previous: Option<bool>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(value: bool) -> Self {
        Self {
            previous: Some(value),
        }
    }

    pub fn previous(&self) -> Option<bool> {
        self.previous
    }

    pub fn is_transition(&self, delivered: bool) -> bool {
        self.previous != Some(delivered)
    }

    /// Records the end of a pass, whatever its per-page outcomes were.
    pub fn finish_pass(&mut self, value: bool) {
        self.previous = Some(value);
    }
}
