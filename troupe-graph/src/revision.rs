use serde::{Deserialize, Serialize};

/// Static bound of a revise/retry cycle.
///
/// The counter lives in state and is incremented once per revision; the
/// cycle's conditional edge asks [`RevisionBound::route`] where to go. With
/// bound `N` the cycle body runs at most `N + 1` times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionBound {
    max_revisions: u32,
}

impl RevisionBound {
    pub const fn new(max_revisions: u32) -> Self {
        Self { max_revisions }
    }

    /// Bound expressed as total passes of the cycle body. `passes(3)` allows
    /// two revisions; `passes(0)` behaves like `passes(1)`.
    pub const fn passes(passes: u32) -> Self {
        Self::new(passes.saturating_sub(1))
    }

    pub const fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    pub const fn max_passes(&self) -> u32 {
        self.max_revisions + 1
    }

    pub const fn exhausted(&self, revisions: u32) -> bool {
        revisions >= self.max_revisions
    }

    /// `retry` while the verdict failed and revisions remain, else `forward`.
    pub fn route<'a>(&self, passed: bool, revisions: u32, retry: &'a str, forward: &'a str) -> &'a str {
        if passed || self.exhausted(revisions) {
            forward
        } else {
            retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_once_bound_is_hit() {
        let bound = RevisionBound::new(3);
        assert_eq!(bound.route(false, 0, "revise", "submit"), "revise");
        assert_eq!(bound.route(false, 2, "revise", "submit"), "revise");
        assert_eq!(bound.route(false, 3, "revise", "submit"), "submit");
        assert_eq!(bound.route(true, 0, "revise", "submit"), "submit");
        assert_eq!(bound.max_passes(), 4);
    }

    #[test]
    fn pass_bound_counts_the_first_pass() {
        let bound = RevisionBound::passes(3);
        assert_eq!(bound.max_revisions(), 2);
        assert_eq!(bound.max_passes(), 3);
        assert_eq!(bound.route(false, 1, "revise", "submit"), "revise");
        assert_eq!(bound.route(false, 2, "revise", "submit"), "submit");
        assert_eq!(RevisionBound::passes(0), RevisionBound::new(0));
    }

    #[test]
    fn zero_bound_never_retries() {
        let bound = RevisionBound::new(0);
        assert!(bound.exhausted(0));
        assert_eq!(bound.route(false, 0, "revise", "submit"), "submit");
    }
}
