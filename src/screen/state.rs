//! Scan screen lifecycle states.

use std::fmt;

/// Lifecycle of a scan screen.
///
/// ```text
/// AwaitingPermission ─granted─▶ SessionStarting ─▶ Scanning ─decoded─▶ Finishing ─▶ Terminated
///        └──────────denied──────────────────────────────────────────────────────────▶ Terminated
/// ```
///
/// Every non-terminal state may also end in `Terminated` (cancellation,
/// timeout, camera failure). Nothing leaves `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenState {
    /// Waiting for the camera permission decision.
    AwaitingPermission,
    /// Acquiring the camera provider and binding the session.
    SessionStarting,
    /// Frames are being analyzed.
    Scanning,
    /// A value was accepted; the screen is closing.
    Finishing,
    /// The screen has ended.
    Terminated,
}

impl ScreenState {
    /// Returns true if the state machine allows moving to `next`.
    pub fn can_transition_to(self, next: ScreenState) -> bool {
        use ScreenState::*;
        matches!(
            (self, next),
            (AwaitingPermission, SessionStarting)
                | (SessionStarting, Scanning)
                | (Scanning, Finishing)
                | (AwaitingPermission | SessionStarting | Scanning | Finishing, Terminated)
        )
    }

    /// Returns true for the final state.
    pub fn is_terminal(self) -> bool {
        self == ScreenState::Terminated
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScreenState::AwaitingPermission => "awaiting-permission",
            ScreenState::SessionStarting => "session-starting",
            ScreenState::Scanning => "scanning",
            ScreenState::Finishing => "finishing",
            ScreenState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ScreenState::*;

    #[test]
    fn test_happy_path_allowed() {
        assert!(AwaitingPermission.can_transition_to(SessionStarting));
        assert!(SessionStarting.can_transition_to(Scanning));
        assert!(Scanning.can_transition_to(Finishing));
        assert!(Finishing.can_transition_to(Terminated));
    }

    #[test]
    fn test_no_reentry_after_finishing() {
        assert!(!Finishing.can_transition_to(Scanning));
        assert!(!Finishing.can_transition_to(Finishing));
        assert!(!Terminated.can_transition_to(Terminated));
        assert!(!Terminated.can_transition_to(AwaitingPermission));
    }

    #[test]
    fn test_denial_skips_session() {
        assert!(AwaitingPermission.can_transition_to(Terminated));
        assert!(!AwaitingPermission.can_transition_to(Scanning));
    }
}
