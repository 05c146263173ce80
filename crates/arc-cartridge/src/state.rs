use std::fmt;

/// Lifecycle state of a cartridge instance. Only the scheduler drives
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartridgeState {
    #[default]
    Unloaded,
    Loading,
    Initialized,
    Running,
    Paused,
    Faulted,
    Stopped,
}

impl CartridgeState {
    /// Whether the scheduler may move a cartridge from `self` to `next`.
    pub fn can_transition(self, next: Self) -> bool {
        use CartridgeState::{Faulted, Initialized, Loading, Paused, Running, Stopped, Unloaded};
        matches!(
            (self, next),
            (Unloaded, Loading)
                | (Loading, Initialized)
                | (Loading, Faulted)
                | (Initialized, Running)
                | (Initialized, Faulted)
                | (Running, Paused)
                | (Running, Faulted)
                | (Running, Stopped)
                | (Paused, Running)
                | (Paused, Faulted)
                | (Paused, Stopped)
                | (Faulted, Stopped)
                | (Stopped, Unloaded)
        )
    }

    /// States in which `update`/`draw` entry points may run.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for CartridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Faulted => "faulted",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_path_through_the_machine() {
        use CartridgeState::*;
        let path = [Unloaded, Loading, Initialized, Running, Paused, Running, Stopped, Unloaded];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn illegal_jumps_are_rejected() {
        use CartridgeState::*;
        assert!(!Unloaded.can_transition(Running));
        assert!(!Faulted.can_transition(Running));
        assert!(!Stopped.can_transition(Running));
        assert!(!Running.can_transition(Loading));
    }
}
