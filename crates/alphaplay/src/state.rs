use std::fmt;

/// Playback lifecycle as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Errored,
}

impl PlaybackState {
    /// Whether `next` is reachable from `self` in one step.
    pub fn allows(self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        match (self, next) {
            (_, Loading) | (_, Errored) | (_, Idle) => true,
            (Loading, Ready) => true,
            (Ready | Paused | Ended | Errored, Playing) => true,
            (Ready | Playing | Ended, Paused) => true,
            (Playing, Ended) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Single-writer holder for [`PlaybackState`].
///
/// Only the player's command handlers and media callbacks call
/// [`transition`](Self::transition); the render loop gets a copy through
/// [`get`](Self::get).
#[derive(Debug, Default)]
pub(crate) struct PlaybackMachine {
    state: PlaybackState,
}

impl PlaybackMachine {
    pub(crate) fn get(&self) -> PlaybackState {
        self.state
    }

    /// Applies `next` when the table allows it. Returns `true` on change.
    pub(crate) fn transition(&mut self, next: PlaybackState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.allows(next) {
            tracing::debug!(from = %self.state, to = %next, "rejected playback transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %next, "playback transition");
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_state_is_a_noop() {
        let mut machine = PlaybackMachine::default();
        assert!(machine.transition(PlaybackState::Loading));
        assert!(!machine.transition(PlaybackState::Loading));
    }

    #[test]
    fn idle_cannot_jump_to_playing() {
        let mut machine = PlaybackMachine::default();
        assert!(!machine.transition(PlaybackState::Playing));
        assert_eq!(machine.get(), PlaybackState::Idle);
    }

    #[test]
    fn full_lifecycle_is_accepted() {
        let mut machine = PlaybackMachine::default();
        for next in [
            PlaybackState::Loading,
            PlaybackState::Ready,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Playing,
            PlaybackState::Ended,
            PlaybackState::Playing,
        ] {
            assert!(machine.transition(next), "rejected {next}");
        }
    }

    #[test]
    fn ended_requires_playing() {
        assert!(!PlaybackState::Paused.allows(PlaybackState::Ended));
        assert!(PlaybackState::Playing.allows(PlaybackState::Ended));
    }
}
