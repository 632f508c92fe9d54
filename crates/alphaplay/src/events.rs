use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{ErrorKind, PlayerError};

/// Notifications published by a [`Player`](crate::Player), in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// First frame of the current source is decodable. Once per load.
    Loaded { duration: f64, width: u32, height: u32 },
    Play,
    Pause,
    TimeUpdate { current_time: f64 },
    Seeked { current_time: f64 },
    /// Playback reached the end. Never emitted while looping.
    Ended,
    Error { kind: ErrorKind, message: String },
    /// Rendering resumed on a fresh context after a loss.
    ContextRestored,
}

impl PlayerEvent {
    pub(crate) fn from_error(error: &PlayerError) -> Self {
        PlayerEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Sending half of the event stream. Dropped receivers are tolerated.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    sender: Sender<PlayerEvent>,
}

impl EventSink {
    pub(crate) fn channel() -> (Self, Receiver<PlayerEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        tracing::trace!(?event, "player event");
        // A host that stopped listening is not an error for the player.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, receiver) = EventSink::channel();
        sink.emit(PlayerEvent::Play);
        sink.emit(PlayerEvent::Pause);
        let drained: Vec<_> = receiver.try_iter().collect();
        assert_eq!(drained, vec![PlayerEvent::Play, PlayerEvent::Pause]);
    }

    #[test]
    fn emitting_without_receiver_is_harmless() {
        let (sink, receiver) = EventSink::channel();
        drop(receiver);
        sink.emit(PlayerEvent::Ended);
    }

    #[test]
    fn error_events_carry_kind() {
        let event = PlayerEvent::from_error(&PlayerError::ContextLost);
        assert!(matches!(
            event,
            PlayerEvent::Error {
                kind: ErrorKind::ContextLost,
                ..
            }
        ));
    }
}
