//! Best-effort fan-out of server messages to player connections

use crate::registry::PlayerRegistry;
use log::{debug, error, warn};
use shared::ServerMessage;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outbound queue of serialized frames for one connection
pub type Outbox = mpsc::Sender<String>;

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The connection is closing or gone
    Closed,
    /// The connection is not draining its queue fast enough
    Full,
}

/// Queues a frame without waiting on the receiver
pub fn deliver(outbox: &Outbox, payload: &str) -> Delivery {
    match outbox.try_send(payload.to_owned()) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
        Err(TrySendError::Full(_)) => Delivery::Full,
    }
}

/// Serializes `message` once and queues it for every registered player.
///
/// Returns how many players the message was queued for. Closed or full
/// queues are skipped and never stop delivery to the rest.
pub fn broadcast(registry: &PlayerRegistry, message: &ServerMessage) -> usize {
    let payload = match message.to_json() {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize broadcast: {}", e);
            return 0;
        }
    };

    let mut sent = 0;
    for player in registry.iter() {
        match deliver(&player.outbox, &payload) {
            Delivery::Sent => sent += 1,
            Delivery::Closed => debug!("Skipping closed connection for player {}", player.id),
            Delivery::Full => warn!("Outbox full for player {}, dropping message", player.id),
        }
    }
    sent
}

/// Sends `message` to a single outbox
pub fn unicast(outbox: &Outbox, message: &ServerMessage) -> Delivery {
    match message.to_json() {
        Ok(payload) => deliver(outbox, &payload),
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            Delivery::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerInfo;

    fn state_message() -> ServerMessage {
        ServerMessage::State {
            players: vec![PlayerInfo {
                id: "1".to_string(),
                name: "Player1".to_string(),
                score: 0,
            }],
            time_left: 5,
        }
    }

    #[test]
    fn test_broadcast_reaches_every_player() {
        let mut registry = PlayerRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(None, tx1);
        registry.register(None, tx2);

        let sent = broadcast(&registry, &state_message());
        assert_eq!(sent, 2);

        let expected = state_message().to_json().unwrap();
        assert_eq!(rx1.try_recv().unwrap(), expected);
        assert_eq!(rx2.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_broadcast_skips_closed_connection() {
        let mut registry = PlayerRegistry::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(None, tx1);
        registry.register(None, tx2);
        drop(rx1);

        let sent = broadcast(&registry, &state_message());
        assert_eq!(sent, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_skips_full_connection() {
        let mut registry = PlayerRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.register(None, tx1);
        registry.register(None, tx2);

        assert_eq!(broadcast(&registry, &state_message()), 2);
        assert_eq!(broadcast(&registry, &state_message()), 1);

        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_to_empty_registry() {
        let registry = PlayerRegistry::new();
        assert_eq!(broadcast(&registry, &state_message()), 0);
    }

    #[test]
    fn test_unicast() {
        let (tx, mut rx) = mpsc::channel(1);
        let message = ServerMessage::AssignId {
            id: "3".to_string(),
            name: "Player3".to_string(),
        };

        assert_eq!(unicast(&tx, &message), Delivery::Sent);
        assert_eq!(unicast(&tx, &message), Delivery::Full);
        assert_eq!(rx.try_recv().unwrap(), message.to_json().unwrap());

        drop(rx);
        assert_eq!(unicast(&tx, &message), Delivery::Closed);
    }
}
