//! The game task: one serialized context that owns all mutable game state
//!
//! Connection handlers never touch the registry or the round state directly.
//! They send `GameCommand`s through a `GameHandle`, and the task applies them
//! one at a time, interleaved with the round controller's timer.

use crate::broadcast::Outbox;
use crate::round::{RoundController, RoundSettings, RoundState};
use log::{debug, error, info};
use shared::{ClientMessage, PlayerId, PlayerInfo};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Pending commands the game task will buffer before senders wait
const COMMAND_QUEUE_SIZE: usize = 1024;

/// Requests sent from connection tasks to the game task
#[derive(Debug)]
pub enum GameCommand {
    Join {
        name_hint: Option<String>,
        outbox: Outbox,
        reply: oneshot::Sender<PlayerId>,
    },
    Leave {
        id: PlayerId,
    },
    Click {
        id: PlayerId,
    },
    SetName {
        id: PlayerId,
        name: String,
    },
    Start {
        id: PlayerId,
    },
    Inspect {
        reply: oneshot::Sender<GameSnapshot>,
    },
}

impl GameCommand {
    /// Maps an inbound client message to the command it triggers, if any
    pub fn from_client(id: PlayerId, message: ClientMessage) -> Option<Self> {
        match message {
            ClientMessage::Click => Some(GameCommand::Click { id }),
            ClientMessage::SetName { name } => Some(GameCommand::SetName { id, name }),
            ClientMessage::Start => Some(GameCommand::Start { id }),
            ClientMessage::Unknown => None,
        }
    }
}

/// Read-only view of the game, for monitoring and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub state: RoundState,
    pub players: Vec<PlayerInfo>,
    pub rounds_played: u64,
}

/// Cloneable sender side of the game task's mailbox
#[derive(Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    /// Registers a connection. Returns `None` if the game task has stopped.
    pub async fn join(&self, name_hint: Option<String>, outbox: Outbox) -> Option<PlayerId> {
        let (reply, response) = oneshot::channel();
        self.send(GameCommand::Join {
            name_hint,
            outbox,
            reply,
        })
        .await;
        response.await.ok()
    }

    pub async fn leave(&self, id: PlayerId) {
        self.send(GameCommand::Leave { id }).await;
    }

    pub async fn inspect(&self) -> Option<GameSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(GameCommand::Inspect { reply }).await;
        response.await.ok()
    }

    pub async fn send(&self, command: GameCommand) {
        if let Err(e) = self.commands.send(command).await {
            error!("Failed to queue game command: {}", e);
        }
    }
}

/// Spawns the game task with a fresh controller
pub fn spawn(settings: RoundSettings) -> (GameHandle, JoinHandle<()>) {
    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_SIZE);
    let controller = RoundController::new(settings);
    let task = tokio::spawn(run(controller, receiver));
    (GameHandle { commands }, task)
}

/// Applies commands and fires timers until every `GameHandle` is dropped
pub async fn run(mut controller: RoundController, mut commands: mpsc::Receiver<GameCommand>) {
    info!(
        "Game loop started (round {}s, break {:?})",
        controller.settings().round_duration,
        controller.settings().break_duration
    );

    loop {
        let deadline = controller.next_deadline();

        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(command) => apply(&mut controller, command),
                    None => {
                        info!("All game handles dropped, stopping game loop");
                        break;
                    }
                }
            }

            _ = wait_for(deadline) => {
                controller.fire_due(Instant::now());
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn apply(controller: &mut RoundController, command: GameCommand) {
    match command {
        GameCommand::Join {
            name_hint,
            outbox,
            reply,
        } => {
            let id = controller.join(name_hint.as_deref(), outbox, Instant::now());
            if reply.send(id).is_err() {
                // The connection went away while joining
                controller.leave(id);
            }
        }
        GameCommand::Leave { id } => {
            controller.leave(id);
        }
        GameCommand::Click { id } => {
            controller.click(id);
        }
        GameCommand::SetName { id, name } => {
            controller.set_name(id, &name);
        }
        GameCommand::Start { id } => {
            if controller.request_start(Instant::now()) {
                debug!("Player {} started a round", id);
            }
        }
        GameCommand::Inspect { reply } => {
            let _ = reply.send(GameSnapshot {
                state: controller.state(),
                players: controller.registry().snapshot(),
                rounds_played: controller.rounds_played(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::Phase;
    use shared::{ServerMessage, Winner};
    use std::time::Duration;
    use tokio::time::sleep;

    fn settings() -> RoundSettings {
        RoundSettings {
            round_duration: 3,
            break_duration: Duration::from_secs(2),
            join_grace: Duration::from_secs(1),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    #[test]
    fn test_command_from_client() {
        assert!(matches!(
            GameCommand::from_client(4, ClientMessage::Click),
            Some(GameCommand::Click { id: 4 })
        ));
        assert!(matches!(
            GameCommand::from_client(4, ClientMessage::Start),
            Some(GameCommand::Start { id: 4 })
        ));
        match GameCommand::from_client(
            4,
            ClientMessage::SetName {
                name: "zed".to_string(),
            },
        ) {
            Some(GameCommand::SetName { id, name }) => {
                assert_eq!(id, 4);
                assert_eq!(name, "zed");
            }
            other => panic!("Unexpected command {:?}", other),
        }
        assert!(GameCommand::from_client(4, ClientMessage::Unknown).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_round_trip() {
        let (game, _task) = spawn(settings());
        let (outbox, mut rx) = mpsc::channel(256);

        let id = game.join(Some("solo".to_string()), outbox).await.unwrap();
        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Idle);
        assert_eq!(snapshot.players.len(), 1);

        // Grace delay elapses and the round begins
        sleep(Duration::from_millis(1500)).await;
        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Running);
        assert_eq!(snapshot.state.time_left, 3);

        game.send(GameCommand::Click { id }).await;
        game.send(GameCommand::Click { id }).await;

        // Countdown runs out at 1s + 3s
        sleep(Duration::from_secs(3)).await;
        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Break);
        assert_eq!(snapshot.rounds_played, 1);

        let messages = drain(&mut rx);
        assert!(matches!(messages[0], ServerMessage::AssignId { .. }));
        assert!(messages.contains(&ServerMessage::RoundStart { time_left: 3 }));

        let countdown: Vec<u32> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::State { players, time_left } if players[0].score == 2 => {
                    Some(*time_left)
                }
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![3, 2, 1, 0]);

        match messages.last() {
            Some(ServerMessage::GameOver { winner, scores }) => {
                assert_eq!(*winner, Winner::Single("solo".to_string()));
                assert_eq!(scores.get("solo"), Some(&2));
            }
            other => panic!("Expected game_over, got {:?}", other),
        }

        // Break ends with the player still here, so a new round starts
        sleep(Duration::from_secs(2)).await;
        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Running);
        assert_eq!(snapshot.players[0].score, 0);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::RoundStart { time_left: 3 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_goes_dormant_when_everyone_leaves() {
        let (game, _task) = spawn(settings());
        let (outbox, _rx) = mpsc::channel(256);

        let id = game.join(None, outbox).await.unwrap();
        sleep(Duration::from_millis(4500)).await;
        assert_eq!(game.inspect().await.unwrap().state.phase, Phase::Break);

        game.leave(id).await;
        sleep(Duration::from_secs(10)).await;

        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Idle);
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.rounds_played, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_command_skips_grace_delay() {
        let (game, _task) = spawn(settings());
        let (outbox, _rx) = mpsc::channel(256);

        let id = game.join(None, outbox).await.unwrap();
        game.send(GameCommand::Start { id }).await;

        let snapshot = game.inspect().await.unwrap();
        assert_eq!(snapshot.state.phase, Phase::Running);
        assert_eq!(snapshot.state.time_left, 3);

        // A second start while running changes nothing
        game.send(GameCommand::Start { id }).await;
        assert_eq!(game.inspect().await.unwrap().state, snapshot.state);
    }

    #[tokio::test]
    async fn test_game_loop_stops_when_handles_drop() {
        let (game, task) = spawn(settings());
        drop(game);
        tokio_test::assert_ok!(task.await);
    }
}
