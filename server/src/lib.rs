//! # Click Score Server Library
//!
//! This library provides the authoritative server for a real-time multiplayer
//! click game. Players connect over WebSocket, receive an identity, and race to
//! click as often as possible during timed rounds. The server owns the scores,
//! runs the round clock and announces the winners.
//!
//! ## Core Responsibilities
//!
//! ### Round Lifecycle
//! Rounds alternate with breaks. A round starts when a player asks for one or
//! shortly after somebody joins an idle server. A countdown ticks once per
//! second and, when it reaches zero, the players holding the top score are
//! announced. After the break a new round starts automatically as long as
//! anybody is still connected.
//!
//! ### Player Management
//! Handles the lifecycle of client connections:
//! - Identity assignment from a counter that never repeats
//! - Display names taken from the connection URL or set later
//! - Prompt cleanup when a connection closes
//!
//! ### State Broadcasting
//! Every tick and every change to the player list or scores is pushed to all
//! connected clients. Delivery is best effort: one slow or closed connection
//! never holds up the others.
//!
//! ## Architecture Design
//!
//! ### Single Game Task
//! All mutable game state lives in one task that processes connection events
//! and timer expirations sequentially. Connection tasks only send commands
//! into its mailbox, so a tick and a click can never interleave.
//!
//! ### Deterministic State Machine
//! The round controller takes the current time as an argument and exposes its
//! next deadline instead of spawning timers. The game task sleeps until that
//! deadline, which keeps exactly one timer alive at any moment.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Player records keyed by id: names, scores and outbound queues.
//!
//! ### Broadcast Module (`broadcast`)
//! Serializes a message once and queues it for every player without blocking.
//!
//! ### Round Module (`round`)
//! The Idle / Running / Break state machine and round-end scoring.
//!
//! ### Game Module (`game`)
//! The task that owns the round controller and its command mailbox.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop and per-connection frame pumping.
//!
//! ### Config Module (`config`)
//! Command line and environment configuration.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::round::RoundSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // Start the game task with 30 second rounds and 10 second breaks
//!     let (game, _game_task) = server::game::spawn(RoundSettings::default());
//!
//!     // Accept WebSocket clients, e.g. ws://127.0.0.1:8080/?name=alice
//!     let server = Server::bind("127.0.0.1:8080", game, 64).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod game;
pub mod network;
pub mod registry;
pub mod round;
