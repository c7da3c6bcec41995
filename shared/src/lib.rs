use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_NAME_LEN: usize = 20;
pub const DEFAULT_ROUND_SECS: u32 = 30;
pub const DEFAULT_BREAK_SECS: u32 = 10;
pub const JOIN_GRACE_MS: u64 = 1000;
pub const DEFAULT_PORT: u16 = 8080;

/// Identity assigned to a connection when it joins. Never reused within a process.
pub type PlayerId = u32;

/// Events a client may send. Anything with an unrecognised `type` becomes `Unknown`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Click,
    SetName {
        name: String,
    },
    Start,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parses a text frame, returning `None` for payloads that are not a valid message.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Events the server sends, either to one connection or to everybody.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AssignId {
        id: String,
        name: String,
    },
    State {
        players: Vec<PlayerInfo>,
        #[serde(rename = "timeLeft")]
        time_left: u32,
    },
    RoundStart {
        #[serde(rename = "timeLeft")]
        time_left: u32,
    },
    GameOver {
        winner: Winner,
        scores: BTreeMap<String, u32>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Public view of a player as it appears in `state` broadcasts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub score: u32,
}

/// Round result. A unique winner is sent as a bare name, ties (and the
/// no-player case) as a list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Winner {
    Single(String),
    Tied(Vec<String>),
}

impl Winner {
    pub fn from_names(mut names: Vec<String>) -> Self {
        if names.len() == 1 {
            Winner::Single(names.remove(0))
        } else {
            Winner::Tied(names)
        }
    }

    pub fn none() -> Self {
        Winner::Tied(Vec::new())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Winner::Tied(names) if names.is_empty())
    }
}

/// Cuts a display name down to at most `MAX_NAME_LEN` characters.
pub fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

pub fn default_player_name(id: PlayerId) -> String {
    format!("Player{}", id)
}
