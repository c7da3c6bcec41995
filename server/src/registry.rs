//! Player registry for the click-score server
//!
//! This module keeps track of every connected player, including:
//! - Identity assignment from a monotonic counter
//! - Display names and per-round scores
//! - The outbound queue used to reach each player's connection
//!
//! The registry itself is not synchronized. It is owned by the round
//! controller, which runs inside the single game task.

use crate::broadcast::Outbox;
use log::info;
use shared::{default_player_name, truncate_name, PlayerId, PlayerInfo};
use std::collections::BTreeMap;

/// A registered player and the handle used to deliver messages to them
#[derive(Debug)]
pub struct Player {
    /// Unique identifier assigned on join
    pub id: PlayerId,
    /// Display name, at most `MAX_NAME_LEN` characters
    pub name: String,
    /// Clicks counted during the current round
    pub score: u32,
    /// Queue drained by this player's connection writer
    pub outbox: Outbox,
}

impl Player {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id.to_string(),
            name: self.name.clone(),
            score: self.score,
        }
    }
}

/// All currently connected players, indexed by id
///
/// Ids come from a counter that only moves forward, so iteration over the
/// map follows join order.
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    next_player_id: PlayerId,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            next_player_id: 1,
        }
    }

    /// Adds a player with a fresh id and a zero score
    ///
    /// An empty or missing name hint falls back to `Player<id>`; anything
    /// else is truncated to the maximum name length.
    pub fn register(&mut self, name_hint: Option<&str>, outbox: Outbox) -> &Player {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let name = match name_hint {
            Some(hint) if !hint.is_empty() => truncate_name(hint),
            _ => default_player_name(id),
        };

        info!("Player {} registered as {:?}", id, name);
        self.players.entry(id).or_insert(Player {
            id,
            name,
            score: 0,
            outbox,
        })
    }

    /// Removes a player. Returns false if the id was not registered.
    pub fn unregister(&mut self, id: PlayerId) -> bool {
        if let Some(player) = self.players.remove(&id) {
            info!("Player {} ({:?}) unregistered", player.id, player.name);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Renames a player in place. Returns false if the id was not registered.
    pub fn set_name(&mut self, id: PlayerId, new_name: &str) -> bool {
        if let Some(player) = self.players.get_mut(&id) {
            player.name = truncate_name(new_name);
            true
        } else {
            false
        }
    }

    /// Adds one point to a player's score. Returns false if the id was not registered.
    pub fn add_point(&mut self, id: PlayerId) -> bool {
        if let Some(player) = self.players.get_mut(&id) {
            player.score += 1;
            true
        } else {
            false
        }
    }

    pub fn reset_all_scores(&mut self) {
        for player in self.players.values_mut() {
            player.score = 0;
        }
    }

    /// Point-in-time copy of every player's public fields, in join order
    pub fn snapshot(&self) -> Vec<PlayerInfo> {
        self.players.values().map(Player::info).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
