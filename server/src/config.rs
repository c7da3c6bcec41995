//! Startup configuration, from command line flags or environment variables

use crate::round::RoundSettings;
use clap::Parser;
use shared::{DEFAULT_BREAK_SECS, DEFAULT_PORT, DEFAULT_ROUND_SECS, JOIN_GRACE_MS};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-time click score game server")]
pub struct Config {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "CLICK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, env = "CLICK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Length of a round in seconds
    #[arg(
        long,
        env = "CLICK_ROUND_SECS",
        default_value_t = DEFAULT_ROUND_SECS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub round_duration: u32,

    /// Pause between rounds in seconds
    #[arg(long, env = "CLICK_BREAK_SECS", default_value_t = DEFAULT_BREAK_SECS)]
    pub break_duration: u32,

    /// Delay after a join before an idle server starts a round, in milliseconds
    #[arg(long, env = "CLICK_JOIN_GRACE_MS", default_value_t = JOIN_GRACE_MS)]
    pub join_grace_ms: u64,

    /// Messages buffered per connection before new ones are dropped
    #[arg(long, env = "CLICK_OUTBOX_CAPACITY", default_value_t = 64)]
    pub outbox_capacity: usize,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn round_settings(&self) -> RoundSettings {
        RoundSettings {
            round_duration: self.round_duration,
            break_duration: Duration::from_secs(self.break_duration as u64),
            join_grace: Duration::from_millis(self.join_grace_ms),
        }
    }
}
