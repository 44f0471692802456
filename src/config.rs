//! Runtime configuration
//!
//! Timing and sizing knobs shared by the room actors and the connection
//! pumps. The defaults match the production service; tests shrink them.

use std::time::Duration;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:3005";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the TCP listener binds to
    pub addr: String,
    /// Capacity of each client's outbound mailbox
    pub mailbox_capacity: usize,
    /// Capacity of each room's command channel
    pub room_buffer: usize,
    /// Largest inbound WebSocket message (and frame) in bytes
    pub max_message_size: usize,
    /// Read-side idle deadline, refreshed by every pong
    pub pong_wait: Duration,
    /// Interval between keepalive pings; must be shorter than `pong_wait`
    pub ping_period: Duration,
    /// Upper bound on a single frame write
    pub write_wait: Duration,
    /// Bounded wait applied by callers of room queries and renames
    pub query_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            addr: DEFAULT_ADDR.to_string(),
            mailbox_capacity: 256,
            room_buffer: 256,
            max_message_size: 512,
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait: Duration::from_secs(10),
            query_timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Mailbox size as used for the channel; zero is raised to one
    pub fn mailbox_bound(&self) -> usize {
        self.mailbox_capacity.max(1)
    }

    /// Room command channel size; zero is raised to one
    pub fn room_bound(&self) -> usize {
        self.room_buffer.max(1)
    }

    /// Default configuration bound to `addr`
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }
}
