//! Runtime tunables for the coordinator.

use std::time::Duration;

/// Knobs the reference behavior hard-codes, kept as configuration so
/// deployments and tests can adjust them.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a disconnected player may rejoin before forfeiting.
    pub reconnect_grace: Duration,
    /// Points awarded per claimed word.
    pub points_per_word: u32,
    /// Value the pre-game countdown starts from.
    pub countdown_start: u8,
    /// Delay between countdown ticks.
    pub countdown_tick: Duration,
    /// Maximum accepted chat message length after trimming.
    pub chat_max_len: usize,
    /// Outbound messages buffered per connection; sends beyond it are
    /// dropped rather than blocking the room.
    pub outbound_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(10),
            points_per_word: 2,
            countdown_start: 3,
            countdown_tick: Duration::from_secs(1),
            chat_max_len: 500,
            outbound_buffer: 64,
        }
    }
}
