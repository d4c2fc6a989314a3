//! Final standings and per-player tallies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::PlayerId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub tag: PlayerId,
    /// 1 is the winner.
    pub rank: usize,
    pub last_frame_alive: i64,
    pub init_response_time: u32,
    pub average_frame_response_time: f64,
    /// Ships ever owned: initial fleet plus everything produced.
    pub total_ship_count: u32,
    pub damage_dealt: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStatistics {
    pub player_statistics: Vec<PlayerStatistics>,
    /// Players removed for timing out or erroring.
    pub timeout_tags: BTreeSet<PlayerId>,
}
