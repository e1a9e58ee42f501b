use chrono::{DateTime, Local};
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use mic_level::SampleRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub sequence: u64,           // Increments once per completed window
    pub channel: u8,
    pub level: i32,              // 0..=scale_max
    pub scale_max: i32,
    pub window_ms: u32,
    pub timestamp: DateTime<Local>,
}

impl LevelReport {
    pub fn new(sequence: u64, request: &SampleRequest, level: i32) -> Self {
        LevelReport {
            sequence,
            channel: request.channel.index(),
            level,
            scale_max: request.window.scale_max,
            window_ms: request.window.window_ms,
            timestamp: Local::now(),
        }
    }
}

/// Replaces the shared report. Returns false when the lock is poisoned.
pub fn publish(latest: &Mutex<Option<LevelReport>>, report: LevelReport) -> bool {
    match latest.lock() {
        Ok(mut locked) => {
            *locked = Some(report);
            true
        }
        Err(_) => {
            error!("Level state lock poisoned, report {} not published", report.sequence);
            false
        }
    }
}
