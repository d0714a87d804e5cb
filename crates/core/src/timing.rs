use serde::{Deserialize, Serialize};

use crate::session::SessionTurn;

/// Delays strictly above this count as long pauses.
pub const LONG_PAUSE_THRESHOLD_SEC: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub avg_response_delay_sec: f64,
    pub long_pauses_count: usize,
    pub total_turns: usize,
}

/// Computes response-timing statistics over the recorded turns.
///
/// Every individual delay counts: the main answer's delay from each turn,
/// plus the follow-up delay where one was answered. `total_turns` is the
/// length of that flattened sequence, so a question with an answered
/// follow-up contributes two. Downstream consumers rely on this counting,
/// so it is not the number of `SessionTurn`s despite the name.
pub fn summarize(turns: &[SessionTurn]) -> TimingSummary {
    let delays: Vec<f64> = turns
        .iter()
        .flat_map(|turn| {
            std::iter::once(turn.main_response_delay_sec).chain(turn.follow_up_response_delay_sec)
        })
        .collect();

    let avg = if delays.is_empty() {
        0.0
    } else {
        round2(delays.iter().sum::<f64>() / delays.len() as f64)
    };

    TimingSummary {
        avg_response_delay_sec: avg,
        long_pauses_count: delays
            .iter()
            .filter(|delay| **delay > LONG_PAUSE_THRESHOLD_SEC)
            .count(),
        total_turns: delays.len(),
    }
}

/// Rounds to two decimal places, the precision all delays are stored at.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
