//! Supervised windowing of a scaled series

use serde::{Deserialize, Serialize};

/// One training sample: `seq_len` inputs followed by `horizon` targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

/// Number of stride-1 windows a series of length `len` yields
pub fn window_count(len: usize, seq_len: usize, horizon: usize) -> usize {
    (len + 1).saturating_sub(seq_len + horizon)
}

/// Slide a `seq_len + horizon` frame across `series` with stride 1.
///
/// Windows come back in increasing start order. A series too short for a
/// single frame produces no windows.
pub fn make_windows(series: &[f64], seq_len: usize, horizon: usize) -> Vec<Window> {
    let frame = seq_len + horizon;
    (0..window_count(series.len(), seq_len, horizon))
        .map(|start| {
            let chunk = &series[start..start + frame];
            Window {
                input: chunk[..seq_len].to_vec(),
                target: chunk[seq_len..].to_vec(),
            }
        })
        .collect()
}
