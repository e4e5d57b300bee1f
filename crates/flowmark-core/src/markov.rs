use serde::{Deserialize, Serialize};

use crate::models::Packet;

// ---------------------------------------------------------------------------
// Packet-size states and their transition probabilities
// ---------------------------------------------------------------------------

pub const STATES: usize = 3;

/// State assumed before the first packet of a window. No transition is
/// counted out of it for the first packet itself.
pub const NEUTRAL_STATE: usize = 1;

pub static MATRIX_COLUMNS: [&str; STATES * STATES] = [
    "M_00", "M_01", "M_02", "M_10", "M_11", "M_12", "M_20", "M_21", "M_22",
];

/// Byte-length boundaries of the three size states:
/// `len < small` is state 0, `small <= len < large` state 1, the rest state 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeThresholds {
    pub small: u32,
    pub large: u32,
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            small: 150,
            large: 300,
        }
    }
}

impl SizeThresholds {
    pub fn state_of(&self, length: u32) -> usize {
        if length < self.small {
            0
        } else if length < self.large {
            1
        } else {
            2
        }
    }
}

/// Row-stochastic 3x3 matrix; rows without observed transitions are all zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransitionMatrix {
    rows: [[f64; STATES]; STATES],
}

impl TransitionMatrix {
    pub fn from_packets(packets: &[Packet], thresholds: &SizeThresholds) -> Self {
        let mut counts = [[0u64; STATES]; STATES];
        let mut prev = NEUTRAL_STATE;

        for pkt in packets.iter().skip(1) {
            let state = thresholds.state_of(pkt.length);
            counts[prev][state] += 1;
            prev = state;
        }

        Self::from_counts(&counts)
    }

    pub fn from_counts(counts: &[[u64; STATES]; STATES]) -> Self {
        let mut rows = [[0.0; STATES]; STATES];
        for (row, count) in rows.iter_mut().zip(counts) {
            let total: u64 = count.iter().sum();
            if total == 0 {
                continue;
            }
            for (p, &c) in row.iter_mut().zip(count) {
                *p = c as f64 / total as f64;
            }
        }
        Self { rows }
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    /// `(M_ij, probability)` pairs in row-major order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        MATRIX_COLUMNS
            .iter()
            .zip(self.rows.iter().flatten())
            .map(|(&name, &p)| (name, p))
    }
}
