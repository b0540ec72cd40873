use serde::{Deserialize, Serialize};

/// Read access to the two fields the spike filter looks at.
pub trait BalancePoint {
    fn timestamp(&self) -> i64;
    fn balance(&self) -> f64;
}

/// A single point of the balance history, timestamp in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSample")]
pub struct BalanceSample {
    pub timestamp: i64,
    pub balance: f64,
}

impl BalanceSample {
    pub fn new(timestamp: i64, balance: f64) -> Self {
        Self { timestamp, balance }
    }
}

impl BalancePoint for BalanceSample {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn balance(&self) -> f64 {
        self.balance
    }
}

impl BalancePoint for (i64, f64) {
    fn timestamp(&self) -> i64 {
        self.0
    }

    fn balance(&self) -> f64 {
        self.1
    }
}

impl BalancePoint for [f64; 2] {
    fn timestamp(&self) -> i64 {
        self[0] as i64
    }

    fn balance(&self) -> f64 {
        self[1]
    }
}

// The history endpoint sends `[ts, balance]` pairs, older builds send records.
// Timestamps can arrive as floats (seconds * 1000).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSample {
    Tuple(f64, f64),
    Record { timestamp: f64, balance: f64 },
}

impl From<RawSample> for BalanceSample {
    fn from(raw: RawSample) -> Self {
        match raw {
            RawSample::Tuple(timestamp, balance) | RawSample::Record { timestamp, balance } => {
                Self::new(timestamp as i64, balance)
            }
        }
    }
}

/// Response of the balance history endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceHistory {
    #[serde(default)]
    pub global: Vec<BalanceSample>,
    #[serde(default)]
    pub session: Vec<BalanceSample>,
}
