#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::BalancePoint;

/// Thresholds for spike detection. Defaults match the dashboard's behaviour:
/// a >30% move that reverts by >15% within one minute is a sampling artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeFilterConfig {
    /// Relative change against the last kept sample that flags a candidate.
    pub spike_threshold: f64,
    /// Recovery threshold as a fraction of `spike_threshold`.
    pub recovery_ratio: f64,
    /// Lookahead window in the same unit as the timestamps (ms).
    pub window_ms: i64,
    /// Floor for the denominator of relative changes.
    pub epsilon: f64,
}

impl Default for SpikeFilterConfig {
    fn default() -> Self {
        Self {
            spike_threshold: 0.30,
            recovery_ratio: 0.5,
            window_ms: 60_000,
            epsilon: 0.01,
        }
    }
}

impl SpikeFilterConfig {
    pub fn recovery_threshold(&self) -> f64 {
        self.spike_threshold * self.recovery_ratio
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.spike_threshold > 0.0) {
            errors.push("spike_threshold must be > 0".to_string());
        }
        if !(self.recovery_ratio > 0.0 && self.recovery_ratio <= 1.0) {
            errors.push("recovery_ratio must be in (0, 1]".to_string());
        }
        if self.window_ms <= 0 {
            errors.push("window_ms must be > 0".to_string());
        }
        if !(self.epsilon > 0.0) {
            errors.push("epsilon must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// What a filtering pass kept and dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub input_len: usize,
    pub kept_len: usize,
    pub removed: usize,
    pub first: Option<(i64, f64)>,
    pub last: Option<(i64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct SpikeFilter {
    config: SpikeFilterConfig,
}

impl SpikeFilter {
    pub fn new(config: SpikeFilterConfig) -> Self {
        Self { config }
    }

    pub fn filter<T: BalancePoint + Clone>(&self, history: &[T]) -> Vec<T> {
        self.filter_by(history, T::timestamp, T::balance)
    }

    /// Runs the filter with caller-supplied accessors, so any sample shape works
    /// without implementing [`BalancePoint`].
    pub fn filter_by<T, FT, FB>(&self, history: &[T], timestamp_of: FT, balance_of: FB) -> Vec<T>
    where
        T: Clone,
        FT: Fn(&T) -> i64,
        FB: Fn(&T) -> f64,
    {
        if history.len() < 2 {
            return history.to_vec();
        }

        let cfg = &self.config;
        let recovery_threshold = cfg.recovery_threshold();
        let relative = |from: f64, to: f64| (to - from).abs() / from.max(cfg.epsilon);

        let mut filtered: Vec<T> = Vec::with_capacity(history.len());
        filtered.push(history[0].clone());

        for (i, current) in history.iter().enumerate().skip(1) {
            // filtered is never empty
            let prev_balance = filtered.last().map(&balance_of).unwrap_or_default();
            let curr_balance = balance_of(current);
            let curr_ts = timestamp_of(current);

            if relative(prev_balance, curr_balance) <= cfg.spike_threshold {
                filtered.push(current.clone());
                continue;
            }

            let mut is_spike = false;
            for next in &history[i + 1..] {
                let time_diff = timestamp_of(next).saturating_sub(curr_ts);
                if time_diff < cfg.window_ms
                    && relative(curr_balance, balance_of(next)) > recovery_threshold
                {
                    is_spike = true;
                    break;
                }
                if time_diff >= cfg.window_ms {
                    break;
                }
            }

            if is_spike {
                debug!(
                    "Dropping balance spike at {}: {:.2} (previous kept {:.2})",
                    curr_ts, curr_balance, prev_balance
                );
            } else {
                filtered.push(current.clone());
            }
        }

        filtered
    }

    pub fn filter_with_summary<T: BalancePoint + Clone>(&self, history: &[T]) -> (Vec<T>, HistorySummary) {
        let filtered = self.filter(history);
        let point = |s: &T| (s.timestamp(), s.balance());
        let summary = HistorySummary {
            input_len: history.len(),
            kept_len: filtered.len(),
            removed: history.len() - filtered.len(),
            first: filtered.first().map(point),
            last: filtered.last().map(point),
        };
        (filtered, summary)
    }
}

/// Filters with the default thresholds.
pub fn filter_balance_spikes<T: BalancePoint + Clone>(history: &[T]) -> Vec<T> {
    SpikeFilter::default().filter(history)
}
