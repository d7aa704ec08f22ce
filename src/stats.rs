//! Telemetry counters for the jitter engine

use serde::Serialize;

/// Internal counter block, mutated under the engine lock.
///
/// `underruns_new` and `reads_new` accumulate between inserts and are flushed
/// into their running totals (or into the skew) when the next slot arrives.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub underruns: u64,
    pub underruns_new: u64,
    pub overflows: u64,
    pub reads_new: i64,
    pub skew_raw: i64,
    pub buf_inc_underrun: u64,
    pub buf_inc_compensate: u64,
    pub buf_dec_overflow: u64,
    pub buf_dec_pkt_loss: u64,
    /// Smoothed occupancy rounded up to a slot multiple, published on insert
    pub level: i64,
}

/// Point-in-time view of the engine counters.
///
/// `level` and `monitor_delta` are gauges; everything else accumulates over
/// the engine lifetime. Units are bytes except `monitor_skew` and
/// `monitor_delta`, which count samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub underruns: u64,
    pub overflows: u64,
    pub level: i64,
    pub skew_raw: i64,
    pub buf_inc_underrun: u64,
    pub buf_inc_compensate: u64,
    pub buf_dec_overflow: u64,
    pub buf_dec_pkt_loss: u64,
    pub monitor_skew: i64,
    pub monitor_delta: i64,
}

impl StatsSnapshot {
    /// Difference since `base`, for per-interval reporting.
    /// Counters subtract; gauges keep their end-of-window value.
    pub fn delta_since(&self, base: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            underruns: self.underruns - base.underruns,
            overflows: self.overflows - base.overflows,
            level: self.level,
            skew_raw: self.skew_raw - base.skew_raw,
            buf_inc_underrun: self.buf_inc_underrun - base.buf_inc_underrun,
            buf_inc_compensate: self.buf_inc_compensate - base.buf_inc_compensate,
            buf_dec_overflow: self.buf_dec_overflow - base.buf_dec_overflow,
            buf_dec_pkt_loss: self.buf_dec_pkt_loss - base.buf_dec_pkt_loss,
            monitor_skew: self.monitor_skew - base.monitor_skew,
            monitor_delta: self.monitor_delta,
        }
    }
}
