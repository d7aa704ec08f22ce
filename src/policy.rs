//! Latency-correction policy: strategy presets and the per-insert decision
//!
//! The policy runs once per insert, before the slot is written, and yields a
//! signed byte adjustment to the read position. Negative deltas move the
//! read position back (buffer grows, concealing underruns); positive deltas
//! drop buffered audio to shed latency.

use crate::error::{JitterError, Result};

/// Tolerances selected by the correction strategy, in bytes.
///
/// Strategy 0 never drops late audio and never pushes compensation slots;
/// strategy 1 additionally softens overflow recovery to a single slot;
/// strategy 2 tightens all tolerances to track the latency target closely.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tolerances {
    pub underrun_inc: f64,
    pub corr_inc: f64,
    pub overflow_dec: f64,
    pub overflow_drop_step: i64,
}

impl Tolerances {
    /// Build the preset for a strategy selector.
    ///
    /// Tolerances are fixed at construction from the initial slot size and
    /// latency window; they do not track later `max_latency` growth.
    pub fn for_strategy(strategy: u8, slot_size: usize, max_latency: i64) -> Result<Self> {
        let slot = slot_size as f64;
        let max = max_latency as f64;

        let mut t = Tolerances {
            underrun_inc: -10.0 * slot,
            corr_inc: 100.0 * max,
            overflow_dec: 100.0 * max,
            overflow_drop_step: max_latency / 2,
        };
        match strategy {
            0 => {}
            1 => {
                t.overflow_drop_step = slot_size as i64;
            }
            2 => {
                t.underrun_inc = 1.1 * slot;
                t.corr_inc = 1.2 * slot;
                t.overflow_dec = 0.02 * slot;
                t.overflow_drop_step = slot_size as i64;
            }
            other => return Err(JitterError::UnknownStrategy(other)),
        }

        if t.corr_inc <= t.underrun_inc {
            return Err(JitterError::ToleranceOrdering {
                corr_inc: t.corr_inc,
                underrun_inc: t.underrun_inc,
            });
        }
        Ok(t)
    }
}

/// Which correction branch fired, for counter accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Correction {
    None,
    /// Consumer raced far past the producer; snap read back to write
    Reset,
    /// Occupancy would exceed the latency window; drop buffered audio
    Overflow,
    /// Consumer is starved; move read back by up to one slot
    UnderrunInc,
    /// Occupancy persistently below target; grow by one slot
    Compensate,
}

/// Decide the signed read-position adjustment for one insert.
///
/// `available` is the occupancy before this insert's own write. Branches are
/// tried in order; first match wins.
pub(crate) fn correction_delta(
    available: i64,
    len: usize,
    level_cur: f64,
    slot_size: usize,
    max_latency: i64,
    tol: &Tolerances,
) -> (i64, Correction) {
    let slot = slot_size as i64;
    let len = len as i64;

    if available < -5 * (slot + len) {
        (available, Correction::Reset)
    } else if available + len > max_latency {
        (tol.overflow_drop_step, Correction::Overflow)
    } else if available < 0 && level_cur < max_latency as f64 - tol.underrun_inc {
        (-(-available).min(slot), Correction::UnderrunInc)
    } else if level_cur < max_latency as f64 - tol.corr_inc {
        (-slot, Correction::Compensate)
    } else {
        (0, Correction::None)
    }
}
