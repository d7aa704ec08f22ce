//! Jitter engine coordinating the network producer and the audio consumer
//!
//! A network receiver thread inserts slots and loss notifications; the audio
//! callback drains primary and monitor slots at the sound card rate. All
//! state lives behind a single mutex with bounded critical sections, and the
//! consumer is wait-free for data: a starved read produces silence instead of
//! blocking on the network.

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::monitor::MonitorTap;
use crate::policy::{correction_delta, Correction, Tolerances};
use crate::ring::RingStore;
use crate::stats::{Stats, StatsSnapshot};

struct EngineState {
    ring: RingStore,
    /// Next logical byte the producer writes
    write_pos: i64,
    /// Next logical byte the primary consumer reads
    read_pos: i64,
    monitor: MonitorTap,
    /// Smoothed occupancy estimate in bytes
    level_cur: f64,
    /// Decay applied to level_cur on each read, bytes
    level_down_rate: f64,
    /// Occupancy ceiling; grows if oversized slots arrive
    max_latency: i64,
    slot_size: usize,
    tolerances: Tolerances,
    /// False until the first insert; inactive reads are silence
    active: bool,
    stats: Stats,
    /// Window baseline for interval reports
    baseline: StatsSnapshot,
}

/// Adaptive jitter buffer engine.
///
/// Producer side: [`insert`](Self::insert) and
/// [`process_loss`](Self::process_loss). Consumer side:
/// [`read`](Self::read) and [`read_monitor`](Self::read_monitor). The engine
/// runs no threads of its own; the four operations serialize on one internal
/// mutex and never block beyond it.
pub struct JitterEngine {
    state: Mutex<EngineState>,
    /// Immutable copy so callers can size buffers without taking the lock
    slot_size: usize,
}

impl JitterEngine {
    /// Create an engine from a validated configuration.
    ///
    /// The write position is preloaded to `max_latency` so the first reads
    /// drain silence while the buffer fills toward its target.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let max_latency = config.max_latency as i64;
        let tolerances = Tolerances::for_strategy(config.strategy, config.slot_size, max_latency)?;

        debug!(
            slot_size = config.slot_size,
            max_latency = config.max_latency,
            total_size = config.total_size,
            strategy = config.strategy,
            "creating jitter engine"
        );

        let monitor = MonitorTap::new(
            config.monitor_latency as i64,
            config.slot_size,
            config.channels,
            config.bytes_per_sample,
        );

        let state = EngineState {
            ring: RingStore::new(config.total_size),
            write_pos: max_latency,
            read_pos: 0,
            monitor,
            level_cur: max_latency as f64,
            level_down_rate: 0.01 * config.slot_size as f64,
            max_latency,
            slot_size: config.slot_size,
            tolerances,
            active: false,
            stats: Stats {
                level: max_latency,
                ..Default::default()
            },
            baseline: StatsSnapshot::default(),
        };

        Ok(Self {
            state: Mutex::new(state),
            slot_size: config.slot_size,
        })
    }

    /// Insert one arrived slot, preceded by `lost_len` bytes of loss fill.
    ///
    /// Runs the latency-correction policy against the occupancy seen before
    /// this slot's write, then commits the slot at the write position.
    pub fn insert(&self, slot: &[u8], lost_len: usize) {
        let mut guard = self.state.lock();
        let s = &mut *guard;
        let len = slot.len();

        if !s.active {
            s.active = true;
            debug!(len, "first slot arrived, engine active");
        }
        if (len + s.slot_size) as i64 > s.max_latency {
            s.max_latency = (len + s.slot_size) as i64;
            debug!(max_latency = s.max_latency, "raised latency window for oversized slot");
        }
        if lost_len > 0 {
            s.apply_loss(lost_len);
        }

        // Flush the per-interval read accounting into skew and underruns
        s.stats.skew_raw += s.stats.reads_new - len as i64;
        s.stats.reads_new = 0;
        s.stats.underruns += s.stats.underruns_new;
        s.stats.underruns_new = 0;
        s.stats.level = s.slot_size as i64 * (s.level_cur / s.slot_size as f64).ceil() as i64;

        let available = s.write_pos - s.read_pos;
        let (delta, branch) = correction_delta(
            available,
            len,
            s.level_cur,
            s.slot_size,
            s.max_latency,
            &s.tolerances,
        );
        match branch {
            Correction::Reset => {
                s.stats.buf_inc_underrun += (-delta) as u64;
                warn!(available, "read position ran far past write, resetting");
            }
            Correction::Overflow => {
                s.stats.overflows += delta as u64;
                s.stats.buf_dec_overflow += delta as u64;
                debug!(dropped = delta, "occupancy above latency window, dropping audio");
            }
            Correction::UnderrunInc => {
                s.stats.buf_inc_underrun += (-delta) as u64;
                trace!(grown = -delta, "starved consumer, growing buffer");
            }
            Correction::Compensate => {
                s.stats.underruns += s.slot_size as u64;
                s.stats.buf_inc_compensate += s.slot_size as u64;
            }
            Correction::None => {}
        }
        s.read_pos += delta;
        s.level_cur -= delta as f64;
        if s.level_cur > s.max_latency as f64 {
            s.level_cur = s.max_latency as f64;
        }

        s.ring.write_at(s.write_pos, slot);
        s.write_pos += len as i64;
    }

    /// Read exactly one slot into `dst`, padding with silence on underrun.
    ///
    /// The consumer's clock is authoritative: the read position advances by a
    /// full slot even when less data was available.
    ///
    /// # Panics
    ///
    /// If `dst` is not exactly one slot long.
    pub fn read(&self, dst: &mut [u8]) {
        assert_eq!(dst.len(), self.slot_size, "read buffer must be one slot");
        let mut guard = self.state.lock();
        let s = &mut *guard;
        if !s.active {
            dst.fill(0);
            return;
        }

        s.stats.reads_new += s.slot_size as i64;
        let available = s.write_pos - s.read_pos;
        if (available as f64) < s.level_cur {
            s.level_cur = (s.level_cur - s.level_down_rate).max(available as f64);
        } else {
            s.level_cur = available as f64;
        }

        let read_len = available.clamp(0, s.slot_size as i64) as usize;
        s.ring.read_at(s.read_pos, &mut dst[..read_len]);
        dst[read_len..].fill(0);
        if read_len < s.slot_size {
            s.stats.underruns_new += (s.slot_size - read_len) as u64;
            trace!(read_len, "short read, padded with silence");
        }
        s.read_pos += s.slot_size as i64;
    }

    /// Read one slot from the delayed monitor tap.
    ///
    /// # Panics
    ///
    /// If `dst` is not exactly one slot long.
    pub fn read_monitor(&self, dst: &mut [u8]) {
        assert_eq!(dst.len(), self.slot_size, "monitor buffer must be one slot");
        let mut guard = self.state.lock();
        let s = &mut *guard;
        let EngineState {
            ref ring,
            write_pos,
            read_pos,
            ref mut monitor,
            ..
        } = *s;
        monitor.read_slot(ring, write_pos, read_pos, dst);
    }

    /// Standalone loss notification: zero-fill the lost span and shed the
    /// matching amount of target level.
    pub fn process_loss(&self, lost_len: usize) {
        let mut s = self.state.lock();
        s.apply_loss(lost_len);
    }

    /// Absolute telemetry snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.state.lock().snapshot()
    }

    /// Telemetry delta since the previous call, advancing the window.
    /// Gauges (`level`, `monitor_delta`) carry their current value.
    pub fn interval_report(&self) -> StatsSnapshot {
        let mut s = self.state.lock();
        let snap = s.snapshot();
        let report = snap.delta_since(&s.baseline);
        s.baseline = snap;
        report
    }

    /// Whether the first slot has arrived
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Slot size in bytes, fixed at construction
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Current occupancy ceiling in bytes
    pub fn max_latency(&self) -> i64 {
        self.state.lock().max_latency
    }

    /// Smoothed occupancy rounded up to a slot multiple
    pub fn level(&self) -> i64 {
        self.state.lock().stats.level
    }
}

impl EngineState {
    /// Zero-fill `lost_len` missing bytes at the write position, shedding
    /// target level first so the loss does not read as extra latency.
    fn apply_loss(&mut self, lost_len: usize) {
        let mut lost = lost_len as i64;
        self.stats.skew_raw -= lost;

        let available = self.write_pos - self.read_pos;
        let over = (available + lost - self.max_latency).min(lost);
        if over > 0 {
            // Fill only up to the latency window; the rest is dropped
            lost -= over;
            self.level_cur -= over as f64;
            self.stats.buf_dec_pkt_loss += over as u64;
        } else if self.level_cur > self.max_latency as f64 - self.tolerances.overflow_dec {
            let dec = lost.min(self.slot_size as i64);
            self.level_cur -= dec as f64;
            self.stats.buf_dec_pkt_loss += dec as u64;
        }

        self.ring.zero_at(self.write_pos, lost as usize);
        self.stats.underruns += lost as u64;
        self.write_pos += lost;
        debug!(filled = lost, "zero-filled lost span");
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            underruns: self.stats.underruns + self.stats.underruns_new,
            overflows: self.stats.overflows,
            level: self.stats.level,
            skew_raw: self.stats.skew_raw,
            buf_inc_underrun: self.stats.buf_inc_underrun,
            buf_inc_compensate: self.stats.buf_inc_compensate,
            buf_dec_overflow: self.stats.buf_dec_overflow,
            buf_dec_pkt_loss: self.stats.buf_dec_pkt_loss,
            monitor_skew: self.monitor.skew,
            monitor_delta: self.monitor.delta,
        }
    }
}
