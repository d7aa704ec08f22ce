//! Delayed monitor tap with slow drift correction
//!
//! The tap trails the primary read position by a fixed latency so the local
//! operator hears a phase-stable copy of the stream. A small integral
//! corrector absorbs drift between the read clock and the network clock one
//! sample at a time; a full snap happens only once tracking has fallen more
//! than two slots apart. 16-bit streams correct by fractional resampling so
//! the adjustment is inaudible; other widths skip whole samples.

use tracing::debug;

use crate::ring::RingStore;

/// Integral gain applied to the tracking error on every monitor read
const CORR_GAIN: f64 = 0.0003;

/// Tracking error beyond which the tap snaps instead of integrating, in slots
const SNAP_LIMIT_SLOTS: i64 = 2;

pub(crate) struct MonitorTap {
    /// Next logical byte this tap reads
    position: i64,
    /// Fractional-byte integrator; quantized once it reaches one sample step
    corr: f64,
    /// Target lag behind the primary read position, bytes
    latency: i64,
    slot_size: usize,
    /// One interleaved frame: channels * bytes_per_sample
    min_step: usize,
    bytes_per_sample: usize,
    /// Preallocated input window for the resampling path
    scratch: Vec<u8>,
    /// Net samples skipped (positive) or duplicated (negative) so far
    pub skew: i64,
    /// Last tracking error, in samples
    pub delta: i64,
}

impl MonitorTap {
    pub fn new(latency: i64, slot_size: usize, channels: usize, bytes_per_sample: usize) -> Self {
        let min_step = channels * bytes_per_sample;
        Self {
            position: 0,
            corr: 0.0,
            latency,
            slot_size,
            min_step,
            bytes_per_sample,
            scratch: vec![0u8; 2 * (slot_size + min_step)],
            skew: 0,
            delta: 0,
        }
    }

    /// Read one delayed slot into `dst`.
    ///
    /// `write_pos` and `read_pos` are the primary positions at call time; the
    /// caller holds the engine lock. Always fills exactly one slot.
    pub fn read_slot(&mut self, ring: &RingStore, write_pos: i64, read_pos: i64, dst: &mut [u8]) {
        if read_pos == 0 {
            dst.fill(0);
            return;
        }

        let slot = self.slot_size as i64;
        let min_step = self.min_step as i64;
        let d = read_pos - self.latency - self.position - slot;
        let mut out_len = self.slot_size;

        if d.abs() > SNAP_LIMIT_SLOTS * slot {
            self.position = read_pos - self.latency - slot;
            self.corr = 0.0;
            debug!(error_bytes = d, "monitor tap snapped to nominal position");
        } else {
            self.corr += CORR_GAIN * d as f64;
            if self.corr.abs() >= self.min_step as f64 {
                // Truncation keeps the quantization sign-symmetric
                let steps = (self.corr / self.min_step as f64) as i64;
                self.corr -= (steps * min_step) as f64;
                self.skew += steps;
                if self.bytes_per_sample == 2 {
                    out_len = (slot + steps * min_step) as usize;
                } else {
                    self.position += steps * min_step;
                }
            }
        }
        self.delta = d / min_step;

        if out_len == self.slot_size {
            let available = write_pos - self.position;
            let read_len = available.clamp(0, slot) as usize;
            ring.read_at(self.position, &mut dst[..read_len]);
            dst[read_len..].fill(0);
            self.position += slot;
        } else {
            self.read_resampled(ring, write_pos, out_len, dst);
        }
    }

    /// Map `out_len` input bytes onto one slot of output by per-channel
    /// linear interpolation of little-endian 16-bit samples.
    fn read_resampled(&mut self, ring: &RingStore, write_pos: i64, out_len: usize, dst: &mut [u8]) {
        let channels = self.min_step / self.bytes_per_sample;
        // One frame past out_len so the last interpolation pair exists
        let need = out_len + self.min_step;
        let available = (write_pos - self.position).clamp(0, need as i64) as usize;
        let scratch = &mut self.scratch[..need];
        ring.read_at(self.position, &mut scratch[..available]);
        scratch[available..].fill(0);

        let k = out_len as f64 / self.slot_size as f64;
        let frames_out = self.slot_size / self.min_step;
        for j in 0..frames_out {
            let t = j as f64 * k;
            let j1 = t as usize;
            let a = t - j1 as f64;
            for c in 0..channels {
                let p1 = j1 * self.min_step + c * 2;
                let p2 = p1 + self.min_step;
                let v1 = i16::from_le_bytes([scratch[p1], scratch[p1 + 1]]) as f64;
                let v2 = i16::from_le_bytes([scratch[p2], scratch[p2 + 1]]) as f64;
                let v = ((1.0 - a) * v1 + a * v2).round() as i16;
                let out = j * self.min_step + c * 2;
                dst[out..out + 2].copy_from_slice(&v.to_le_bytes());
            }
        }
        self.position += out_len as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_ring(capacity: usize, frames: usize, min_step: usize) -> RingStore {
        // Frame f carries ch0 = 100*f, ch1 = 100*f + 5 as little-endian i16
        let mut ring = RingStore::new(capacity);
        let mut bytes = Vec::new();
        for f in 0..frames {
            for c in 0..(min_step / 2) {
                let v = (100 * f + 5 * c) as i16;
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        ring.write_at(0, &bytes);
        ring
    }

    #[test]
    fn test_silence_before_first_primary_read() {
        let ring = RingStore::new(64);
        let mut tap = MonitorTap::new(16, 16, 2, 2);
        let mut dst = [0xffu8; 16];

        tap.read_slot(&ring, 32, 0, &mut dst);
        assert_eq!(dst, [0u8; 16]);
        assert_eq!(tap.skew, 0);
    }

    #[test]
    fn test_straight_copy_is_pure_delay() {
        let ring = ramp_ring(128, 16, 4);
        let mut tap = MonitorTap::new(16, 16, 2, 2);

        // read_pos = latency + position + slot keeps the error at zero
        let mut dst = [0u8; 16];
        tap.read_slot(&ring, 64, 32, &mut dst);

        let mut expected = [0u8; 16];
        ring.read_at(0, &mut expected);
        assert_eq!(dst, expected);
        assert_eq!(tap.delta, 0);
        assert_eq!(tap.skew, 0);
    }

    #[test]
    fn test_snap_on_large_error() {
        let ring = ramp_ring(128, 16, 4);
        let mut tap = MonitorTap::new(16, 16, 2, 2);

        // d = 96 - 16 - 0 - 16 = 64 = 4 slots, beyond the 2-slot limit
        let mut dst = [0u8; 16];
        tap.read_slot(&ring, 128, 96, &mut dst);

        // Snapped to 96 - 16 - 16 = 64, then read one slot from there
        let mut expected = [0u8; 16];
        ring.read_at(64, &mut expected);
        assert_eq!(dst, expected);
        assert_eq!(tap.delta, 16);
        assert_eq!(tap.corr, 0.0);
    }

    #[test]
    fn test_zero_pad_when_tap_outruns_writer() {
        let ring = ramp_ring(128, 16, 4);
        let mut tap = MonitorTap::new(16, 16, 2, 2);

        // Only 8 bytes exist between the tap and the writer
        let mut dst = [0xffu8; 16];
        tap.read_slot(&ring, 8, 32, &mut dst);

        let mut expected = [0u8; 16];
        ring.read_at(0, &mut expected[..8]);
        assert_eq!(dst, expected);
    }

    #[test]
    fn test_resample_stretches_input_window() {
        let ring = ramp_ring(128, 16, 4);
        let mut tap = MonitorTap::new(0, 16, 2, 2);
        // One full positive step pending: 16-bit path resamples 20 -> 16
        tap.corr = 4.2;

        let mut dst = [0u8; 16];
        tap.read_slot(&ring, 64, 16, &mut dst);

        assert_eq!(tap.skew, 1);
        assert!((tap.corr - 0.2).abs() < 1e-9);
        assert_eq!(tap.position, 20);

        // K = 20/16 = 1.25; frames are (0,5), (100,105), (200,205), ...
        let expect = |v: i16| v.to_le_bytes();
        let mut expected = Vec::new();
        for (ch0, ch1) in [(0, 5), (125, 130), (250, 255), (375, 380)] {
            expected.extend_from_slice(&expect(ch0));
            expected.extend_from_slice(&expect(ch1));
        }
        assert_eq!(dst, expected[..]);
    }

    #[test]
    fn test_skip_path_for_one_byte_samples() {
        let mut ring = RingStore::new(64);
        let bytes: Vec<u8> = (0..32).collect();
        ring.write_at(0, &bytes);

        let mut tap = MonitorTap::new(0, 8, 2, 1);
        tap.corr = 2.5; // one full 2-byte frame pending

        let mut dst = [0u8; 8];
        tap.read_slot(&ring, 32, 8, &mut dst);

        assert_eq!(tap.skew, 1);
        assert_eq!(dst, [2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(tap.position, 10);
    }

    #[test]
    fn test_integrator_stays_quiet_on_small_error() {
        let ring = ramp_ring(128, 16, 4);
        let mut tap = MonitorTap::new(16, 16, 2, 2);

        // d = 8, well inside a slot: integrates but never quantizes
        let mut dst = [0u8; 16];
        tap.read_slot(&ring, 64, 40, &mut dst);
        assert_eq!(tap.skew, 0);
        assert!((tap.corr - 0.0024).abs() < 1e-9);
        assert_eq!(tap.delta, 2);
    }
}
