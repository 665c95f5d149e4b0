//! Growable, byte-addressable stash buffer (spec.md §4.1, §9 "Growable
//! stash vs. ring buffer").
//!
//! The buffer never shrinks within a session; `stash_byte_start` is the
//! absolute source offset of byte zero of the buffer, so consumers can map
//! in-buffer positions back to absolute stream offsets.

const SLACK_BYTES: usize = 1024 * 1024;

/// Observed-throughput ladder, in KiB/s (spec.md §4.1).
const SPEED_LADDER_KB: [u32; 11] = [64, 128, 256, 384, 512, 768, 1024, 1536, 2048, 3072, 4096];

/// Snap an observed speed (KiB/s) to the nearest-lower ladder rung.
fn snap_to_ladder(speed_kbps: f64) -> u32 {
    SPEED_LADDER_KB
        .iter()
        .rev()
        .find(|&&rung| speed_kbps >= rung as f64)
        .copied()
        .unwrap_or(SPEED_LADDER_KB[0])
}

/// Compute the stash size (in bytes) for an observed speed, per spec.md
/// §4.1's piecewise rule.
pub fn compute_stash_size(speed_kbps: f64, is_live: bool) -> usize {
    let normalized = snap_to_ladder(speed_kbps);
    let kb = if is_live {
        normalized
    } else if normalized <= 512 {
        normalized
    } else if normalized <= 1024 {
        (normalized as f64 * 1.5).floor() as u32
    } else {
        normalized * 2
    };
    (kb.min(8192) as usize) * 1024
}

/// A growable stash buffer holding unconsumed bytes between chunk arrivals.
#[derive(Debug, Default)]
pub struct StashBuffer {
    data: Vec<u8>,
    /// Absolute source offset of `data[0]`.
    pub stash_byte_start: u64,
    capacity_target: usize,
}

impl StashBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new(), stash_byte_start: 0, capacity_target: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Ensure backing storage can hold at least `stash_size + 1 MiB`,
    /// growing by doubling + slack, never shrinking (spec.md §4.1).
    pub fn ensure_capacity(&mut self, stash_size: usize) {
        let needed = stash_size + SLACK_BYTES;
        if needed <= self.capacity_target {
            return;
        }
        let mut new_cap = self.capacity_target.max(1);
        while new_cap < needed {
            new_cap = new_cap * 2 + SLACK_BYTES;
        }
        self.data.reserve(new_cap.saturating_sub(self.data.capacity()));
        self.capacity_target = new_cap;
    }

    /// Append bytes to the tail of the stash.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Drop the first `consumed` bytes, advancing `stash_byte_start`.
    pub fn drain_front(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }
        self.data.drain(0..consumed.min(self.data.len()));
        self.stash_byte_start += consumed as u64;
    }

    /// Reset to empty at a new absolute offset (used on seek/abort).
    pub fn reset_at(&mut self, abs_offset: u64) {
        self.data.clear();
        self.stash_byte_start = abs_offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snaps_to_nearest_lower_ladder_rung() {
        assert_eq!(snap_to_ladder(500.0), 384);
        assert_eq!(snap_to_ladder(63.0), 64);
        assert_eq!(snap_to_ladder(10_000.0), 4096);
    }

    #[test]
    fn live_mode_uses_snapped_value_directly() {
        assert_eq!(compute_stash_size(700.0, true), 512 * 1024);
    }

    #[test]
    fn vod_mode_applies_piecewise_multiplier() {
        assert_eq!(compute_stash_size(400.0, false), 384 * 1024); // <=512: as-is
        assert_eq!(compute_stash_size(900.0, false), (768.0 * 1.5) as usize * 1024); // 512-1024: *1.5
        assert_eq!(compute_stash_size(5000.0, false), 4096 * 2 * 1024); // >1024: *2, capped at 8192
    }

    #[test]
    fn drain_front_advances_byte_start() {
        let mut stash = StashBuffer::new();
        stash.append(&[1, 2, 3, 4, 5]);
        stash.drain_front(2);
        assert_eq!(stash.as_slice(), &[3, 4, 5]);
        assert_eq!(stash.stash_byte_start, 2);
    }
}
