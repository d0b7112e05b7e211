//! Packet index tracking: rollover counter estimation and replay windows

/// Replay protection using a 64-packet sliding window (RFC 3711 section 3.3.2)
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    /// Highest index accepted so far
    highest: u64,
    /// Bit n set means `highest - n` has been seen
    bitmap: u64,
    initialized: bool,
}

impl ReplayWindow {
    pub const SIZE: u64 = 64;

    pub fn new() -> Self {
        Self::default()
    }

    /// True if `index` has not been seen and is not too old
    pub fn check(&self, index: u64) -> bool {
        self.contains(index) == Some(false)
    }

    /// Whether `index` has been marked, or `None` when it lies below the
    /// window and the answer is unknown
    pub fn contains(&self, index: u64) -> Option<bool> {
        if !self.initialized || index > self.highest {
            return Some(false);
        }

        let diff = self.highest - index;
        if diff >= Self::SIZE {
            return None;
        }
        Some(self.bitmap & (1u64 << diff) != 0)
    }

    /// Mark `index` as seen
    pub fn update(&mut self, index: u64) {
        if !self.initialized {
            self.initialized = true;
            self.highest = index;
            self.bitmap = 1;
            return;
        }

        if index > self.highest {
            let shift = index - self.highest;
            self.bitmap = if shift >= Self::SIZE {
                0
            } else {
                self.bitmap << shift
            };
            self.bitmap |= 1;
            self.highest = index;
        } else {
            let diff = self.highest - index;
            if diff < Self::SIZE {
                self.bitmap |= 1u64 << diff;
            }
        }
    }

    pub fn highest(&self) -> Option<u64> {
        self.initialized.then_some(self.highest)
    }
}

/// Rollover counter for one SSRC (RFC 3711 section 3.3.1 and appendix A)
#[derive(Debug, Clone, Default)]
pub struct RolloverCounter {
    roc: u32,
    /// Highest sequence number seen with `roc`
    highest_seq: u16,
    initialized: bool,
}

impl RolloverCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roc(&self) -> u32 {
        self.roc
    }

    /// Guess the 48-bit packet index for `seq` without committing it
    pub fn estimate(&self, seq: u16) -> u64 {
        if !self.initialized {
            return seq as u64;
        }

        let s_l = self.highest_seq as i32;
        let seq_i = seq as i32;
        let guess = if s_l < 0x8000 {
            if seq_i - s_l > 0x8000 {
                // Late packet from before the last wrap
                self.roc.checked_sub(1).unwrap_or(self.roc)
            } else {
                self.roc
            }
        } else if s_l - 0x8000 > seq_i {
            self.roc.wrapping_add(1)
        } else {
            self.roc
        };

        ((guess as u64) << 16) | seq as u64
    }

    /// Commit an index that has been accepted
    pub fn update(&mut self, index: u64) {
        let roc = (index >> 16) as u32;
        let seq = index as u16;

        if !self.initialized {
            self.initialized = true;
            self.roc = roc;
            self.highest_seq = seq;
            return;
        }

        if roc > self.roc || (roc == self.roc && seq > self.highest_seq) {
            self.roc = roc;
            self.highest_seq = seq;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_window_basic() {
        let mut window = ReplayWindow::new();
        assert!(window.check(100));
        window.update(100);
        assert!(!window.check(100));

        // Out of order but inside the window
        assert!(window.check(98));
        window.update(98);
        assert!(!window.check(98));
        assert!(window.check(99));
        assert_eq!(window.highest(), Some(100));
    }

    #[test]
    fn test_replay_window_too_old() {
        let mut window = ReplayWindow::new();
        window.update(1000);
        assert!(window.check(1000 - 63));
        assert!(!window.check(1000 - 64));
    }

    #[test]
    fn test_contains_separates_duplicates_from_old_indices() {
        let mut window = ReplayWindow::new();
        assert_eq!(window.contains(7), Some(false));
        window.update(1000);
        window.update(990);

        assert_eq!(window.contains(1000), Some(true));
        assert_eq!(window.contains(990), Some(true));
        assert_eq!(window.contains(995), Some(false));
        assert_eq!(window.contains(1001), Some(false));
        // Never marked, but too old to say
        assert_eq!(window.contains(1000 - 64), None);
        assert!(!window.check(1000 - 64));
    }

    #[test]
    fn test_replay_window_large_jump() {
        let mut window = ReplayWindow::new();
        window.update(5);
        window.update(5 + 64);
        assert!(!window.check(5 + 64));
        // Everything before the jump fell out of the window
        assert!(!window.check(5));
        assert!(window.check(5 + 63));

        window.update(1 << 40);
        assert!(!window.check(1 << 40));
        assert!(window.check((1 << 40) - 1));
    }

    #[test]
    fn test_roc_first_packet() {
        let roc = RolloverCounter::new();
        assert_eq!(roc.estimate(65000), 65000);
    }

    #[test]
    fn test_roc_wraps_forward() {
        let mut roc = RolloverCounter::new();
        roc.update(roc.estimate(65534));
        roc.update(roc.estimate(65535));

        let index = roc.estimate(0);
        assert_eq!(index, 1 << 16);
        roc.update(index);
        assert_eq!(roc.roc(), 1);
        assert_eq!(roc.estimate(1), (1 << 16) | 1);
    }

    #[test]
    fn test_roc_late_packet_from_previous_cycle() {
        let mut roc = RolloverCounter::new();
        roc.update((1 << 16) | 2);

        // 65530 arriving after the wrap belongs to ROC 0
        assert_eq!(roc.estimate(65530), 65530);
        roc.update(65530);
        assert_eq!(roc.roc(), 1);
    }

    #[test]
    fn test_roc_does_not_underflow() {
        let mut roc = RolloverCounter::new();
        roc.update(5);
        assert_eq!(roc.estimate(60000), 60000);
    }
}
