/// Fixed-depth shift register used to move a signal's transitions later by a
/// whole number of ticks.
///
/// Bit 0 is the head. After [`DelayLine::push`] the tail holds the value
/// pushed `depth - 1` calls earlier, so with the line registered once per tick
/// the visible output lags its source by exactly `depth` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayLine {
    bits: u32,
    depth: u8,
}

impl DelayLine {
    pub const MAX_DEPTH: u8 = 32;

    /// A line of `depth` stages, every stage holding `fill`.
    pub fn new(depth: u8, fill: bool) -> Self {
        let depth = depth.clamp(1, Self::MAX_DEPTH);
        let line = Self { bits: 0, depth };
        Self {
            bits: if fill { line.mask() } else { 0 },
            depth,
        }
    }

    fn mask(&self) -> u32 {
        if self.depth >= 32 {
            u32::MAX
        } else {
            (1u32 << self.depth) - 1
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Shift `bit` into the head, dropping the oldest stage.
    #[must_use]
    pub fn push(self, bit: bool) -> Self {
        Self {
            bits: ((self.bits << 1) | bit as u32) & self.mask(),
            depth: self.depth,
        }
    }

    /// Value currently driven out of the line.
    pub fn tail(&self) -> bool {
        (self.bits >> (self.depth - 1)) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill() {
        assert!(DelayLine::new(1, true).tail());
        assert!(!DelayLine::new(3, false).tail());
        assert!(DelayLine::new(32, true).tail());
    }

    #[test]
    fn test_depth_one_is_a_register() {
        let line = DelayLine::new(1, false).push(true);
        assert!(line.tail());
        assert!(!line.push(false).tail());
    }

    #[test]
    fn test_pulse_travels_depth_stages() {
        let mut line = DelayLine::new(3, false).push(true);
        let mut seen = vec![line.tail()];
        for _ in 0..4 {
            line = line.push(false);
            seen.push(line.tail());
        }
        assert_eq!(seen, [false, false, true, false, false]);
    }

    #[test]
    fn test_depth_is_clamped() {
        assert_eq!(DelayLine::new(0, false).depth(), 1);
        assert_eq!(DelayLine::new(40, false).depth(), DelayLine::MAX_DEPTH);
    }
}
