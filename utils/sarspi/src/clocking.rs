//! Chip-select and serial clock sources. Both are registered by the engine;
//! these are the values entering the registers.

use crate::counter::Timing;

/// Active-low select: asserted for exactly the active window.
pub fn chip_select_n(timing: &Timing, counter: u32) -> bool {
    !timing.is_active(counter)
}

/// Raw serial clock before the delay line. Idle-high.
pub fn raw_sclk(timing: &Timing, counter: u32) -> bool {
    !timing.is_active(counter) || timing.sclk_phase_bit(counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_clock_shape() {
        let timing = Timing::new(&EngineConfig::default()).unwrap();
        let wave: Vec<bool> = (0..8).map(|c| raw_sclk(&timing, c)).collect();
        assert_eq!(wave, [false, false, true, true, false, false, true, true]);
        assert!(raw_sclk(&timing, 64));
        assert!(raw_sclk(&timing, 65));
    }

    #[test]
    fn test_sixteen_rising_edges() {
        let timing = Timing::new(&EngineConfig::default()).unwrap();
        let rising = (1..timing.period_ticks() as u32)
            .filter(|&c| !raw_sclk(&timing, c - 1) && raw_sclk(&timing, c))
            .count();
        assert_eq!(rising, 16);
    }

    #[test]
    fn test_select_follows_window() {
        let timing = Timing::new(&EngineConfig::default()).unwrap();
        assert!(!chip_select_n(&timing, 0));
        assert!(!chip_select_n(&timing, 63));
        assert!(chip_select_n(&timing, 64));
    }
}
