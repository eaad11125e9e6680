//! Per-channel flood governor.
//!
//! A decaying counter with hysteresis: every admitted message increments
//! the counter and elapsed seconds decay it. Crossing the threshold sets a
//! sticky `warned` flag and adds a penalty, and the channel stays flagged
//! until the counter decays all the way back to zero.

use crate::config::FloodConfig;
use crate::state::FloodState;

/// Verdict for one message against the channel's flood counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    /// Deliver normally.
    Allow,
    /// Drop the message. `first` is set on the crossing itself, so callers
    /// emit the operator notice exactly once per episode.
    Flooding { first: bool },
}

/// Account one admitted message against the channel's counter.
pub fn tick(flood: &mut FloodState, cfg: &FloodConfig, now: i64) -> FloodVerdict {
    // Decay one unit per elapsed second. Reaching zero ends the episode.
    if now > flood.last_tick {
        flood.counter = (flood.counter - (now - flood.last_tick)).max(0);
        if flood.counter == 0 {
            flood.warned = false;
        }
    }
    flood.last_tick = flood.last_tick.max(now);

    if flood.warned || flood.counter >= cfg.threshold {
        let first = !flood.warned;
        if first {
            // Penalty stretches the decay so a flooder cannot resume the
            // instant the threshold is re-approached from below.
            flood.counter += cfg.penalty;
            flood.warned = true;
        }
        return FloodVerdict::Flooding { first };
    }

    flood.counter += 1;
    FloodVerdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FloodConfig {
        FloodConfig { threshold: 3, penalty: 4 }
    }

    #[test]
    fn test_slow_traffic_never_trips() {
        let mut flood = FloodState::default();
        let cfg = cfg();
        for i in 0..20 {
            assert_eq!(tick(&mut flood, &cfg, 1000 + i * 5), FloodVerdict::Allow);
        }
    }

    #[test]
    fn test_burst_trips_once_then_stays_flagged() {
        let mut flood = FloodState::default();
        let cfg = cfg();

        // Same-second burst: three allowed, the fourth crosses.
        assert_eq!(tick(&mut flood, &cfg, 1000), FloodVerdict::Allow);
        assert_eq!(tick(&mut flood, &cfg, 1000), FloodVerdict::Allow);
        assert_eq!(tick(&mut flood, &cfg, 1000), FloodVerdict::Allow);
        assert_eq!(tick(&mut flood, &cfg, 1000), FloodVerdict::Flooding { first: true });
        // Still inside the episode: dropped, but no second notice.
        assert_eq!(tick(&mut flood, &cfg, 1000), FloodVerdict::Flooding { first: false });
        assert_eq!(tick(&mut flood, &cfg, 1001), FloodVerdict::Flooding { first: false });
    }

    #[test]
    fn test_warned_holds_below_threshold() {
        let mut flood = FloodState::default();
        let cfg = cfg();
        for _ in 0..4 {
            tick(&mut flood, &cfg, 1000);
        }
        assert!(flood.warned);

        // Decay below threshold but above zero: hysteresis keeps dropping.
        let almost_drained = 1000 + flood.counter - 1;
        assert_eq!(
            tick(&mut flood, &cfg, almost_drained),
            FloodVerdict::Flooding { first: false }
        );
    }

    #[test]
    fn test_full_decay_clears_warned() {
        let mut flood = FloodState::default();
        let cfg = cfg();
        for _ in 0..4 {
            tick(&mut flood, &cfg, 1000);
        }
        let drained = 1000 + flood.counter + 1;
        assert_eq!(tick(&mut flood, &cfg, drained), FloodVerdict::Allow);
        assert!(!flood.warned);
        assert_eq!(flood.counter, 1);
    }

    #[test]
    fn test_clock_step_back_is_harmless() {
        let mut flood = FloodState::default();
        let cfg = cfg();
        tick(&mut flood, &cfg, 1000);
        // An earlier timestamp must not decay or rewind last_tick.
        assert_eq!(tick(&mut flood, &cfg, 990), FloodVerdict::Allow);
        assert_eq!(flood.last_tick, 1000);
        assert_eq!(flood.counter, 2);
    }
}
