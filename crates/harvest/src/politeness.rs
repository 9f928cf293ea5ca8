//! Politeness delays between attempts. This is deliberately separate from
//! the per-call retry backoff: retries are bounded and fast, the jitter here
//! is longer and randomized to look like a human browsing the site.

use std::time::Duration;

use rand::Rng;

/// chance of an additional multi-second pause after an attempt.
const LONG_BREAK_CHANCE: f64 = 0.05;

/// Delay before the next attempt on the same worker: uniform in
/// `[0.5, 1.5] * base_delay`, occasionally stretched by a 2-8 s break.
/// A non-positive `base_delay` disables sleeping entirely (test mode).
pub fn politeness_delay(base_delay: f64) -> Option<Duration> {
    if base_delay <= 0.0 {
        return None;
    }
    let mut rng = rand::thread_rng();
    let mut delay = rng.gen_range(0.5 * base_delay..=1.5 * base_delay);
    if rng.gen_bool(LONG_BREAK_CHANCE) {
        delay += rng.gen_range(2.0..=8.0);
        log::debug!("taking a longer break: {:.1}s", delay);
    }
    Some(Duration::from_secs_f64(delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_base_delay_disables_sleeps() {
        assert_eq!(politeness_delay(0.0), None);
        assert_eq!(politeness_delay(-1.0), None);
    }

    #[test]
    fn delays_stay_within_the_jitter_window() {
        for _ in 0..1000 {
            let delay = politeness_delay(3.0).unwrap().as_secs_f64();
            assert!(delay >= 1.5, "delay {} below window", delay);
            assert!(delay <= 4.5 + 8.0, "delay {} above window", delay);
        }
    }
}
