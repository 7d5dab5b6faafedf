//! Small pure helpers used by the scoring engine.

use chrono::{DateTime, NaiveDate, Utc};
use common::models::Decay;

/// Canonicalizes an instant to a UTC calendar date for clip-counter keys. Must be
/// computed from a UTC-normalized instant — truncating a non-UTC instant's clock
/// time to a date would let the same absolute day fall into two different keys.
pub fn day_key(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Age of an event in fractional days, clamped to zero (never negative).
pub fn age_days(now: DateTime<Utc>, created_at: DateTime<Utc>) -> f64 {
    let delta = now - created_at;
    (delta.num_milliseconds() as f64 / 86_400_000.0).max(0.0)
}

/// Computes the decay multiplier for an event of the given age, or `None` when the
/// event should be dropped entirely (the `window` variant past its cutoff).
pub fn decay_factor(decay: &Decay, age_days: f64) -> Option<f64> {
    match decay {
        Decay::None => Some(1.0),
        Decay::Exponential { half_life_days } if *half_life_days > 0.0 => {
            Some((-std::f64::consts::LN_2 * age_days / half_life_days).exp())
        }
        Decay::Exponential { .. } => Some(1.0),
        Decay::Linear { window_days } if *window_days > 0.0 => {
            Some((1.0 - age_days / window_days).max(0.0))
        }
        Decay::Linear { .. } => Some(1.0),
        Decay::Window { window_days } => {
            if age_days > *window_days {
                None
            } else {
                Some(1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exponential_halves_at_half_life() {
        let factor = decay_factor(&Decay::Exponential { half_life_days: 10.0 }, 10.0).unwrap();
        assert!((factor - 0.5).abs() < 1e-9);
    }

    #[test]
    fn exponential_tends_to_zero() {
        let factor = decay_factor(&Decay::Exponential { half_life_days: 10.0 }, 10_000.0).unwrap();
        assert!(factor < 1e-6);
    }

    #[test]
    fn linear_reaches_zero_at_window() {
        let factor = decay_factor(&Decay::Linear { window_days: 30.0 }, 30.0).unwrap();
        assert_eq!(factor, 0.0);
        let factor = decay_factor(&Decay::Linear { window_days: 30.0 }, 60.0).unwrap();
        assert_eq!(factor, 0.0);
    }

    #[test]
    fn window_drops_past_cutoff() {
        assert!(decay_factor(&Decay::Window { window_days: 30.0 }, 31.0).is_none());
        assert_eq!(decay_factor(&Decay::Window { window_days: 30.0 }, 29.0), Some(1.0));
    }

    #[test]
    fn day_key_is_utc_date() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap();
        assert_eq!(day_key(at), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
