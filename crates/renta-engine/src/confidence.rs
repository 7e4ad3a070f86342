//! Confidence heuristic
//!
//! Maps (prediction horizon, history depth) to a calibrated score in
//! [0, 1]. Additive on a 0.80 baseline: long horizons and thin history
//! subtract, near-term stays and deep history add. Scores round to two
//! decimals so downstream consumers can compare them stably.

use time::Date;

use renta_common::parse_iso_date;

const BASE_CONFIDENCE: f64 = 0.80;

/// Confidence for a stay date relative to `today`, given the number of
/// days with recorded activity over the last year (when known).
///
/// A stay in the past scores 0.0 outright.
pub fn confidence_score(stay: Date, today: Date, history_days: Option<u32>) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    let horizon = (stay - today).whole_days();
    if horizon < 0 {
        return 0.0;
    }

    if horizon > 180 {
        confidence -= 0.30;
    } else if horizon > 90 {
        confidence -= 0.15;
    } else if horizon < 7 {
        confidence += 0.05;
    }

    if let Some(history) = history_days {
        if history < 30 {
            confidence -= 0.30;
        } else if history < 90 {
            confidence -= 0.10;
        } else if history > 365 {
            confidence += 0.05;
        }
    }

    round2(confidence.clamp(0.0, 1.0))
}

/// String-boundary variant: any date parse failure yields the neutral-low
/// score 0.5 instead of an error.
pub fn confidence_score_str(stay: &str, today: Date, history_days: Option<u32>) -> f64 {
    match parse_iso_date(stay) {
        Some(date) => confidence_score(date, today, history_days),
        None => 0.5,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::Duration;

    const TODAY: Date = date!(2025 - 06 - 01);

    #[test]
    fn test_past_date_is_zero() {
        assert_eq!(confidence_score(TODAY - Duration::days(1), TODAY, Some(400)), 0.0);
    }

    #[test]
    fn test_horizon_adjustments() {
        // Same day: near-term bonus
        assert_eq!(confidence_score(TODAY, TODAY, None), 0.85);
        // Mid-range horizon: no adjustment
        assert_eq!(confidence_score(TODAY + Duration::days(30), TODAY, None), 0.80);
        // Between 90 and 180 days
        assert_eq!(confidence_score(TODAY + Duration::days(120), TODAY, None), 0.65);
        // Beyond 180 days
        assert_eq!(confidence_score(TODAY + Duration::days(200), TODAY, None), 0.50);
    }

    #[test]
    fn test_history_adjustments() {
        let stay = TODAY + Duration::days(30);
        assert_eq!(confidence_score(stay, TODAY, Some(10)), 0.50);
        assert_eq!(confidence_score(stay, TODAY, Some(60)), 0.70);
        assert_eq!(confidence_score(stay, TODAY, Some(200)), 0.80);
        assert_eq!(confidence_score(stay, TODAY, Some(400)), 0.85);
    }

    #[test]
    fn test_combined_long_horizon_deep_history() {
        // 0.80 - 0.30 + 0.05
        let stay = TODAY + Duration::days(200);
        assert_eq!(confidence_score(stay, TODAY, Some(400)), 0.55);
    }

    #[test]
    fn test_sweet_spot() {
        // 7..=90 day horizon with > 365 days of history: 0.85
        for days in [7, 30, 90] {
            assert_eq!(
                confidence_score(TODAY + Duration::days(days), TODAY, Some(366)),
                0.85
            );
        }
    }

    #[test]
    fn test_parse_failure_is_neutral_low() {
        assert_eq!(confidence_score_str("not-a-date", TODAY, Some(400)), 0.5);
        assert_eq!(confidence_score_str("2025-07-01", TODAY, None), 0.80);
    }
}
