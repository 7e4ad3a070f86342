//! Safe numeric coercion for loosely typed store values
//!
//! The market pipeline writes whatever its collectors produced; numbers
//! arrive as JSON numbers or as strings, and occasionally as garbage.
//! These parsers return `None` on anything that is not a finite number
//! instead of raising, so one bad cell never poisons a whole frame.

use serde_json::Value;

/// Coerce a JSON value to a finite f64, `None` on bad input.
pub fn safe_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Coerce a JSON value to an i64, `None` on bad input.
///
/// Floats are accepted when they are integral (the pipeline stores some
/// counters as `12.0`).
pub fn safe_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}
