//! Numeric settings that can be overridden from the environment.
//!
//! Overrides are plain decimal numbers.  Anything else, including a value that's numeric but out
//! of range for the setting, is ignored with a warning and the setting's default applies.
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::*;

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$").expect("BUG: Invalid regex"));

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("BUG: Invalid regex"));

/// Parse a decimal number like `0.7`, `2` or `-1.25`.  Surrounding whitespace is ignored.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();

    if DECIMAL.is_match(raw) {
        // Enough digits overflow to infinity
        raw.parse().ok().filter(|value: &f64| value.is_finite())
    } else {
        None
    }
}

/// Parse a whole number like `5` or `+12`.  Surrounding whitespace is ignored.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if INTEGER.is_match(raw) {
        raw.parse().ok()
    } else {
        None
    }
}

/// The value of the first of `names` that is set to something other than an empty string, along
/// with the name it was found under.
pub fn first_non_empty<F>(lookup: F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .filter(|value| !value.is_empty())
            .map(|value| (*name, value))
    })
}

/// Use a decimal override if there is one and it's in `range`, otherwise `default`.
pub fn decimal_or_default(
    name: &str,
    raw: Option<&str>,
    range: std::ops::RangeInclusive<f64>,
    default: f64,
) -> f64 {
    let Some(raw) = raw else {
        return default;
    };

    match parse_decimal(raw) {
        Some(value) if range.contains(&value) => value,
        _ => {
            warn!(name, value = raw, default,
                min = range.start(), max = range.end(),
                "Ignoring malformed or out of range setting");
            default
        }
    }
}

/// Use a count override if there is one and it's at least `min`, otherwise `default`.
pub fn count_or_default(name: &str, raw: Option<&str>, min: u32, default: u32) -> u32 {
    let Some(raw) = raw else {
        return default;
    };

    match parse_integer(raw).and_then(|value| u32::try_from(value).ok()) {
        Some(value) if value >= min => value,
        _ => {
            warn!(name, value = raw, default, min,
                "Ignoring malformed or out of range setting");
            default
        }
    }
}
