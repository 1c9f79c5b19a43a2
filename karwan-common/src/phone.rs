//! Phone number normalization
//!
//! Converts a phone number as typed by a member into international format,
//! using the member's country to qualify local numbers:
//!
//! 1. Numbers starting with `+` are already qualified and are only reformatted.
//! 2. Otherwise a single leading trunk `0` is dropped and the country's
//!    dialing prefix is prepended (`+92` when the country is unknown).
//! 3. The result is parsed with libphonenumber metadata and formatted as
//!    `+<country code> <grouped digits>`.
//!
//! Parsing is best-effort. A number that cannot be parsed is kept as typed
//! and reported with `was_normalized = false` so callers can surface it.
//!
//! `normalize` is pure and idempotent.

use phonenumber::Mode;
use serde::Serialize;
use std::str::FromStr;
use tracing::debug;

/// Prefix used when the country cannot be resolved
pub const DEFAULT_DIALING_PREFIX: &str = "+92";

/// Result of normalizing one phone field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPhone {
    pub value: String,
    pub was_normalized: bool,
}

/// Resolve the international dialing prefix (e.g. `+92`) for a country name
/// or ISO 3166 code.
pub fn dialing_prefix(country: &str) -> String {
    country_calling_code(country)
        .map(|code| format!("+{}", code))
        .unwrap_or_else(|| DEFAULT_DIALING_PREFIX.to_string())
}

fn country_calling_code(country: &str) -> Option<u16> {
    let country = country.trim();
    if country.is_empty() {
        return None;
    }

    let alpha2 = celes::Country::from_str(country).ok()?.alpha2;
    phonenumber::metadata::DATABASE
        .by_id(alpha2)
        .map(|meta| meta.country_code())
}

/// Normalize `raw` in the context of `country`.
///
/// Returns `None` for empty or blank input.
pub fn normalize(raw: &str, country: &str) -> Option<NormalizedPhone> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        let local = trimmed.strip_prefix('0').unwrap_or(trimmed);
        format!("{}{}", dialing_prefix(country), local)
    };

    match phonenumber::parse(None, &candidate) {
        Ok(number) => Some(NormalizedPhone {
            value: number.format().mode(Mode::International).to_string(),
            was_normalized: true,
        }),
        Err(e) => {
            debug!("Phone '{}' kept as entered: {}", trimmed, e);
            Some(NormalizedPhone {
                value: trimmed.to_string(),
                was_normalized: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialing_prefix_by_name_and_code() {
        assert_eq!(dialing_prefix("Pakistan"), "+92");
        assert_eq!(dialing_prefix("Germany"), "+49");
        assert_eq!(dialing_prefix("DE"), "+49");
        assert_eq!(dialing_prefix("US"), "+1");
    }

    #[test]
    fn test_unknown_country_falls_back() {
        assert_eq!(dialing_prefix("Atlantis"), DEFAULT_DIALING_PREFIX);
        assert_eq!(dialing_prefix(""), DEFAULT_DIALING_PREFIX);
    }

    #[test]
    fn test_trunk_zero_is_stripped() {
        let phone = normalize("03001234567", "Pakistan").unwrap();
        assert_eq!(phone.value, "+92 300 1234567");
        assert!(phone.was_normalized);
    }

    #[test]
    fn test_plus_prefixed_number_ignores_country() {
        let phone = normalize("+1 650 253 0000", "Pakistan").unwrap();
        assert!(phone.value.starts_with("+1 650"));
        assert!(phone.was_normalized);
    }

    #[test]
    fn test_empty_input_is_absent() {
        assert_eq!(normalize("", "Pakistan"), None);
        assert_eq!(normalize("   ", "Pakistan"), None);
    }

    #[test]
    fn test_unparseable_input_is_kept() {
        let phone = normalize(" call me maybe ", "Pakistan").unwrap();
        assert_eq!(phone.value, "call me maybe");
        assert!(!phone.was_normalized);
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            ("03001234567", "Pakistan"),
            ("3001234567", "Pakistan"),
            ("+923001234567", "Pakistan"),
            ("+92 300 1234567", "Atlantis"),
            ("030 1234567", "Germany"),
            ("+16502530000", "US"),
            ("not a number", "Germany"),
            ("0", "Pakistan"),
        ];

        for (raw, country) in cases {
            let once = normalize(raw, country).unwrap();
            let twice = normalize(&once.value, country).unwrap();
            assert_eq!(once.value, twice.value, "{} / {}", raw, country);
        }
    }
}
