use serde::{Deserialize, Serialize};

pub const MIN_CAPACITY: u32 = 3;
pub const MAX_CAPACITY: u32 = 20;
pub const DEFAULT_CAPACITY: u32 = 8;

/// Maximum characters for one relay line.
pub const MAX_ENTRY_CHARS: usize = 240;
/// Maximum characters kept from an author display name.
pub const MAX_AUTHOR_CHARS: usize = 80;

pub const CODE_LENGTH: usize = 6;
pub const DEFAULT_TITLE: &str = "Recess Relay";
pub const GUEST_AUTHOR: &str = "Guest";

/// Lifecycle of a relay session. `Full` and `Closed` both refuse appends;
/// only `Closed` is set explicitly, and nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Open,
    Full,
    Closed,
}

impl RelayState {
    pub fn of(is_closed: bool, entry_count: u32, max_entries: u32) -> Self {
        if is_closed {
            Self::Closed
        } else if entry_count >= max_entries {
            Self::Full
        } else {
            Self::Open
        }
    }

    pub fn accepts_entries(self) -> bool {
        self == Self::Open
    }
}

/// Effective capacity for a requested value: absent means the default,
/// anything else is clamped into `[MIN_CAPACITY, MAX_CAPACITY]`.
pub fn clamp_capacity(requested: Option<i64>) -> u32 {
    let requested = requested.unwrap_or(i64::from(DEFAULT_CAPACITY));
    requested.clamp(i64::from(MIN_CAPACITY), i64::from(MAX_CAPACITY)) as u32
}

/// Capacity from free-form user input; blank or unparsable means the default.
/// Integers outside the `i64` range saturate before clamping.
pub fn capacity_from_input(raw: Option<&str>) -> u32 {
    let parsed = raw.map(str::trim).filter(|s| !s.is_empty()).and_then(parse_integer);
    clamp_capacity(parsed)
}

fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

/// Relay codes are matched case-insensitively.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(clamp_capacity(Some(1)), 3);
        assert_eq!(clamp_capacity(Some(50)), 20);
        assert_eq!(clamp_capacity(Some(-4)), 3);
        assert_eq!(clamp_capacity(Some(12)), 12);
        assert_eq!(clamp_capacity(None), 8);
    }

    #[test]
    fn unparsable_capacity_uses_default() {
        assert_eq!(capacity_from_input(Some("lots")), 8);
        assert_eq!(capacity_from_input(Some("  ")), 8);
        assert_eq!(capacity_from_input(None), 8);
        assert_eq!(capacity_from_input(Some(" 5 ")), 5);
        assert_eq!(capacity_from_input(Some("99")), 20);
        assert_eq!(capacity_from_input(Some("1e3")), 8);
        assert_eq!(capacity_from_input(Some("-")), 8);
    }

    #[test]
    fn oversized_integers_still_clamp() {
        assert_eq!(capacity_from_input(Some("99999999999999999999")), 20);
        assert_eq!(capacity_from_input(Some("+99999999999999999999")), 20);
        assert_eq!(capacity_from_input(Some("-99999999999999999999")), 3);
    }

    #[test]
    fn state_follows_flags_and_count() {
        assert_eq!(RelayState::of(false, 2, 3), RelayState::Open);
        assert_eq!(RelayState::of(false, 3, 3), RelayState::Full);
        assert_eq!(RelayState::of(true, 0, 3), RelayState::Closed);
        assert!(!RelayState::Full.accepts_entries());
    }

    #[test]
    fn codes_are_uppercased() {
        assert_eq!(normalize_code(" ab12cd "), "AB12CD");
    }
}
