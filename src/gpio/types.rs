//! Pin Types

use serde::{Deserialize, Serialize};

/// Hardware line number as used in sysfs paths (`gpio{N}`)
pub type PinNumber = u8;

/// Observed state of one hardware line.
///
/// Each transition produces a fresh `Pin`; values are never updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    pub number: PinNumber,
    pub value: u8,
}

impl Pin {
    pub fn new(number: PinNumber, value: u8) -> Self {
        Self { number, value }
    }

    /// Parse the single ASCII digit found in a sysfs value file.
    ///
    /// Only `0` and `1` are valid line levels.
    pub fn parse_value(raw: &[u8]) -> Option<u8> {
        let text = std::str::from_utf8(raw).ok()?;
        match text.trim().parse::<u8>() {
            Ok(v @ (0 | 1)) => Some(v),
            _ => None,
        }
    }

    /// Check that the value is a valid line level
    pub fn is_valid(&self) -> bool {
        self.value <= 1
    }
}

/// Pins under observation for the lifetime of the process.
///
/// Insertion order is kept and duplicates are dropped; the set never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinWatchSet {
    pins: Vec<PinNumber>,
}

impl PinWatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pin, returns false if it was already present
    pub fn insert(&mut self, pin: PinNumber) -> bool {
        if self.pins.contains(&pin) {
            return false;
        }
        self.pins.push(pin);
        true
    }

    pub fn contains(&self, pin: PinNumber) -> bool {
        self.pins.contains(&pin)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PinNumber> + '_ {
        self.pins.iter().copied()
    }
}

impl FromIterator<PinNumber> for PinWatchSet {
    fn from_iter<I: IntoIterator<Item = PinNumber>>(iter: I) -> Self {
        let mut set = Self::new();
        for pin in iter {
            set.insert(pin);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(Pin::parse_value(b"1"), Some(1));
        assert_eq!(Pin::parse_value(b"0\n"), Some(0));
        assert_eq!(Pin::parse_value(b"7"), None);
        assert_eq!(Pin::parse_value(b"x"), None);
        assert_eq!(Pin::parse_value(b""), None);
    }

    #[test]
    fn test_pin_serialization() {
        let json = serde_json::to_string(&Pin::new(4, 1)).unwrap();
        assert_eq!(json, r#"{"number":4,"value":1}"#);
    }

    #[test]
    fn test_watch_set_dedup_keeps_order() {
        let set: PinWatchSet = vec![17, 4, 17, 22, 4].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![17, 4, 22]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(22));
        assert!(!set.contains(5));
    }
}
