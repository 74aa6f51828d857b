use serde::{Deserialize, Serialize};

/// Half-day designator for a doctor's session.
///
/// Every schedule covers either the morning or the afternoon of its
/// calendar date; the pair (doctor, date, half-day) identifies at most
/// one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HalfDay {
    /// Morning session.
    #[serde(rename = "AM")]
    Am,

    /// Afternoon session.
    #[serde(rename = "PM")]
    Pm,
}

impl HalfDay {
    /// Returns the wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HalfDay::Am => "AM",
            HalfDay::Pm => "PM",
        }
    }

    /// Parses the wire/database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AM" => Some(HalfDay::Am),
            "PM" => Some(HalfDay::Pm),
            _ => None,
        }
    }

    /// The fixed hour labels a front end offers for this half-day.
    pub fn hour_labels(&self) -> &'static [&'static str] {
        match self {
            HalfDay::Am => &["08:00-09:00", "09:00-10:00", "10:00-11:00", "11:00-12:00"],
            HalfDay::Pm => &["14:00-15:00", "15:00-16:00", "16:00-17:00", "17:00-18:00"],
        }
    }
}

impl std::fmt::Display for HalfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HalfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HalfDay::parse(s).ok_or_else(|| format!("invalid half-day designator: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        assert_eq!(HalfDay::parse("AM"), Some(HalfDay::Am));
        assert_eq!(HalfDay::parse("PM"), Some(HalfDay::Pm));
        assert_eq!(HalfDay::parse("EVENING"), None);
        assert_eq!(HalfDay::Am.as_str(), "AM");
        assert_eq!(HalfDay::Pm.as_str(), "PM");
    }

    #[test]
    fn morning_sorts_before_afternoon() {
        assert!(HalfDay::Am < HalfDay::Pm);
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&HalfDay::Am).unwrap(), "\"AM\"");
        let parsed: HalfDay = serde_json::from_str("\"PM\"").unwrap();
        assert_eq!(parsed, HalfDay::Pm);
    }

    #[test]
    fn hour_labels_cover_four_slots() {
        assert_eq!(HalfDay::Am.hour_labels().len(), 4);
        assert_eq!(HalfDay::Pm.hour_labels().len(), 4);
        assert!(HalfDay::Am.hour_labels()[0].starts_with("08:"));
        assert!(HalfDay::Pm.hour_labels()[0].starts_with("14:"));
    }
}
