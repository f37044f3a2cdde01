//! Slot status: the power state of one half-hour interval.

use serde::{Deserialize, Serialize};

/// The power state of a single slot.
///
/// Closed set. Every raw marker from the source page maps to exactly one
/// variant; anything unrecognized is [`StatusCode::Available`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusCode {
    /// Power is on.
    #[default]
    #[serde(rename = "light_0")]
    Available,

    /// Possible outage.
    #[serde(rename = "light_3")]
    Warning,

    /// Scheduled outage.
    #[serde(rename = "light_2")]
    Outage,
}

impl StatusCode {
    /// Classify a raw cell marker.
    ///
    /// The marker is the cell's class attribute. It may carry several
    /// whitespace-separated classes; the first recognized one wins.
    pub fn classify(raw: &str) -> Self {
        raw.split_whitespace()
            .find_map(|class| match class {
                "light_2" => Some(Self::Outage),
                "light_3" => Some(Self::Warning),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The glyph shown in notifications.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Outage => "\u{1F534}",
            Self::Warning => "\u{1F7E1}",
            Self::Available => "\u{1F7E2}",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_markers() {
        assert_eq!(StatusCode::classify("light_2"), StatusCode::Outage);
        assert_eq!(StatusCode::classify("light_3"), StatusCode::Warning);
        assert_eq!(StatusCode::classify("light_0"), StatusCode::Available);
    }

    #[test]
    fn unrecognized_markers_default_to_available() {
        assert_eq!(StatusCode::classify(""), StatusCode::Available);
        assert_eq!(StatusCode::classify("anything-unrecognized"), StatusCode::Available);
        assert_eq!(StatusCode::classify("light_1"), StatusCode::Available);
        assert_eq!(StatusCode::classify("   "), StatusCode::Available);
    }

    #[test]
    fn marker_among_other_classes() {
        assert_eq!(StatusCode::classify("cell light_2 wide"), StatusCode::Outage);
    }

    #[test]
    fn symbols() {
        assert_eq!(StatusCode::Outage.symbol(), "🔴");
        assert_eq!(StatusCode::Warning.symbol(), "🟡");
        assert_eq!(StatusCode::Available.symbol(), "🟢");
    }

    #[test]
    fn serializes_as_source_marker() {
        let json = serde_json::to_string(&[StatusCode::Outage, StatusCode::Available]).unwrap();
        assert_eq!(json, r#"["light_2","light_0"]"#);

        let back: StatusCode = serde_json::from_str(r#""light_3""#).unwrap();
        assert_eq!(back, StatusCode::Warning);
    }
}
