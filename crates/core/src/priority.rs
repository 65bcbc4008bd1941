//! Test priority classification
//!
//! A priority is descriptive: it is surfaced in reports for emphasis and
//! never influences scheduling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::format::color;

/// Declared importance of a test, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Optional,
}

/// How a priority is rendered in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAttributes {
    pub icon: &'static str,
    pub color: &'static str,
    pub label: &'static str,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Optional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Optional => "Optional",
        }
    }

    /// Human-readable guidance on how to treat a failure at this priority
    pub fn guidance(&self) -> &'static str {
        match self {
            Priority::Critical => {
                "Core business flow. A failure blocks the release and must be fixed immediately."
            }
            Priority::High => {
                "Major feature. A failure must be fixed before the release is approved."
            }
            Priority::Medium => {
                "Standard functionality. A failure should be fixed within the current iteration."
            }
            Priority::Low => {
                "Minor or cosmetic behavior. A failure can be scheduled for a later iteration."
            }
            Priority::Optional => {
                "Nice-to-have coverage. A failure is informational and does not gate the release."
            }
        }
    }

    pub fn display_attributes(&self) -> DisplayAttributes {
        match self {
            Priority::Critical => DisplayAttributes {
                icon: "🔴",
                color: color::RED,
                label: "CRITICAL",
            },
            Priority::High => DisplayAttributes {
                icon: "🟠",
                color: color::ORANGE,
                label: "HIGH",
            },
            Priority::Medium => DisplayAttributes {
                icon: "🟡",
                color: color::BLUE,
                label: "MEDIUM",
            },
            Priority::Low => DisplayAttributes {
                icon: "🟢",
                color: color::GREEN,
                label: "LOW",
            },
            Priority::Optional => DisplayAttributes {
                icon: "⚪",
                color: color::GREY,
                label: "OPTIONAL",
            },
        }
    }

    /// Critical and High failures gate a release
    pub fn is_blocking(&self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownPriority(s.to_string()))
    }
}

impl TryFrom<String> for Priority {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

/// Guidance string for a priority
pub fn guidance(priority: Priority) -> &'static str {
    priority.guidance()
}

/// Icon and color for a priority
pub fn display_attributes(priority: Priority) -> DisplayAttributes {
    priority.display_attributes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Critical", Priority::Critical ; "exact case")]
    #[test_case("high", Priority::High ; "lower case")]
    #[test_case(" MEDIUM ", Priority::Medium ; "padded upper case")]
    #[test_case("low", Priority::Low ; "low")]
    #[test_case("Optional", Priority::Optional ; "optional")]
    fn test_parse_priority(input: &str, expected: Priority) {
        assert_eq!(input.parse::<Priority>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_priority_is_configuration_error() {
        let err = "Urgent".parse::<Priority>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Urgent"));
    }

    #[test]
    fn test_priority_ordering_by_severity() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert!(Priority::Low < Priority::Optional);
    }

    #[test_case(Priority::Critical, color::RED)]
    #[test_case(Priority::High, color::ORANGE)]
    #[test_case(Priority::Optional, color::GREY)]
    fn test_display_color(priority: Priority, expected: &str) {
        assert_eq!(display_attributes(priority).color, expected);
    }

    #[test]
    fn test_every_priority_has_guidance() {
        for p in Priority::ALL {
            assert!(!guidance(p).is_empty());
            assert_eq!(p.display_attributes().label, p.as_str().to_uppercase());
        }
    }

    #[test]
    fn test_deserialize_rejects_unknown_priority() {
        let ok: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(ok, Priority::Low);
        assert!(serde_json::from_str::<Priority>("\"someday\"").is_err());
    }
}
