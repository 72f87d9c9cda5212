//! Report records attached to stage outcomes.
//!
//! Findings and cost estimates are presentation data. Later stages never
//! read them; they flow into annotations and the final result only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a scan finding, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The scanner did not report a severity.
    #[default]
    Unknown,
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;

    /// Parses scanner severities case-insensitively. Anything unrecognised
    /// becomes [`Severity::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "low" | "info" | "informational" => Self::Low,
            "medium" | "moderate" | "warning" => Self::Medium,
            "high" | "error" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        })
    }
}

impl Severity {
    /// Parses a severity string, never failing.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Returns the SARIF result level for this severity.
    #[must_use]
    pub fn sarif_level(&self) -> &'static str {
        match self {
            Self::Critical | Self::High => "error",
            Self::Medium => "warning",
            Self::Low | Self::Unknown => "note",
        }
    }
}

/// A single finding reported by a security scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// The finding severity.
    pub severity: Severity,
    /// The scanner rule identifier (e.g., "aws-s3-enable-versioning").
    pub rule_id: String,
    /// Human-readable description.
    pub message: String,
    /// Where the finding is located (e.g., "main.tf:12").
    pub location: String,
}

impl ScanFinding {
    /// Creates a new finding.
    #[must_use]
    pub fn new(
        severity: Severity,
        rule_id: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            rule_id: rule_id.into(),
            message: message.into(),
            location: location.into(),
        }
    }
}

/// Counts findings at each severity.
#[must_use]
pub fn severity_counts(findings: &[ScanFinding]) -> BTreeMap<Severity, usize> {
    let mut counts = BTreeMap::new();
    for finding in findings {
        *counts.entry(finding.severity).or_insert(0) += 1;
    }
    counts
}

/// A monthly cost estimate for an infrastructure change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// ISO currency code.
    pub currency: String,
    /// Total estimated monthly cost.
    pub monthly_estimate: f64,
    /// Monthly cost per resource type.
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
}

impl CostEstimate {
    /// Creates an empty estimate in `currency`.
    #[must_use]
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            monthly_estimate: 0.0,
            breakdown: BTreeMap::new(),
        }
    }

    /// Adds `amount` to the breakdown entry for `resource_type` and to the total.
    pub fn add(&mut self, resource_type: impl Into<String>, amount: f64) {
        *self.breakdown.entry(resource_type.into()).or_insert(0.0) += amount;
        self.monthly_estimate += amount;
    }

    /// Returns the breakdown sorted by descending cost.
    #[must_use]
    pub fn ranked_breakdown(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = self
            .breakdown
            .iter()
            .map(|(name, amount)| (name.as_str(), *amount))
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse_lossy("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse_lossy(" high "), Severity::High);
        assert_eq!(Severity::parse_lossy("MEDIUM"), Severity::Medium);
        assert_eq!(Severity::parse_lossy("info"), Severity::Low);
        assert_eq!(Severity::parse_lossy(""), Severity::Unknown);
        assert_eq!(Severity::parse_lossy("weird"), Severity::Unknown);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Low > Severity::Unknown);
    }

    #[test]
    fn test_severity_counts() {
        let findings = vec![
            ScanFinding::new(Severity::High, "a", "m", "main.tf:1"),
            ScanFinding::new(Severity::High, "b", "m", "main.tf:2"),
            ScanFinding::new(Severity::Low, "c", "m", "main.tf:3"),
        ];
        let counts = severity_counts(&findings);
        assert_eq!(counts.get(&Severity::High), Some(&2));
        assert_eq!(counts.get(&Severity::Low), Some(&1));
        assert_eq!(counts.get(&Severity::Critical), None);
    }

    #[test]
    fn test_cost_estimate_accumulates() {
        let mut estimate = CostEstimate::new("USD");
        estimate.add("aws_instance", 30.0);
        estimate.add("aws_db_instance", 120.5);
        estimate.add("aws_instance", 10.0);

        assert!((estimate.monthly_estimate - 160.5).abs() < f64::EPSILON);
        let ranked = estimate.ranked_breakdown();
        assert_eq!(ranked[0].0, "aws_db_instance");
        assert_eq!(ranked[1], ("aws_instance", 40.0));
    }
}
