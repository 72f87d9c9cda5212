//! Parsers for scanner and cost tool JSON reports.

use crate::core::{CostEstimate, ScanFinding, Severity};
use crate::errors::ToolError;
use serde::Deserialize;

// tfsec

#[derive(Debug, Deserialize)]
struct TfsecReport {
    #[serde(default)]
    results: Option<Vec<TfsecResult>>,
}

#[derive(Debug, Deserialize)]
struct TfsecResult {
    #[serde(default)]
    rule_id: String,
    #[serde(default)]
    long_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rule_description: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    location: Option<TfsecLocation>,
}

#[derive(Debug, Deserialize)]
struct TfsecLocation {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    start_line: u64,
}

/// Parses `tfsec --format json` output.
pub fn parse_tfsec(json: &str) -> Result<Vec<ScanFinding>, ToolError> {
    let report: TfsecReport =
        serde_json::from_str(json).map_err(|e| ToolError::report("tfsec", e.to_string()))?;

    Ok(report
        .results
        .unwrap_or_default()
        .into_iter()
        .map(|r| {
            let rule_id = first_non_empty(&r.rule_id, &r.long_id);
            let message = first_non_empty(&r.description, &r.rule_description);
            let location = r
                .location
                .map(|l| format_location(&l.filename, l.start_line))
                .unwrap_or_default();
            ScanFinding::new(Severity::parse_lossy(&r.severity), rule_id, message, location)
        })
        .collect())
}

// Checkov

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CheckovDocument {
    Many(Vec<CheckovReport>),
    One(CheckovReport),
}

#[derive(Debug, Deserialize)]
struct CheckovReport {
    #[serde(default)]
    results: CheckovResults,
}

#[derive(Debug, Default, Deserialize)]
struct CheckovResults {
    #[serde(default)]
    failed_checks: Vec<CheckovCheck>,
}

#[derive(Debug, Deserialize)]
struct CheckovCheck {
    check_id: String,
    #[serde(default)]
    check_name: String,
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    file_line_range: Vec<u64>,
    #[serde(default)]
    severity: Option<String>,
}

/// Parses `checkov -o json` output (one report or one per framework).
///
/// Checkov without a platform key reports no severity; such findings are
/// [`Severity::Unknown`].
pub fn parse_checkov(json: &str) -> Result<Vec<ScanFinding>, ToolError> {
    let document: CheckovDocument =
        serde_json::from_str(json).map_err(|e| ToolError::report("checkov", e.to_string()))?;
    let reports = match document {
        CheckovDocument::Many(reports) => reports,
        CheckovDocument::One(report) => vec![report],
    };

    Ok(reports
        .into_iter()
        .flat_map(|r| r.results.failed_checks)
        .map(|c| {
            let line = c.file_line_range.first().copied().unwrap_or(0);
            ScanFinding::new(
                c.severity.as_deref().map_or(Severity::Unknown, Severity::parse_lossy),
                c.check_id,
                c.check_name,
                format_location(c.file_path.trim_start_matches('/'), line),
            )
        })
        .collect())
}

// Trivy

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyReport {
    #[serde(default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyResult {
    #[serde(default)]
    target: String,
    #[serde(default)]
    misconfigurations: Option<Vec<TrivyMisconfiguration>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyMisconfiguration {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cause_metadata: Option<TrivyCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyCause {
    #[serde(default)]
    start_line: u64,
}

/// Parses `trivy config --format json` output. Passed checks are ignored.
pub fn parse_trivy(json: &str) -> Result<Vec<ScanFinding>, ToolError> {
    let report: TrivyReport =
        serde_json::from_str(json).map_err(|e| ToolError::report("trivy", e.to_string()))?;

    let mut findings = Vec::new();
    for result in report.results.unwrap_or_default() {
        for m in result.misconfigurations.unwrap_or_default() {
            if m.status.as_deref().is_some_and(|s| s != "FAIL") {
                continue;
            }
            let line = m.cause_metadata.map_or(0, |c| c.start_line);
            findings.push(ScanFinding::new(
                Severity::parse_lossy(&m.severity),
                m.id,
                first_non_empty(&m.message, &m.title),
                format_location(&result.target, line),
            ));
        }
    }
    Ok(findings)
}

// Infracost

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfracostReport {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    total_monthly_cost: Option<String>,
    #[serde(default)]
    projects: Vec<InfracostProject>,
}

#[derive(Debug, Deserialize)]
struct InfracostProject {
    #[serde(default)]
    breakdown: Option<InfracostBreakdown>,
}

#[derive(Debug, Deserialize)]
struct InfracostBreakdown {
    #[serde(default)]
    resources: Vec<InfracostResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfracostResource {
    name: String,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    monthly_cost: Option<String>,
}

/// Parses `infracost breakdown --format json` output.
///
/// The report's own currency wins over `fallback_currency`; the report's
/// `totalMonthlyCost` wins over the sum of resources when present.
pub fn parse_infracost(json: &str, fallback_currency: &str) -> Result<CostEstimate, ToolError> {
    let report: InfracostReport =
        serde_json::from_str(json).map_err(|e| ToolError::report("infracost", e.to_string()))?;

    let currency = report
        .currency
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| fallback_currency.to_string());
    let mut estimate = CostEstimate::new(currency);

    for resource in report
        .projects
        .into_iter()
        .filter_map(|p| p.breakdown)
        .flat_map(|b| b.resources)
    {
        let amount = parse_amount(resource.monthly_cost.as_deref())?;
        let resource_type = resource
            .resource_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| resource_type_from_address(&resource.name));
        estimate.add(resource_type, amount);
    }

    if let Some(total) = report.total_monthly_cost.as_deref() {
        estimate.monthly_estimate = parse_amount(Some(total))?;
    }
    Ok(estimate)
}

fn parse_amount(value: Option<&str>) -> Result<f64, ToolError> {
    match value.map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite())
            .ok_or_else(|| ToolError::report("infracost", format!("invalid amount '{v}'"))),
    }
}

/// Derives the resource type from a Terraform address such as
/// `module.app.aws_instance.web["a"]`.
#[must_use]
pub fn resource_type_from_address(address: &str) -> String {
    let without_index = address.split('[').next().unwrap_or(address);
    let segments: Vec<&str> = without_index.split('.').collect();
    if segments.len() >= 2 {
        segments[segments.len() - 2].to_string()
    } else {
        without_index.to_string()
    }
}

fn first_non_empty(primary: &str, fallback: &str) -> String {
    if primary.is_empty() {
        fallback.to_string()
    } else {
        primary.to_string()
    }
}

fn format_location(file: &str, line: u64) -> String {
    if line > 0 {
        format!("{file}:{line}")
    } else {
        file.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_tfsec() {
        let json = r#"{
            "results": [
                {
                    "rule_id": "AVD-AWS-0086",
                    "long_id": "aws-s3-block-public-acls",
                    "rule_description": "S3 Access block should block public ACL",
                    "description": "No public access block so not blocking public acls",
                    "severity": "HIGH",
                    "location": {"filename": "main.tf", "start_line": 12, "end_line": 20}
                },
                {
                    "long_id": "aws-s3-enable-versioning",
                    "rule_description": "S3 Data should be versioned",
                    "severity": "MEDIUM"
                }
            ]
        }"#;

        let findings = parse_tfsec(json).unwrap();
        assert_eq!(
            findings,
            vec![
                ScanFinding::new(
                    Severity::High,
                    "AVD-AWS-0086",
                    "No public access block so not blocking public acls",
                    "main.tf:12"
                ),
                ScanFinding::new(
                    Severity::Medium,
                    "aws-s3-enable-versioning",
                    "S3 Data should be versioned",
                    ""
                ),
            ]
        );
    }

    #[test]
    fn test_parse_tfsec_null_results() {
        assert!(parse_tfsec(r#"{"results": null}"#).unwrap().is_empty());
        assert!(parse_tfsec("not json").is_err());
    }

    #[test]
    fn test_parse_checkov_single_and_many() {
        let single = r#"{
            "check_type": "terraform",
            "results": {
                "passed_checks": [],
                "failed_checks": [
                    {
                        "check_id": "CKV_AWS_18",
                        "check_name": "Ensure the S3 bucket has access logging enabled",
                        "file_path": "/main.tf",
                        "file_line_range": [1, 9],
                        "severity": null
                    }
                ]
            }
        }"#;
        let findings = parse_checkov(single).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "CKV_AWS_18");
        assert_eq!(findings[0].location, "main.tf:1");
        assert_eq!(findings[0].severity, Severity::Unknown);

        let many = r#"[
            {"check_type": "terraform", "results": {"failed_checks": [
                {"check_id": "CKV_AWS_1", "check_name": "a", "file_path": "/a.tf", "file_line_range": [3, 4], "severity": "CRITICAL"}
            ]}},
            {"check_type": "secrets", "results": {"failed_checks": []}}
        ]"#;
        let findings = parse_checkov(many).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn test_parse_trivy() {
        let json = r#"{
            "SchemaVersion": 2,
            "Results": [
                {
                    "Target": "main.tf",
                    "Class": "config",
                    "Misconfigurations": [
                        {
                            "ID": "AVD-AWS-0089",
                            "Title": "Bucket logging",
                            "Message": "Bucket does not have logging enabled",
                            "Severity": "LOW",
                            "Status": "FAIL",
                            "CauseMetadata": {"StartLine": 7}
                        },
                        {
                            "ID": "AVD-AWS-0090",
                            "Title": "Versioning",
                            "Severity": "MEDIUM",
                            "Status": "PASS"
                        }
                    ]
                },
                {"Target": "vars.tf", "Misconfigurations": null}
            ]
        }"#;

        let findings = parse_trivy(json).unwrap();
        assert_eq!(
            findings,
            vec![ScanFinding::new(
                Severity::Low,
                "AVD-AWS-0089",
                "Bucket does not have logging enabled",
                "main.tf:7"
            )]
        );
        assert!(parse_trivy("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_infracost() {
        let json = r#"{
            "version": "0.2",
            "currency": "EUR",
            "totalMonthlyCost": "151.5",
            "projects": [
                {"breakdown": {"resources": [
                    {"name": "aws_instance.web", "resourceType": "aws_instance", "monthlyCost": "60"},
                    {"name": "module.db.aws_db_instance.main", "monthlyCost": "90"},
                    {"name": "aws_s3_bucket.logs", "monthlyCost": null}
                ]}},
                {"breakdown": null}
            ]
        }"#;

        let estimate = parse_infracost(json, "USD").unwrap();
        assert_eq!(estimate.currency, "EUR");
        assert!((estimate.monthly_estimate - 151.5).abs() < f64::EPSILON);
        assert_eq!(estimate.breakdown.get("aws_instance"), Some(&60.0));
        assert_eq!(estimate.breakdown.get("aws_db_instance"), Some(&90.0));
        assert_eq!(estimate.breakdown.get("aws_s3_bucket"), Some(&0.0));
    }

    #[test]
    fn test_parse_infracost_fallbacks() {
        let json = r#"{"projects": [{"breakdown": {"resources": [
            {"name": "aws_instance.a", "monthlyCost": "1.5"},
            {"name": "aws_instance.b", "monthlyCost": "2.5"}
        ]}}]}"#;
        let estimate = parse_infracost(json, "USD").unwrap();
        assert_eq!(estimate.currency, "USD");
        assert!((estimate.monthly_estimate - 4.0).abs() < f64::EPSILON);

        let bad = r#"{"projects": [{"breakdown": {"resources": [
            {"name": "aws_instance.a", "monthlyCost": "lots"}
        ]}}]}"#;
        assert!(parse_infracost(bad, "USD").is_err());
    }

    #[test]
    fn test_resource_type_from_address() {
        assert_eq!(resource_type_from_address("aws_instance.web"), "aws_instance");
        assert_eq!(
            resource_type_from_address("module.app.aws_instance.web[\"a\"]"),
            "aws_instance"
        );
        assert_eq!(resource_type_from_address("aws_instance.web[0]"), "aws_instance");
        assert_eq!(resource_type_from_address("standalone"), "standalone");
    }
}
