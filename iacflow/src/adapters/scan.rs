//! Security scan stage: tfsec, Checkov or Trivy.

use super::{exit_failure, invoke, reports};
use crate::annotations::{render, sarif};
use crate::core::{AdapterOutput, Annotation, AnnotationTarget, ScanFinding, Severity};
use crate::errors::ToolError;
use crate::stages::{StageAdapter, StageContext};
use crate::tools::{presets, ToolCommand};
use async_trait::async_trait;
use std::fmt;
use tracing::info;

/// Supported security scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanner {
    /// aquasecurity/tfsec.
    Tfsec,
    /// bridgecrew/checkov.
    Checkov,
    /// aquasecurity/trivy in config mode.
    Trivy,
}

impl fmt::Display for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tfsec => write!(f, "tfsec"),
            Self::Checkov => write!(f, "checkov"),
            Self::Trivy => write!(f, "trivy"),
        }
    }
}

impl Scanner {
    /// Returns the default command template for the scanner.
    #[must_use]
    pub fn command(self) -> ToolCommand {
        match self {
            Self::Tfsec => presets::tfsec(),
            Self::Checkov => presets::checkov(),
            Self::Trivy => presets::trivy_config(),
        }
    }

    /// Parses the scanner's JSON report.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Report`] if the report is not valid JSON for
    /// this scanner.
    pub fn parse(self, report: &str) -> Result<Vec<ScanFinding>, ToolError> {
        match self {
            Self::Tfsec => reports::parse_tfsec(report),
            Self::Checkov => reports::parse_checkov(report),
            Self::Trivy => reports::parse_trivy(report),
        }
    }
}

/// Runs a scanner and fails when any finding reaches the threshold.
#[derive(Debug, Clone)]
pub struct ScanAdapter {
    scanner: Scanner,
    command: ToolCommand,
    threshold: Severity,
}

impl ScanAdapter {
    /// Creates an adapter for `scanner` that fails on [`Severity::High`] and above.
    #[must_use]
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            command: scanner.command(),
            threshold: Severity::High,
        }
    }

    /// Sets the lowest severity that fails the stage.
    #[must_use]
    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replaces the command template.
    #[must_use]
    pub fn with_command(mut self, command: ToolCommand) -> Self {
        self.command = command;
        self
    }

    /// Pins the tool version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.command = self.command.with_version(version);
        self
    }

    /// Returns the number of findings at or above the threshold.
    ///
    /// Findings without a severity never count.
    #[must_use]
    pub fn blocking(&self, findings: &[ScanFinding]) -> usize {
        findings
            .iter()
            .filter(|f| f.severity != Severity::Unknown && f.severity >= self.threshold)
            .count()
    }
}

#[async_trait]
impl StageAdapter for ScanAdapter {
    fn kind(&self) -> &str {
        match self.scanner {
            Scanner::Tfsec => "tfsec",
            Scanner::Checkov => "checkov",
            Scanner::Trivy => "trivy",
        }
    }

    fn version(&self) -> Option<&str> {
        self.command.version.as_deref()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> AdapterOutput {
        let mut vars = ctx.tool_vars();
        vars.entry("stack_dir".to_string())
            .or_insert_with(|| ".".to_string());

        let output = match invoke(ctx, &self.command, vars).await {
            Ok(output) => output,
            Err(failed) => return failed,
        };
        if !self.command.is_success_code(output.exit_code) {
            return exit_failure(&self.command, &output);
        }

        let findings = match self.scanner.parse(&output.stdout) {
            Ok(findings) => findings,
            Err(e) => {
                return AdapterOutput::failure(e.to_string()).with_diagnostics(output.diagnostics())
            }
        };
        let blocking = self.blocking(&findings);
        info!(
            scanner = %self.scanner,
            findings = findings.len(),
            blocking,
            threshold = %self.threshold,
            "scan complete"
        );

        let scanner = self.scanner.to_string();
        let comment = Annotation::pr_comment(
            format!("{scanner}-findings"),
            render::findings_comment(&scanner, &findings),
        );
        let report = Annotation::new(
            AnnotationTarget::SecurityReport,
            scanner.clone(),
            sarif::render(&scanner, self.version(), &findings),
        );

        let result = if blocking > 0 {
            AdapterOutput::failure(format!(
                "{blocking} finding(s) at or above {} severity",
                self.threshold
            ))
        } else {
            AdapterOutput::success()
        };
        result
            .with_findings(findings)
            .with_annotation(comment)
            .with_annotation(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> ScanFinding {
        ScanFinding::new(severity, "rule", "message", "main.tf:1")
    }

    #[test]
    fn test_blocking_threshold() {
        let findings = vec![
            finding(Severity::Unknown),
            finding(Severity::Low),
            finding(Severity::High),
            finding(Severity::Critical),
        ];
        assert_eq!(ScanAdapter::new(Scanner::Tfsec).blocking(&findings), 2);
        assert_eq!(
            ScanAdapter::new(Scanner::Tfsec)
                .with_threshold(Severity::Low)
                .blocking(&findings),
            3
        );
        assert_eq!(
            ScanAdapter::new(Scanner::Tfsec)
                .with_threshold(Severity::Critical)
                .blocking(&findings),
            1
        );
    }

    #[test]
    fn test_scanner_kinds() {
        assert_eq!(ScanAdapter::new(Scanner::Checkov).kind(), "checkov");
        assert_eq!(Scanner::Trivy.command().program, "trivy");
        assert!(Scanner::Tfsec.parse("not json").is_err());
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use crate::adapters::test_support::sh;
        use crate::credentials::StaticCredentialProvider;
        use std::collections::BTreeMap;

        const REPORT: &str = r#"{"results": [{"rule_id": "AVD-AWS-0086", "description": "public acl", "severity": "CRITICAL", "location": {"filename": "s3.tf", "start_line": 4}}, {"rule_id": "AVD-AWS-0090", "description": "versioning", "severity": "LOW"}]}"#;

        fn adapter(threshold: Severity) -> ScanAdapter {
            ScanAdapter::new(Scanner::Tfsec)
                .with_command(sh(&format!("echo '{REPORT}'")))
                .with_threshold(threshold)
                .with_version("1.28.11")
        }

        #[tokio::test]
        async fn test_blocking_findings_fail_but_are_reported() {
            let inputs = BTreeMap::new();
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("security_scan", "dev", &inputs, &credentials);

            let output = adapter(Severity::High).execute(&ctx).await;
            assert_eq!(
                output.failure.as_deref(),
                Some("1 finding(s) at or above high severity")
            );
            assert_eq!(output.findings.len(), 2);
            assert!(output.artifact.is_none());

            let targets: Vec<AnnotationTarget> =
                output.annotations.iter().map(|a| a.target).collect();
            assert_eq!(
                targets,
                vec![AnnotationTarget::PullRequest, AnnotationTarget::SecurityReport]
            );
            let sarif: serde_json::Value =
                serde_json::from_str(&output.annotations[1].body).unwrap();
            assert_eq!(sarif["runs"][0]["tool"]["driver"]["version"], "1.28.11");
        }

        #[tokio::test]
        async fn test_empty_report_passes() {
            let inputs = BTreeMap::new();
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("security_scan", "dev", &inputs, &credentials);

            let output = ScanAdapter::new(Scanner::Tfsec)
                .with_command(sh(r#"echo '{"results": null}'"#))
                .execute(&ctx)
                .await;
            assert!(output.is_success());
            assert!(output.findings.is_empty());
        }

        #[tokio::test]
        async fn test_unparseable_report_fails() {
            let inputs = BTreeMap::new();
            let credentials = StaticCredentialProvider::new();
            let ctx = StageContext::new("security_scan", "dev", &inputs, &credentials);

            let output = ScanAdapter::new(Scanner::Trivy)
                .with_command(sh("echo 'FATAL config scan error'"))
                .execute(&ctx)
                .await;
            assert!(output
                .failure
                .as_deref()
                .is_some_and(|f| f.starts_with("Cannot parse trivy report")));
        }
    }
}
