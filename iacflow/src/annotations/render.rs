//! Markdown renderers for pull request comments.

use crate::core::{severity_counts, CostEstimate, ScanFinding, Severity};
use std::fmt::Write;

/// Longest diagnostics excerpt included in a comment.
pub const MAX_DIAGNOSTICS_CHARS: usize = 60_000;

/// Renders the plan summary comment.
#[must_use]
pub fn plan_comment(environment: &str, summary: &str, diagnostics: &str) -> String {
    let mut out = format!("### Plan for `{environment}`\n\n**{summary}**\n");
    if !diagnostics.trim().is_empty() {
        let excerpt = truncate(diagnostics.trim(), MAX_DIAGNOSTICS_CHARS);
        let _ = write!(
            out,
            "\n<details><summary>Show output</summary>\n\n```\n{excerpt}\n```\n\n</details>\n"
        );
    }
    out
}

/// Renders a findings table, most severe first.
#[must_use]
pub fn findings_comment(scanner: &str, findings: &[ScanFinding]) -> String {
    if findings.is_empty() {
        return format!("### {scanner} scan\n\nNo findings.\n");
    }

    let counts = severity_counts(findings);
    let totals: Vec<String> = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Unknown,
    ]
    .iter()
    .filter_map(|s| counts.get(s).map(|n| format!("{n} {s}")))
    .collect();

    let mut sorted: Vec<&ScanFinding> = findings.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.rule_id.cmp(&b.rule_id)));

    let mut out = format!(
        "### {scanner} scan\n\n{} finding(s): {}\n\n| Severity | Rule | Location | Message |\n|---|---|---|---|\n",
        findings.len(),
        totals.join(", ")
    );
    for finding in sorted {
        let _ = writeln!(
            out,
            "| {} | `{}` | {} | {} |",
            finding.severity,
            finding.rule_id,
            escape_cell(&finding.location),
            escape_cell(&finding.message)
        );
    }
    out
}

/// Renders the cost breakdown comment.
#[must_use]
pub fn cost_comment(estimate: &CostEstimate) -> String {
    let mut out = format!(
        "### Cost estimate\n\nEstimated monthly cost: **{}**\n",
        format_amount(estimate.monthly_estimate, &estimate.currency)
    );
    let ranked = estimate.ranked_breakdown();
    if !ranked.is_empty() {
        out.push_str("\n| Resource type | Monthly cost |\n|---|---|\n");
        for (resource_type, amount) in ranked {
            let _ = writeln!(
                out,
                "| `{resource_type}` | {} |",
                format_amount(amount, &estimate.currency)
            );
        }
    }
    out
}

/// Formats `amount` with two decimals and the currency code.
#[must_use]
pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n... (truncated)", &value[..idx]),
        None => value.to_string(),
    }
}
