//! SARIF 2.1.0 rendering of scan findings.

use crate::core::ScanFinding;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// SARIF schema URI.
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

/// Builds a SARIF log with one run for `tool`.
#[must_use]
pub fn to_sarif(tool: &str, version: Option<&str>, findings: &[ScanFinding]) -> Value {
    let mut rules: BTreeMap<&str, &ScanFinding> = BTreeMap::new();
    for finding in findings {
        rules.entry(finding.rule_id.as_str()).or_insert(finding);
    }

    let rules: Vec<Value> = rules
        .values()
        .map(|f| {
            json!({
                "id": f.rule_id,
                "shortDescription": { "text": f.message },
                "defaultConfiguration": { "level": f.severity.sarif_level() },
            })
        })
        .collect();

    let results: Vec<Value> = findings
        .iter()
        .map(|f| {
            let (uri, line) = split_location(&f.location);
            let mut region = serde_json::Map::new();
            if let Some(line) = line {
                region.insert("startLine".to_string(), json!(line));
            }
            json!({
                "ruleId": f.rule_id,
                "level": f.severity.sarif_level(),
                "message": { "text": f.message },
                "properties": { "severity": f.severity.to_string() },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": uri },
                        "region": region,
                    }
                }],
            })
        })
        .collect();

    let mut driver = json!({ "name": tool, "rules": rules });
    if let Some(version) = version {
        driver["version"] = json!(version);
    }

    json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{ "tool": { "driver": driver }, "results": results }],
    })
}

/// Renders the SARIF log as pretty JSON.
#[must_use]
pub fn render(tool: &str, version: Option<&str>, findings: &[ScanFinding]) -> String {
    let log = to_sarif(tool, version, findings);
    serde_json::to_string_pretty(&log).unwrap_or_else(|_| log.to_string())
}

/// Splits "file.tf:12" into ("file.tf", Some(12)). Regions must start at 1.
fn split_location(location: &str) -> (&str, Option<u64>) {
    if let Some((file, line)) = location.rsplit_once(':') {
        if let Ok(line) = line.parse::<u64>() {
            if line > 0 {
                return (file, Some(line));
            }
            return (file, None);
        }
    }
    (location, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;

    #[test]
    fn test_sarif_structure() {
        let findings = vec![
            ScanFinding::new(Severity::High, "AVD-AWS-0086", "Block public ACLs", "s3.tf:10"),
            ScanFinding::new(Severity::High, "AVD-AWS-0086", "Block public ACLs", "s3.tf:30"),
            ScanFinding::new(Severity::Low, "AVD-AWS-0090", "Enable versioning", "s3.tf"),
        ];
        let log = to_sarif("trivy", Some("0.50.1"), &findings);

        assert_eq!(log["version"], "2.1.0");
        let run = &log["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "trivy");
        assert_eq!(run["tool"]["driver"]["version"], "0.50.1");
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);

        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["level"], "error");
        assert_eq!(
            results[0]["locations"][0]["physicalLocation"]["region"]["startLine"],
            10
        );
        assert_eq!(results[2]["level"], "note");
        assert!(results[2]["locations"][0]["physicalLocation"]["region"]
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_split_location() {
        assert_eq!(split_location("main.tf:4"), ("main.tf", Some(4)));
        assert_eq!(split_location("main.tf:0"), ("main.tf", None));
        assert_eq!(split_location("modules/x/main.tf"), ("modules/x/main.tf", None));
        assert_eq!(split_location("C:dir"), ("C:dir", None));
    }
}
