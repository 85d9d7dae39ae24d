use std::fmt::Write as _;

use rolewatch_application::{ImportPlan, RunReport};
use rolewatch_domain::{DriftSummary, RoleAssignment};
use serde_json::{Map, Value, json};

const UNRESOLVED_ROLE: &str = "(role unavailable)";

/// Renders the run outcome as a console listing.
#[must_use]
pub fn console_report(report: &RunReport) -> String {
    let summary = report.summary();
    let mut output = String::new();

    for group in summary.environments() {
        let _ = writeln!(
            output,
            "environment '{}': {} finding(s)",
            group.environment,
            group.records.len()
        );
        for record in &group.records {
            let _ = writeln!(
                output,
                "  [{}] {} | principal {} ({}) | role {} | scope {}",
                record.kind.as_str(),
                record.assignment.assignment_id,
                record.assignment.display_label(),
                record.assignment.principal_id,
                role_label(&record.assignment),
                record.assignment.scope
            );
        }
    }

    let failed = report.failed_environments();
    if !failed.is_empty() {
        let _ = writeln!(output, "environments not checked:");
        for (environment, error) in failed {
            let _ = writeln!(output, "  {environment}: {error}");
        }
    }

    let _ = writeln!(output, "total drift findings: {}", summary.total());
    output
}

/// Renders the drift summary as CSV rows with a header.
#[must_use]
pub fn csv_report(summary: &DriftSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "environment,assignment_id,principal_id,principal_name,role,scope,drift_kind,expiry"
    );

    for group in summary.environments() {
        for record in &group.records {
            let _ = writeln!(
                output,
                "{},{},{},{},{},{},{},{}",
                csv_field(group.environment.as_str()),
                csv_field(record.assignment.assignment_id.as_str()),
                csv_field(record.assignment.principal_id.as_str()),
                csv_field(record.assignment.display_label()),
                csv_field(role_label(&record.assignment)),
                csv_field(record.assignment.scope.as_str()),
                record.kind.as_str(),
                expiry_label(&record.assignment)
            );
        }
    }

    output
}

/// Renders the drift summary as a Markdown table.
#[must_use]
pub fn markdown_report(summary: &DriftSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Role assignment drift");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Environment | Assignment | Principal | Role | Scope | Kind |"
    );
    let _ = writeln!(output, "| --- | --- | --- | --- | --- | --- |");

    for group in summary.environments() {
        for record in &group.records {
            let _ = writeln!(
                output,
                "| {} | `{}` | {} | {} | `{}` | {} |",
                group.environment,
                record.assignment.assignment_id,
                record.assignment.display_label(),
                role_label(&record.assignment),
                record.assignment.scope,
                record.kind.as_str()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Total findings: {}", summary.total());
    output
}

/// Renders IaC import directives for a bootstrap plan.
#[must_use]
pub fn import_directives(plan: &ImportPlan) -> String {
    let mut output = String::new();

    for entry in &plan.entries {
        let _ = writeln!(
            output,
            "terraform import 'azurerm_role_assignment.managed[\"{}\"]' '{}'",
            entry.index, entry.assignment.assignment_id
        );
    }

    output
}

/// Builds the variable-file fragment for a bootstrap plan, keyed by index.
#[must_use]
pub fn variable_entries(plan: &ImportPlan) -> Value {
    let mut entries = Map::new();

    for entry in &plan.entries {
        let mut fields = Map::new();
        fields.insert(
            "principal_id".to_owned(),
            json!(entry.assignment.principal_id),
        );
        if let Some(role_name) = entry.assignment.role_name.as_deref() {
            fields.insert("role_name".to_owned(), json!(role_name));
        }
        if let Some(role_definition_id) = entry.assignment.role_definition_id.as_deref() {
            fields.insert("role_definition_id".to_owned(), json!(role_definition_id));
        }
        fields.insert("scope".to_owned(), json!(entry.assignment.scope));
        if let Some(condition) = entry.assignment.condition.as_deref() {
            fields.insert("condition".to_owned(), json!(condition));
            if let Some(version) = entry.assignment.condition_version.as_deref() {
                fields.insert("condition_version".to_owned(), json!(version));
            }
        }

        entries.insert(entry.index.to_string(), Value::Object(fields));
    }

    Value::Object(entries)
}

fn role_label(assignment: &RoleAssignment) -> &str {
    assignment
        .role_name
        .as_deref()
        .or(assignment.role_definition_id.as_deref())
        .unwrap_or(UNRESOLVED_ROLE)
}

fn expiry_label(assignment: &RoleAssignment) -> String {
    assignment
        .expiry
        .map(|value| value.to_rfc3339())
        .unwrap_or_default()
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
