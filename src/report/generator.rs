//! Markdown and JSON report generation.
//!
//! The JSON report is exactly the serialized result of the operation that
//! ran. The Markdown report adds run metadata and human-readable amounts.

use crate::models::{
    AcrossSubjectsResult, BalanceOnlyResult, EntityInfo, Observation, QueryOutcome, RunMetadata,
};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use chrono::DateTime;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(outcome: &QueryOutcome, metadata: &RunMetadata) -> String {
    let mut output = String::new();

    output.push_str("# Token Snapshot\n\n");
    output.push_str(&generate_metadata_section(outcome, metadata));

    match outcome {
        QueryOutcome::Batch(result) => {
            output.push_str(&generate_entities_section(
                result.subject_identifier,
                &result.entities,
            ));
        }
        QueryOutcome::Single(result) => {
            output.push_str(&generate_entities_section(
                result.subject_identifier,
                std::slice::from_ref(&result.entity),
            ));
        }
        QueryOutcome::Balances {
            subject,
            identifiers,
            result,
        } => {
            output.push_str(&generate_balances_section(*subject, identifiers, result));
        }
        QueryOutcome::AcrossSubjects { subjects, result } => {
            output.push_str(&generate_across_section(subjects, result));
        }
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(outcome: &QueryOutcome, metadata: &RunMetadata) -> String {
    let mut section = String::new();
    let observation = outcome.observation();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **RPC Endpoint:** {}\n", metadata.rpc_url));
    if let Some(contract) = metadata.contract {
        section.push_str(&format!("- **Aggregator Contract:** `{}`\n", contract));
    }
    section.push_str(&format!("- **Mode:** {}\n", outcome.mode()));
    section.push_str(&format!("- **Block:** {}\n", observation.sequence));
    section.push_str(&format!(
        "- **Block Time:** {}\n",
        format_observation_time(observation)
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Query Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Render a block timestamp as UTC, keeping the raw seconds alongside.
fn format_observation_time(observation: Observation) -> String {
    let formatted = i64::try_from(observation.timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    match formatted {
        Some(time) => format!("{} ({})", time, observation.timestamp),
        None => observation.timestamp.to_string(),
    }
}

/// Generate the token table for full and single queries.
fn generate_entities_section(subject: Address, entities: &[EntityInfo]) -> String {
    let mut section = String::new();

    section.push_str("## Holdings\n\n");
    section.push_str(&format!("**Holder:** `{}`\n\n", subject));

    if entities.is_empty() {
        section.push_str("No tokens were queried.\n\n");
        return section;
    }

    section.push_str("| # | Symbol | Token | Decimals | Balance | Raw Balance |\n");
    section.push_str("|---:|:---|:---|---:|---:|---:|\n");

    for (i, entity) in entities.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | `{}` | {} | {} | {} |\n",
            i + 1,
            escape_cell(&entity.symbol),
            entity.identifier,
            entity.precision,
            entity.display_balance(),
            entity.balance
        ));
    }
    section.push('\n');

    section
}

/// Generate the table for balance-only queries.
fn generate_balances_section(
    subject: Address,
    identifiers: &[Address],
    result: &BalanceOnlyResult,
) -> String {
    let mut section = String::new();

    section.push_str("## Balances\n\n");
    section.push_str(&format!("**Holder:** `{}`\n\n", subject));

    if result.balances.is_empty() {
        section.push_str("No tokens were queried.\n\n");
        return section;
    }

    section.push_str("| # | Token | Raw Balance |\n");
    section.push_str("|---:|:---|---:|\n");

    for (i, (token, balance)) in identifiers.iter().zip(&result.balances).enumerate() {
        section.push_str(&format!("| {} | `{}` | {} |\n", i + 1, token, balance));
    }
    section.push('\n');

    section
}

/// Generate the table for one token across many holders.
fn generate_across_section(subjects: &[Address], result: &AcrossSubjectsResult) -> String {
    let mut section = String::new();

    section.push_str("## Balances by Holder\n\n");
    section.push_str(&format!("**Token:** `{}`\n\n", result.identifier));

    if result.balances.is_empty() {
        section.push_str("No holders were queried.\n\n");
        return section;
    }

    section.push_str("| # | Holder | Raw Balance |\n");
    section.push_str("|---:|:---|---:|\n");

    for (i, (holder, balance)) in subjects.iter().zip(&result.balances).enumerate() {
        section.push_str(&format!("| {} | `{}` | {} |\n", i + 1, holder, balance));
    }

    let total = result
        .balances
        .iter()
        .fold(U256::ZERO, |acc, b| acc.saturating_add(*b));
    section.push_str(&format!("\n**Total:** {}\n\n", total));

    section
}

// Symbols come from arbitrary contracts.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by tokensnap v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report: the serialized result of the operation that ran.
pub fn generate_json_report(outcome: &QueryOutcome) -> Result<String> {
    let json = match outcome {
        QueryOutcome::Batch(result) => serde_json::to_string_pretty(result),
        QueryOutcome::Balances { result, .. } => serde_json::to_string_pretty(result),
        QueryOutcome::Single(result) => serde_json::to_string_pretty(result),
        QueryOutcome::AcrossSubjects { result, .. } => serde_json::to_string_pretty(result),
    };
    json.context("Failed to serialize query result")
}

/// Write a rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchResult, SingleEntityResult};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_metadata() -> RunMetadata {
        RunMetadata {
            rpc_url: "http://localhost:8545".to_string(),
            contract: None,
            generated_at: Utc::now(),
            duration_seconds: 0.4,
        }
    }

    fn create_test_batch() -> BatchResult {
        BatchResult {
            subject_identifier: Address::repeat_byte(0x48),
            entities: vec![
                EntityInfo {
                    identifier: Address::repeat_byte(1),
                    symbol: "USDC".to_string(),
                    precision: 6,
                    balance: U256::from(1_000_500_000u64),
                },
                EntityInfo {
                    identifier: Address::repeat_byte(3),
                    symbol: "DAI".to_string(),
                    precision: 18,
                    balance: U256::from(3_000u128 * 10u128.pow(18)),
                },
            ],
            observed_at: 1_700_000_000,
            observed_at_sequence: 18_000_000,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let outcome = QueryOutcome::Batch(create_test_batch());
        let markdown = generate_markdown_report(&outcome, &create_test_metadata());

        assert!(markdown.contains("# Token Snapshot"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("- **Block:** 18000000"));
        assert!(markdown.contains("2023-11-14 22:13:20 UTC (1700000000)"));
        assert!(markdown.contains("## Holdings"));
        assert!(markdown.contains("| 1 | USDC |"));
        assert!(markdown.contains("| 1000.5 | 1000500000 |"));
        assert!(markdown.contains("| 3000 | 3000000000000000000000 |"));
        assert!(!markdown.contains("Aggregator Contract"));
    }

    #[test]
    fn test_markdown_preserves_order() {
        let outcome = QueryOutcome::Batch(create_test_batch());
        let markdown = generate_markdown_report(&outcome, &create_test_metadata());

        let usdc = markdown.find("USDC").unwrap();
        let dai = markdown.find("DAI").unwrap();
        assert!(usdc < dai);
    }

    #[test]
    fn test_markdown_empty_batch() {
        let mut batch = create_test_batch();
        batch.entities.clear();
        let markdown =
            generate_markdown_report(&QueryOutcome::Batch(batch), &create_test_metadata());

        assert!(markdown.contains("No tokens were queried."));
    }

    #[test]
    fn test_markdown_contract_and_balances() {
        let mut metadata = create_test_metadata();
        metadata.contract = Some(Address::repeat_byte(9));

        let outcome = QueryOutcome::Balances {
            subject: Address::repeat_byte(0x48),
            identifiers: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
            result: BalanceOnlyResult {
                balances: vec![U256::from(7u64), U256::ZERO],
                observed_at: 1_700_000_000,
                observed_at_sequence: 18_000_000,
            },
        };
        let markdown = generate_markdown_report(&outcome, &metadata);

        assert!(markdown.contains("Aggregator Contract"));
        assert!(markdown.contains("## Balances"));
        assert!(markdown.contains(&format!("| 1 | `{}` | 7 |", Address::repeat_byte(1))));
        assert!(markdown.contains(&format!("| 2 | `{}` | 0 |", Address::repeat_byte(2))));
    }

    #[test]
    fn test_markdown_across_subjects_total() {
        let outcome = QueryOutcome::AcrossSubjects {
            subjects: vec![Address::repeat_byte(0x48), Address::repeat_byte(0x49)],
            result: AcrossSubjectsResult {
                identifier: Address::repeat_byte(1),
                balances: vec![U256::from(5u64), U256::from(6u64)],
                observed_at: 1_700_000_000,
                observed_at_sequence: 18_000_000,
            },
        };
        let markdown = generate_markdown_report(&outcome, &create_test_metadata());

        assert!(markdown.contains("## Balances by Holder"));
        assert!(markdown.contains("**Total:** 11"));
    }

    #[test]
    fn test_escape_symbol() {
        let mut batch = create_test_batch();
        batch.entities[0].symbol = "A|B".to_string();
        let markdown =
            generate_markdown_report(&QueryOutcome::Batch(batch), &create_test_metadata());

        assert!(markdown.contains("A\\|B"));
    }

    #[test]
    fn test_generate_json_report() {
        let outcome = QueryOutcome::Batch(create_test_batch());
        let json = generate_json_report(&outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["observedAt"], 1_700_000_000u64);
        assert_eq!(value["observedAtSequence"], 18_000_000u64);
        assert_eq!(value["entities"][0]["symbol"], "USDC");
        assert_eq!(value["entities"][0]["balance"], "1000500000");
        assert_eq!(value["entities"][1]["precision"], 18);
    }

    #[test]
    fn test_generate_json_report_single() {
        let batch = create_test_batch();
        let outcome = QueryOutcome::Single(SingleEntityResult {
            subject_identifier: batch.subject_identifier,
            entity: batch.entities[0].clone(),
            observed_at: batch.observed_at,
            observed_at_sequence: batch.observed_at_sequence,
        });
        let json = generate_json_report(&outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["entity"]["symbol"], "USDC");
        assert!(value.get("entities").is_none());
    }

    #[test]
    fn test_write_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.md");

        write_report("# Token Snapshot\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Token Snapshot\n");
    }
}
