//! Report rendering for query outcomes.

mod generator;

pub use generator::{generate_json_report, generate_markdown_report, write_report};
