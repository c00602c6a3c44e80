//! Report generation module.
//!
//! This module renders the analytics report as Markdown or JSON.

mod generator;

pub use generator::{generate_json_report, generate_markdown_report};
