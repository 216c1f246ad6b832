use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        }
    }
}

#[derive(Tabled, Serialize, Debug, PartialEq)]
pub struct AddressRow {
    #[tabled(rename = "Coordinates")]
    #[serde(rename = "coordinates")]
    pub input: String,
    #[tabled(rename = "Address")]
    #[serde(rename = "address")]
    pub address: String,
    #[tabled(rename = "Source")]
    #[serde(rename = "source")]
    pub source: String,
}

#[derive(Tabled, Serialize, Debug, PartialEq)]
pub struct FetchRow {
    #[tabled(rename = "#")]
    #[serde(rename = "attempt")]
    pub attempt: u32,
    #[tabled(rename = "Outcome")]
    #[serde(rename = "outcome")]
    pub outcome: String,
    #[tabled(rename = "Cached")]
    #[serde(rename = "cached")]
    pub cached: bool,
    #[tabled(rename = "Updated")]
    #[serde(rename = "updated")]
    pub updated: String,
    #[tabled(rename = "Data")]
    #[serde(rename = "data")]
    pub data: String,
}

pub fn print_table<T: Tabled>(rows: &[T]) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

pub fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => print_json(&rows),
    }
}

/// Shortens `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
