//! Output formatting for arrival results.
//!
//! Supports pretty-printing, JSON serialization and a one-line summary.

use anyhow::Result;
use tracing::debug;

use crate::arrival::ResultSet;

/// Logs the result set using Rust's debug pretty-print format.
pub fn print_pretty(results: &ResultSet) {
    debug!("{:#?}", results);
}

/// Renders the result set as pretty-printed JSON.
pub fn to_json(results: &ResultSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Prints the result set as JSON on stdout.
pub fn print_json(results: &ResultSet) -> Result<()> {
    println!("{}", to_json(results)?);
    Ok(())
}

/// The soonest arrival as `<route> <route name>: <due in>`.
pub fn headline(results: &ResultSet) -> String {
    let next = results.first();
    format!("{} {}: {}", next.route, next.route_name, next.due_in)
}

/// One line per arrival: `<route> <route name>: <due in>`.
pub fn summary(results: &ResultSet) -> String {
    results
        .iter()
        .map(|r| format!("{} {}: {}", r.route, r.route_name, r.due_in))
        .collect::<Vec<_>>()
        .join("\n")
}
