pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Render a simulation or series response in the requested format.
pub fn format_output(format: &OutputFormat, response: &Value) {
    match format {
        OutputFormat::Json => json::print_json(response),
        OutputFormat::Table => table::print_table(response),
        OutputFormat::Csv => csv_out::print_csv(response),
        OutputFormat::Minimal => minimal::print_minimal(response),
    }
}
