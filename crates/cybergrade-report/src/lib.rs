//! cybergrade-report: score export renderers.
//!
//! Renders the pivot and raw attempt sheets produced by `cybergrade-core`
//! as CSV files or a self-contained HTML page.

pub mod csv;
pub mod html;

pub use csv::{attempts_to_csv, pivot_to_csv, write_csv_exports, write_pivot_csv};
pub use html::{generate_html, write_html_report};
