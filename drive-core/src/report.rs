//! Final report text.

use crate::status::Status;
use std::collections::BTreeMap;

pub const REPORT_HEADER: &str = "Drive tester result:";

/// `   <path> (<serial>): <outcome>` with the outcome in tagged form.
pub fn report_line(device: &str, status: &Status) -> String {
    format!(
        "   {} ({}): {}",
        device,
        status.serial_number,
        status.tagged()
    )
}

pub fn render_report(results: &BTreeMap<String, Status>) -> String {
    let mut out = String::from(REPORT_HEADER);
    out.push('\n');
    for (device, status) in results {
        out.push_str(&report_line(device, status));
        out.push('\n');
    }
    out
}
