// src/export.rs
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

use crate::request::Request;
use crate::time_value::format_time_12h;

pub const HEADER: [&str; 7] = [
    "No", "Date", "Name", "Time In", "Time Out", "Reason", "Status",
];

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    no: usize,
    date: String,
    name: &'a str,
    time_in: String,
    time_out: String,
    reason: &'a str,
    status: &'static str,
}

pub fn default_file_name(today: NaiveDate) -> String {
    format!("Report_{}.csv", today.format("%Y-%m-%d"))
}

/// Writes the header and then exactly one CSV row per request, in the given
/// order. The header is written even when `rows` is empty. Returns the number
/// of data rows written.
pub fn write_csv<W: Write>(writer: W, rows: &[&Request]) -> Result<usize, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADER)?;
    for (index, request) in rows.iter().enumerate() {
        wtr.serialize(ExportRow {
            no: index + 1,
            date: request.date.format("%Y-%m-%d").to_string(),
            name: &request.staff_name,
            time_in: format_time_12h(request.time_in.as_deref()),
            time_out: format_time_12h(request.time_out.as_deref()),
            reason: &request.reason,
            status: request.status.as_str(),
        })?;
    }
    wtr.flush()?;
    Ok(rows.len())
}
