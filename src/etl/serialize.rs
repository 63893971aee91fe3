/// Serialize Module
///
/// Renders an extraction result into a CSV payload: field names as the
/// header, rows in source order, fields quoted only when necessary.
/// Zero rows is an expected, first-class outcome and returns the empty
/// sentinel rather than an error.
use crate::db::QueryResult;
use crate::errors::RegenError;
use csv::{QuoteStyle, WriterBuilder};

/// Serialize a result set to CSV, or `None` when the window had no data.
/// A serialization failure blocks staging, so it propagates as a staging
/// error.
pub fn to_csv(result: &QueryResult) -> Result<Option<String>, RegenError> {
    if result.is_empty() {
        return Ok(None);
    }

    let serialize_err = |e: csv::Error| RegenError::Staging(format!("failed to serialize payload: {}", e));

    let mut wtr = WriterBuilder::new().quote_style(QuoteStyle::Necessary).from_writer(Vec::new());
    wtr.write_record(&result.fields).map_err(serialize_err)?;
    for row in &result.rows {
        wtr.write_record(row).map_err(serialize_err)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| RegenError::Staging(format!("failed to serialize payload: {}", e)))?;
    let payload = String::from_utf8(bytes)
        .map_err(|e| RegenError::Staging(format!("payload is not valid UTF-8: {}", e)))?;

    Ok(Some(payload))
}
