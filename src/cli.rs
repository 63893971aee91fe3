/// CLI Module
///
/// Command-line interface configuration using clap. Malformed or missing
/// date arguments are rejected here, before any I/O occurs.
use crate::errors::RegenError;
use crate::window::StepUnit;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use clap::Parser;

/// Analytics Regenerator
///
/// Replay a date range through the extract → stage → load pipeline,
/// regenerating the corresponding warehouse table slices.
#[derive(Parser, Debug)]
#[command(name = "regenerate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Start of the date range to regenerate (inclusive)
    #[arg(short = 'i', long = "ini", value_name = "DATE", value_parser = parse_timestamp)]
    pub ini: DateTime<Utc>,

    /// End of the date range to regenerate (exclusive)
    #[arg(short = 'e', long = "end", value_name = "DATE", value_parser = parse_timestamp)]
    pub end: DateTime<Utc>,

    /// Window step unit: m, h, d, w, M or y
    #[arg(short = 'b', long = "by", value_name = "UNIT", default_value = "h", value_parser = parse_step_unit)]
    pub by: StepUnit,

    /// Configuration environment to run against
    #[arg(long, value_name = "NAME", default_value = "test")]
    pub env: String,
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> Result<(), RegenError> {
        if self.ini >= self.end {
            return Err(RegenError::Parameter(format!(
                "iniDate [{}] must be strictly before endDate [{}]",
                self.ini.to_rfc3339_opts(SecondsFormat::Millis, true),
                self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
            )));
        }
        Ok(())
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare date (midnight UTC).
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)) {
        return Ok(dt.and_utc());
    }
    Err(format!("[{}] is not a valid date", s))
}

fn parse_step_unit(s: &str) -> Result<StepUnit, String> {
    StepUnit::parse(s).map_err(|e| e.to_string())
}
