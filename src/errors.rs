/// Error Taxonomy
///
/// Classifies pipeline failures by where they occur and whether the run
/// can continue. Configuration and parameter errors abort before any
/// window is processed; source-query, staging, and delete-phase errors
/// abort mid-run; load-phase errors are recorded and the run continues.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegenError {
    /// Missing or invalid configuration: unknown environment, missing
    /// template file, missing credentials. Pre-flight, fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or invalid CLI parameters. Pre-flight, fatal.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// The extraction query failed. The shared source connection is no
    /// longer trustworthy, so this aborts the remaining pipeline.
    #[error("source query failed: {0}")]
    SourceQuery(String),

    /// Uploading the payload to the staging bucket failed. Fatal: the
    /// load step cannot proceed without the staged artifact.
    #[error("staging upload failed: {0}")]
    Staging(String),

    /// The delete phase of a replacement failed. Fatal: loading on top
    /// of unknown prior state would create duplicates.
    #[error("warehouse delete failed: {0}")]
    Replace(String),

    /// The load phase of a replacement failed. Non-fatal by default;
    /// caught at the replacer boundary and recorded as a failed outcome.
    #[error("warehouse load failed: {0}")]
    Load(String),
}
