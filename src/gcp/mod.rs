/// Google Cloud Collaborators
///
/// Narrow wrappers around the two cloud dependencies of the pipeline:
/// - storage: staging bucket for serialized payloads
/// - bigquery: warehouse delete + load jobs
pub mod bigquery;
pub mod storage;
