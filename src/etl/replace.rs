/// Replace Module
///
/// The idempotency-critical step: delete the destination rows overlapping
/// a window, then load the staged file if the window produced data.
/// Re-running the pipeline for the same window converges to the same
/// warehouse state instead of appending duplicates, because the delete
/// runs unconditionally — a window that previously had data but now has
/// none still ends up empty.
use crate::config::DatasetSpec;
use crate::errors::RegenError;
use crate::etl::stage::StagedFile;
use crate::gcp::bigquery::WarehouseClient;
use crate::window::TimeWindow;

/// Result of the delete+load step for one (dataset, window) pair. Never
/// persisted, only logged and counted.
#[derive(Debug, Clone)]
pub struct ReplaceOutcome {
    pub succeeded: bool,
    pub message: String,
}

/// Delete statement covering exactly the window's half-open range on the
/// dataset's date column.
pub fn delete_query(warehouse_dataset: &str, spec: &DatasetSpec, window: &TimeWindow) -> String {
    format!(
        "delete from {}.{} where {} >= \"{}\" and {} < \"{}\"",
        warehouse_dataset,
        spec.table,
        spec.date_field,
        window.ini_string(),
        spec.date_field,
        window.end_string()
    )
}

/// Run the replacement for one (dataset, window) pair.
///
/// A failed delete is fatal: loading on top of unknown prior state would
/// create duplicates. A load job that ran and reported an error is
/// non-fatal by default (each dataset's table is independent) and comes
/// back as a failed outcome; `abort_on_load_failure` promotes it to a
/// fatal `RegenError::Load`.
pub async fn replace<W: WarehouseClient>(
    warehouse: &W,
    warehouse_dataset: &str,
    spec: &DatasetSpec,
    window: &TimeWindow,
    staged: Option<&StagedFile>,
    abort_on_load_failure: bool,
) -> Result<ReplaceOutcome, RegenError> {
    let query = delete_query(warehouse_dataset, spec, window);
    warehouse.delete(&query).await?;
    tracing::info!("Removed destination rows for [{}] in window {}", spec.name, window);

    let Some(staged) = staged else {
        return Ok(ReplaceOutcome { succeeded: true, message: "no data, deleted only".to_string() });
    };

    let job = warehouse.load(&staged.bucket, &staged.name, &spec.table).await?;
    if !job.succeeded {
        tracing::error!("Error loading [{}] into [{}]: {}", staged.name, spec.table, job.message);
        if abort_on_load_failure {
            return Err(RegenError::Load(job.message));
        }
        return Ok(ReplaceOutcome { succeeded: false, message: job.message });
    }

    tracing::info!("Loaded [{}] into [{}]", staged.name, spec.table);
    Ok(ReplaceOutcome { succeeded: true, message: job.message })
}
