/// Pipeline Module
///
/// Orchestrates the full regeneration: outer loop over windows in
/// chronological order, inner loop over datasets in configured order,
/// each (window, dataset) pair run to completion before the next begins.
/// Execution is strictly sequential: the source database and the
/// warehouse load-job quota are shared, rate-limited resources, and
/// parallel fan-out across windows × datasets would overwhelm them.
use crate::config::{DatasetSpec, RunConfig};
use crate::db::SourceClient;
use crate::errors::RegenError;
use crate::etl::{extract, replace, serialize, stage};
use crate::gcp::bigquery::WarehouseClient;
use crate::gcp::storage::StagingStore;
use crate::window::{TimeWindow, Windows};
use std::time::{Duration, Instant};

/// Run execution statistics
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub windows_total: usize,
    pub windows_processed: usize,
    pub pairs_processed: usize,
    pub loads_succeeded: usize,
    pub loads_failed: usize,
    pub empty_windows: usize,
    pub elapsed_time: Duration,
    pub failures: Vec<LoadFailure>,
}

/// One non-fatal load failure, itemized in the final report.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub dataset: String,
    pub window: TimeWindow,
    pub message: String,
}

/// Main regeneration pipeline
pub struct Pipeline<'a, S, W> {
    source: &'a S,
    warehouse: &'a W,
    staging: &'a StagingStore,
    config: &'a RunConfig,
}

impl<'a, S: SourceClient, W: WarehouseClient> Pipeline<'a, S, W> {
    /// Create a new pipeline instance
    pub fn new(source: &'a S, warehouse: &'a W, staging: &'a StagingStore, config: &'a RunConfig) -> Self {
        Self { source, warehouse, staging, config }
    }

    /// Run the complete pipeline across all windows and datasets. Fatal
    /// errors (source query, staging, delete phase) propagate and
    /// truncate the run; load-job failures are recorded and the run
    /// continues.
    pub async fn run(&self, windows: &Windows) -> Result<RunStats, RegenError> {
        let start_time = Instant::now();
        let mut stats = RunStats { windows_total: windows.len(), ..RunStats::default() };

        for (index, window) in windows.iter().enumerate() {
            println!("\n[{}/{}] Start process for window {}", index + 1, stats.windows_total, window);
            let partial_time = Instant::now();

            for spec in &self.config.datasets {
                self.process_dataset(spec, &window, &mut stats).await?;
            }

            stats.windows_processed += 1;
            println!("   ⏱️  Window time: {}", format_duration(partial_time.elapsed()));
        }

        stats.elapsed_time = start_time.elapsed();
        self.print_final_stats(&stats);

        Ok(stats)
    }

    /// Run extract → serialize → stage → replace for one (window,
    /// dataset) pair.
    async fn process_dataset(
        &self,
        spec: &DatasetSpec,
        window: &TimeWindow,
        stats: &mut RunStats,
    ) -> Result<(), RegenError> {
        println!("   Process [{}]", spec.name);

        let result = extract::extract(self.source, &spec.name, &spec.query_template, window).await?;
        tracing::info!("Data obtained from source for [{}]: {} rows", spec.name, result.rows.len());

        let staged = match serialize::to_csv(&result)? {
            Some(payload) => {
                let staged = stage::upload(self.staging, &spec.name, window, payload).await?;
                tracing::info!("Payload staged at [{}]", staged.location);
                Some(staged)
            }
            None => None,
        };

        let outcome = replace::replace(
            self.warehouse,
            &self.config.dataset,
            spec,
            window,
            staged.as_ref(),
            self.config.abort_on_load_failure,
        )
        .await?;

        stats.pairs_processed += 1;
        if staged.is_none() {
            stats.empty_windows += 1;
            tracing::warn!("No data found for [{}] in window {}", spec.name, window);
        } else if outcome.succeeded {
            stats.loads_succeeded += 1;
        } else {
            stats.loads_failed += 1;
            stats.failures.push(LoadFailure {
                dataset: spec.name.clone(),
                window: *window,
                message: outcome.message,
            });
        }

        Ok(())
    }

    /// Print final statistics
    fn print_final_stats(&self, stats: &RunStats) {
        println!("\n📊 Regeneration Statistics:");
        println!("   ⏱️  Total time: {}", format_duration(stats.elapsed_time));
        println!("   🪟 Windows: {} of {} processed", stats.windows_processed, stats.windows_total);
        println!("   📝 Pairs processed: {}", stats.pairs_processed);
        println!("   💾 Loads succeeded: {}", stats.loads_succeeded);
        println!("   ❌ Loads failed: {}", stats.loads_failed);
        println!("   ⚠️  Empty windows (deleted only): {}", stats.empty_windows);

        if !stats.failures.is_empty() {
            println!("\n❌ Load failures: {}", stats.failures.len());
            for (i, failure) in stats.failures.iter().enumerate() {
                println!("   {}. [{}] window {}: {}", i + 1, failure.dataset, failure.window, failure.message);
            }
        }
    }
}

/// Format a duration as hours, minutes and seconds
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::QueryResult;
    use crate::gcp::bigquery::LoadJobResult;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Source that answers per-dataset canned results, recording every
    /// query, and optionally failing from the nth call onward.
    struct MockSource {
        queries: Mutex<Vec<String>>,
        fail_from_call: Option<usize>,
    }

    impl MockSource {
        fn new() -> Self {
            Self { queries: Mutex::new(vec![]), fail_from_call: None }
        }

        fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SourceClient for MockSource {
        async fn execute(&self, query: &str) -> Result<QueryResult, RegenError> {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            if let Some(n) = self.fail_from_call {
                if queries.len() >= n {
                    return Err(RegenError::SourceQuery("connection reset".to_string()));
                }
            }
            // The "events" dataset never has rows; "sessions" always does.
            if query.contains("from events") {
                Ok(QueryResult { fields: vec![], rows: vec![] })
            } else {
                Ok(QueryResult {
                    fields: vec!["a".to_string(), "b".to_string()],
                    rows: vec![vec!["1".to_string(), "x".to_string()], vec!["2".to_string(), "y".to_string()]],
                })
            }
        }
    }

    struct MockWarehouse {
        deletes: Mutex<Vec<String>>,
        loads: Mutex<Vec<(String, String, String)>>,
        fail_loads_into: Option<String>,
    }

    impl MockWarehouse {
        fn new() -> Self {
            Self { deletes: Mutex::new(vec![]), loads: Mutex::new(vec![]), fail_loads_into: None }
        }
    }

    #[async_trait]
    impl WarehouseClient for MockWarehouse {
        async fn delete(&self, query: &str) -> Result<(), RegenError> {
            self.deletes.lock().unwrap().push(query.to_string());
            Ok(())
        }

        async fn load(&self, bucket: &str, name: &str, table: &str) -> Result<LoadJobResult, RegenError> {
            self.loads.lock().unwrap().push((bucket.to_string(), name.to_string(), table.to_string()));
            if self.fail_loads_into.as_deref() == Some(table) {
                Ok(LoadJobResult { succeeded: false, message: "bad CSV row".to_string() })
            } else {
                Ok(LoadJobResult { succeeded: true, message: "SUCCESS".to_string() })
            }
        }
    }

    fn config() -> RunConfig {
        let template =
            "select * from {name} where at >= '#INI_DATE#' and at < '#END_DATE#'";
        RunConfig {
            environment: "test".to_string(),
            database_url: "postgres://localhost/analytics".to_string(),
            bucket: "staging-test".to_string(),
            project_id: "acme-test".to_string(),
            dataset: "analytics".to_string(),
            abort_on_load_failure: false,
            datasets: vec![
                DatasetSpec {
                    name: "sessions".to_string(),
                    table: "sessions_v1".to_string(),
                    date_field: "created_at".to_string(),
                    query_template: template.replace("{name}", "sessions"),
                },
                DatasetSpec {
                    name: "events".to_string(),
                    table: "events_v1".to_string(),
                    date_field: "occurred_at".to_string(),
                    query_template: template.replace("{name}", "events"),
                },
            ],
        }
    }

    fn three_hour_windows() -> Windows {
        Windows::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 3, 0, 0).unwrap(),
            crate::window::StepUnit::Hour,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_three_windows_two_datasets() {
        let source = MockSource::new();
        let warehouse = MockWarehouse::new();
        let staging = StagingStore::memory("staging-test");
        let config = config();
        let windows = three_hour_windows();

        let stats = Pipeline::new(&source, &warehouse, &staging, &config).run(&windows).await.unwrap();

        assert_eq!(stats.windows_total, 3);
        assert_eq!(stats.windows_processed, 3);
        assert_eq!(stats.pairs_processed, 6);
        // One delete per (window, dataset) pair, data or not.
        assert_eq!(warehouse.deletes.lock().unwrap().len(), 6);
        // Loads only for the dataset with rows.
        assert_eq!(stats.loads_succeeded, 3);
        assert_eq!(stats.empty_windows, 3);
        assert_eq!(warehouse.loads.lock().unwrap().len(), 3);
        assert!(warehouse.loads.lock().unwrap().iter().all(|(_, _, table)| table == "sessions_v1"));

        // Deletes cover the expected half-open hourly ranges in order.
        let deletes = warehouse.deletes.lock().unwrap();
        assert!(deletes[0].contains("created_at >= \"2023-01-01T00:00:00.000Z\""));
        assert!(deletes[0].contains("created_at < \"2023-01-01T01:00:00.000Z\""));
        assert!(deletes[4].contains("created_at >= \"2023-01-01T02:00:00.000Z\""));

        // No staged artifact exists for the empty dataset.
        assert!(staging.list("events_regeneration/").await.unwrap().is_empty());
        assert_eq!(staging.list("sessions_regeneration/").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_load_failure_does_not_block_other_datasets_or_windows() {
        let source = MockSource::new();
        let warehouse = MockWarehouse { fail_loads_into: Some("sessions_v1".to_string()), ..MockWarehouse::new() };
        let staging = StagingStore::memory("staging-test");
        let mut config = config();
        // Give "events" rows too so it exercises the load path.
        config.datasets[1].query_template = config.datasets[0].query_template.clone();
        let windows = three_hour_windows();

        let stats = Pipeline::new(&source, &warehouse, &staging, &config).run(&windows).await.unwrap();

        // Every pair still ran: the sessions failures never stopped events
        // in the same window or sessions in later windows.
        assert_eq!(stats.pairs_processed, 6);
        assert_eq!(stats.loads_failed, 3);
        assert_eq!(stats.loads_succeeded, 3);
        assert_eq!(stats.failures.len(), 3);
        assert!(stats.failures.iter().all(|f| f.dataset == "sessions"));
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts_remaining_pairs() {
        let source = MockSource { fail_from_call: Some(2), ..MockSource::new() };
        let warehouse = MockWarehouse::new();
        let staging = StagingStore::memory("staging-test");
        let config = config();
        let windows = three_hour_windows();

        let err = Pipeline::new(&source, &warehouse, &staging, &config).run(&windows).await;

        assert!(matches!(err, Err(RegenError::SourceQuery(_))));
        // The second extraction failed before its delete; nothing after it ran.
        assert_eq!(source.calls(), 2);
        assert_eq!(warehouse.deletes.lock().unwrap().len(), 1);
        assert_eq!(warehouse.loads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0h 00m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
