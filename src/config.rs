/// Configuration Module
///
/// Loads the run configuration from a TOML file and assembles it, once,
/// into a validated `RunConfig` before any pipeline step runs: the
/// environment-selected connection profile, the staging bucket, the
/// warehouse dataset, and one spec per dataset type with its query
/// template read from disk and checked for both date placeholders.
use crate::errors::RegenError;
use crate::etl::extract::{END_PLACEHOLDER, INI_PLACEHOLDER};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    sql_dir: String,
    #[serde(default)]
    abort_on_load_failure: bool,
    environments: HashMap<String, EnvironmentProfile>,
    datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnvironmentProfile {
    database_url: String,
    bucket: String,
    project_id: String,
    dataset: String,
}

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    name: String,
    table: String,
    date_field: String,
}

/// Per dataset-type configuration, read-only for the life of a run.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: String,
    pub table: String,
    pub date_field: String,
    pub query_template: String,
}

/// Everything a run needs, validated up front. Dataset order is the
/// declared order in the configuration file and drives the inner
/// pipeline loop.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub environment: String,
    pub database_url: String,
    pub bucket: String,
    pub project_id: String,
    pub dataset: String,
    pub abort_on_load_failure: bool,
    pub datasets: Vec<DatasetSpec>,
}

impl RunConfig {
    /// Load and validate the configuration file. Template paths are
    /// resolved relative to the file's own directory.
    pub fn load(path: &Path, environment: &str) -> Result<Self, RegenError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| RegenError::Configuration(format!("cannot read config file [{}]: {}", path.display(), e)))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Self::from_toml(&raw, environment, base_dir)
    }

    fn from_toml(raw: &str, environment: &str, base_dir: &Path) -> Result<Self, RegenError> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| RegenError::Configuration(format!("invalid config file: {}", e)))?;

        let profile = file
            .environments
            .get(environment)
            .cloned()
            .ok_or_else(|| RegenError::Configuration(format!("environment [{}] not supported", environment)))?;

        if file.datasets.is_empty() {
            return Err(RegenError::Configuration("no datasets configured".to_string()));
        }

        let sql_dir = base_dir.join(&file.sql_dir);
        let mut datasets = Vec::with_capacity(file.datasets.len());
        for entry in file.datasets {
            let template_path = sql_dir.join(format!("{}.sql", entry.name));
            let query_template = fs::read_to_string(&template_path).map_err(|e| {
                RegenError::Configuration(format!(
                    "missing query template for [{}] at [{}]: {}",
                    entry.name,
                    template_path.display(),
                    e
                ))
            })?;

            if !query_template.contains(INI_PLACEHOLDER) || !query_template.contains(END_PLACEHOLDER) {
                return Err(RegenError::Configuration(format!(
                    "query template [{}] must contain both {} and {}",
                    template_path.display(),
                    INI_PLACEHOLDER,
                    END_PLACEHOLDER
                )));
            }

            tracing::info!("Loaded query template for [{}]", entry.name);
            datasets.push(DatasetSpec {
                name: entry.name,
                table: entry.table,
                date_field: entry.date_field,
                query_template,
            });
        }

        Ok(Self {
            environment: environment.to_string(),
            database_url: profile.database_url,
            bucket: profile.bucket,
            project_id: profile.project_id,
            dataset: profile.dataset,
            abort_on_load_failure: file.abort_on_load_failure,
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const CONFIG: &str = r#"
        sql_dir = "sql"

        [environments.test]
        database_url = "postgres://localhost/analytics"
        bucket = "staging-test"
        project_id = "acme-test"
        dataset = "analytics"

        [[datasets]]
        name = "sessions"
        table = "sessions_v1"
        date_field = "created_at"

        [[datasets]]
        name = "events"
        table = "events_v1"
        date_field = "occurred_at"
    "#;

    fn setup(dir_name: &str, templates: &[(&str, &str)]) -> PathBuf {
        let base = std::env::temp_dir().join(format!("regen-config-{}", dir_name));
        let sql = base.join("sql");
        fs::create_dir_all(&sql).unwrap();
        for (name, body) in templates {
            fs::write(sql.join(format!("{}.sql", name)), body).unwrap();
        }
        base
    }

    const TEMPLATE: &str = "select * from t where at >= '#INI_DATE#' and at < '#END_DATE#'";

    #[test]
    fn test_load_assembles_profile_and_ordered_datasets() {
        let base = setup("ok", &[("sessions", TEMPLATE), ("events", TEMPLATE)]);
        let config = RunConfig::from_toml(CONFIG, "test", &base).unwrap();

        assert_eq!(config.bucket, "staging-test");
        assert_eq!(config.dataset, "analytics");
        assert!(!config.abort_on_load_failure);
        let names: Vec<&str> = config.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["sessions", "events"]);
        assert_eq!(config.datasets[1].date_field, "occurred_at");
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let base = setup("env", &[("sessions", TEMPLATE), ("events", TEMPLATE)]);
        let err = RunConfig::from_toml(CONFIG, "production", &base);
        assert!(matches!(err, Err(RegenError::Configuration(_))));
    }

    #[test]
    fn test_missing_template_is_rejected() {
        let base = setup("missing", &[("sessions", TEMPLATE)]);
        let err = RunConfig::from_toml(CONFIG, "test", &base);
        assert!(matches!(err, Err(RegenError::Configuration(_))));
    }

    #[test]
    fn test_template_without_placeholders_is_rejected() {
        let base = setup("placeholder", &[("sessions", TEMPLATE), ("events", "select * from t")]);
        let err = RunConfig::from_toml(CONFIG, "test", &base);
        assert!(matches!(err, Err(RegenError::Configuration(_))));
    }
}
