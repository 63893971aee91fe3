/// Source Database Module
///
/// Wraps the PostgreSQL source behind the narrow interface the pipeline
/// needs: execute a rendered query and get back column names plus rows in
/// canonical text form. The connection is a process-wide shared resource,
/// acquired once at startup and released exactly once at shutdown.
use crate::errors::RegenError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

/// Result set of one extraction query: ordered field names and rows of
/// canonical text values, in query order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The single operation the pipeline needs from the source database.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn execute(&self, query: &str) -> Result<QueryResult, RegenError>;
}

pub struct SourceDatabase {
    pool: PgPool,
}

impl SourceDatabase {
    /// Connect to the source database. The pool is capped at a single
    /// connection: the source is a shared, rate-limited resource and the
    /// pipeline is strictly sequential.
    pub async fn connect(database_url: &str) -> Result<Self, RegenError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| RegenError::Configuration(format!("failed to connect to source database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<(), RegenError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RegenError::Configuration(format!("source connection test failed: {}", e)))?;

        Ok(())
    }

    /// Release the connection. Called exactly once at shutdown, whatever
    /// the run outcome was.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SourceClient for SourceDatabase {
    async fn execute(&self, query: &str) -> Result<QueryResult, RegenError> {
        let rows: Vec<PgRow> = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RegenError::SourceQuery(e.to_string()))?;

        let fields = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };

        let mut text_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(row.columns().len());
            for idx in 0..row.columns().len() {
                values.push(decode_column(row, idx)?);
            }
            text_rows.push(values);
        }

        Ok(QueryResult { fields, rows: text_rows })
    }
}

/// Decode one column to its canonical textual representation. NULL maps
/// to the empty string; timestamps render as ISO-8601 with milliseconds
/// so payload values match the window bound format. No locale-sensitive
/// formatting anywhere.
fn decode_column(row: &PgRow, idx: usize) -> Result<String, RegenError> {
    let column = &row.columns()[idx];
    let type_name = column.type_info().name();

    let decode_err =
        |e: sqlx::Error| RegenError::SourceQuery(format!("failed to decode column [{}]: {}", column.name(), e));

    let text = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(idx).map_err(decode_err)?,
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map_err(decode_err)?
            .map(|v| v.to_rfc3339_opts(SecondsFormat::Millis, true)),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map_err(decode_err)?
            .map(|v| v.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx).map_err(decode_err)?.map(|v| v.to_string()),
        "JSON" | "JSONB" => {
            row.try_get::<Option<serde_json::Value>, _>(idx).map_err(decode_err)?.map(|v| v.to_string())
        }
        other => {
            return Err(RegenError::SourceQuery(format!(
                "unsupported column type [{}] for column [{}]",
                other,
                column.name()
            )))
        }
    };

    Ok(text.unwrap_or_default())
}
