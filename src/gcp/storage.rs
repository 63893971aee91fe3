/// Staging Storage Module
///
/// Persists serialized payloads to the staging bucket between extraction
/// and warehouse load. Backed by an OpenDAL operator: Google Cloud
/// Storage in production, an in-memory service in tests.
use crate::errors::RegenError;
use opendal::{services, Operator};

pub struct StagingStore {
    operator: Operator,
    bucket: String,
}

impl StagingStore {
    /// Build a store over a Google Cloud Storage bucket. Credentials are
    /// resolved from the ambient service-account configuration.
    pub fn gcs(bucket: &str) -> Result<Self, RegenError> {
        let builder = services::Gcs::default().bucket(bucket);
        let operator = Operator::new(builder)
            .map_err(|e| RegenError::Configuration(format!("failed to build storage operator: {}", e)))?
            .finish();

        Ok(Self { operator, bucket: bucket.to_string() })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn memory(bucket: &str) -> Self {
        let operator = Operator::new(services::Memory::default()).expect("memory operator").finish();
        Self { operator, bucket: bucket.to_string() }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check whether a staged object exists under the given name.
    #[allow(dead_code)]
    pub async fn exists(&self, name: &str) -> Result<bool, RegenError> {
        self.operator.exists(name).await.map_err(|e| RegenError::Staging(e.to_string()))
    }

    /// Upload a payload under the given name. All-or-nothing: any write
    /// failure surfaces as an error and no partial object is considered
    /// valid.
    pub async fn upload(&self, name: &str, content: String) -> Result<(), RegenError> {
        self.operator
            .write(name, content.into_bytes())
            .await
            .map_err(|e| RegenError::Staging(format!("failed to upload [{}]: {}", name, e)))?;

        tracing::debug!("Uploaded staged object [{}]", name);
        Ok(())
    }

    /// Read a staged object back. Used by tests to verify uploads.
    #[cfg(test)]
    pub async fn read(&self, name: &str) -> Result<String, RegenError> {
        let buffer = self.operator.read(name).await.map_err(|e| RegenError::Staging(e.to_string()))?;
        String::from_utf8(buffer.to_vec()).map_err(|e| RegenError::Staging(e.to_string()))
    }

    /// List staged objects under a prefix. Used by tests to audit what a
    /// run produced.
    #[cfg(test)]
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, RegenError> {
        let entries = self.operator.list(prefix).await.map_err(|e| RegenError::Staging(e.to_string()))?;
        Ok(entries.iter().map(|e| e.path().to_string()).collect())
    }
}
