//! Documentation lookup by machine id.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use assetlens_core::{DocumentRecord, DocumentationSource};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Static documentation table, mainly for tests and offline demos.
#[derive(Default)]
pub struct InMemoryDocs {
    records: RwLock<HashMap<String, Vec<DocumentRecord>>>,
}

impl InMemoryDocs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, machine_id: impl Into<String>, record: DocumentRecord) {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(machine_id.into())
            .or_default()
            .push(record);
    }
}

#[async_trait]
impl DocumentationSource for InMemoryDocs {
    async fn lookup(&self, machine_id: &str) -> Result<Vec<DocumentRecord>> {
        let records = self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.get(machine_id).cloned().unwrap_or_default())
    }
}

/// Reads the `equipment_documentation` table through a PostgREST-style API.
pub struct RestDocs {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestDocs {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DocumentationSource for RestDocs {
    async fn lookup(&self, machine_id: &str) -> Result<Vec<DocumentRecord>> {
        let url = format!("{}/rest/v1/equipment_documentation", self.base_url);
        let records: Vec<DocumentRecord> = self
            .client
            .get(&url)
            .query(&[
                ("asset_id", format!("eq.{machine_id}")),
                ("select", "title,content,document_type".to_string()),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Documentation request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to parse documentation records")?;
        debug!(machine_id, count = records.len(), "Loaded documentation");
        Ok(records)
    }
}
