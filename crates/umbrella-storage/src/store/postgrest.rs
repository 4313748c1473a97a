//! Remote table store speaking the PostgREST dialect (Supabase).
//!
//! The `students` and `history` tables are addressed under `/rest/v1`.
//! Conditional writes map onto PostgREST filters: insert-if-absent uses
//! `on_conflict` with `resolution=ignore-duplicates`, and
//! update-if-unchanged adds a `status=eq.<expected>` filter. Both ask for
//! `return=representation`, so an empty result array means the condition
//! did not hold.
//!
//! Remote tables manage their own audit columns, so only `student_id`
//! and `status` are written to `students`.

use super::StatusStore;
use crate::error::{StorageError, StorageResult};
use crate::models::{HistoryRecord, StudentRecord};
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};
use umbrella_core::{Action, StudentId, UmbrellaStatus};

const RETURN_REPRESENTATION: &str = "return=representation";
const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=representation";

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,

    /// Service or anon key, sent as `apikey` and bearer token.
    pub api_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl SupabaseConfig {
    /// Create a configuration with the default 10 second timeout.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that both URL and key are present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] naming the missing setting.
    pub fn validate(&self) -> StorageResult<()> {
        if self.url.trim().is_empty() {
            return Err(StorageError::Configuration(
                "SUPABASE_URL must be set".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(StorageError::Configuration(
                "SUPABASE_KEY must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// PostgREST implementation of [`StatusStore`].
#[derive(Debug, Clone)]
pub struct PostgrestStatusStore {
    client: reqwest::Client,
    rest_url: String,
}

impl PostgrestStatusStore {
    /// Build a client for the given project.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL or key is missing or the key
    /// is not a valid header value.
    pub fn new(config: SupabaseConfig) -> StorageResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|e| StorageError::Configuration(format!("Invalid Supabase key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
            .map_err(|e| StorageError::Configuration(format!("Invalid Supabase key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.url.trim().trim_end_matches('/')),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.rest_url, name)
    }

    /// Undo a status write whose history entry failed. Only touches the row
    /// if it still holds the status written.
    async fn revert_status(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        written: UmbrellaStatus,
    ) -> StorageResult<()> {
        match prior {
            Some(prior) => {
                self.update_status(student_id, written, prior, Utc::now()).await?;
            }
            None => {
                let response = self
                    .client
                    .delete(self.table("students"))
                    .query(&[
                        ("student_id", eq(student_id.as_str())),
                        ("status", eq(written.as_str())),
                    ])
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(StorageError::Api {
                        status: status.as_u16(),
                        body: response.text().await?,
                    });
                }
            }
        }
        Ok(())
    }
}

async fn rows<T: DeserializeOwned>(response: reqwest::Response) -> StorageResult<Vec<T>> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(StorageError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

impl StatusStore for PostgrestStatusStore {
    async fn find_student(&self, student_id: &StudentId) -> StorageResult<Option<StudentRecord>> {
        let response = self
            .client
            .get(self.table("students"))
            .query(&[("select", "*".to_string()), ("student_id", eq(student_id.as_str()))])
            .send()
            .await?;

        let students: Vec<StudentRecord> = rows(response).await?;
        Ok(students.into_iter().next())
    }

    async fn insert_student(
        &self,
        student_id: &StudentId,
        status: UmbrellaStatus,
        _at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let response = self
            .client
            .post(self.table("students"))
            .query(&[("on_conflict", "student_id")])
            .header("Prefer", IGNORE_DUPLICATES)
            .json(&json!({
                "student_id": student_id.as_str(),
                "status": status.as_str(),
            }))
            .send()
            .await?;

        let inserted: Vec<StudentRecord> = rows(response).await?;
        Ok(!inserted.is_empty())
    }

    async fn update_status(
        &self,
        student_id: &StudentId,
        expected: UmbrellaStatus,
        status: UmbrellaStatus,
        _at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let response = self
            .client
            .patch(self.table("students"))
            .query(&[
                ("student_id", eq(student_id.as_str())),
                ("status", eq(expected.as_str())),
            ])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&json!({ "status": status.as_str() }))
            .send()
            .await?;

        let updated: Vec<StudentRecord> = rows(response).await?;
        Ok(!updated.is_empty())
    }

    async fn append_history(
        &self,
        student_id: &StudentId,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<HistoryRecord> {
        let response = self
            .client
            .post(self.table("history"))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&json!({
                "student_id": student_id.as_str(),
                "action": action.as_str(),
                "timestamp": at.to_rfc3339(),
            }))
            .send()
            .await?;

        let inserted: Vec<HistoryRecord> = rows(response).await?;
        inserted.into_iter().next().ok_or_else(|| {
            StorageError::Serialization("history insert returned no row".to_string())
        })
    }

    async fn record_transition(
        &self,
        student_id: &StudentId,
        prior: Option<UmbrellaStatus>,
        action: Action,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<HistoryRecord>> {
        let target = action.resulting_status();
        let written = match prior {
            None => self.insert_student(student_id, target, at).await?,
            Some(expected) => self.update_status(student_id, expected, target, at).await?,
        };
        if !written {
            return Ok(None);
        }

        match self.append_history(student_id, action, at).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(
                    student_id = %student_id,
                    error = %e,
                    "history insert failed, reverting status"
                );
                if let Err(undo) = self.revert_status(student_id, prior, target).await {
                    error!(student_id = %student_id, error = %undo, "status revert failed");
                }
                Err(e)
            }
        }
    }

    async fn history_for_student(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> StorageResult<Vec<HistoryRecord>> {
        let response = self
            .client
            .get(self.table("history"))
            .query(&[
                ("select", "*".to_string()),
                ("student_id", eq(student_id.as_str())),
                ("order", "timestamp.desc,id.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        rows(response).await
    }

    async fn recent_history(&self, limit: u32) -> StorageResult<Vec<HistoryRecord>> {
        let response = self
            .client
            .get(self.table("history"))
            .query(&[
                ("select", "*".to_string()),
                ("order", "timestamp.desc,id.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        rows(response).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        let response = self
            .client
            .get(self.table("students"))
            .query(&[("select", "student_id"), ("limit", "1")])
            .send()
            .await?;

        let _: Vec<serde_json::Value> = rows(response).await?;
        Ok(())
    }
}
