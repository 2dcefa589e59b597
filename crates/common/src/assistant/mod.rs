//! Chat-with-data: natural-language questions answered by an external
//! text-to-SQL service
//!
//! The service either answers with data or hands back SQL. Returned SQL is
//! only run after `guard::vet_read_only` accepts it, inside a read-only
//! transaction with a row cap.

pub mod guard;

use crate::config::AssistantConfig;
use crate::db::Store;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Reply from the text-to-SQL service, passed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub sql: Option<String>,

    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Any other fields the service sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Text-to-SQL service client
#[async_trait]
pub trait SqlAssistant: Send + Sync {
    async fn ask(&self, question: &str) -> Result<AssistantReply>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

/// HTTP client for a Vanna-style `/query` endpoint
pub struct HttpSqlAssistant {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSqlAssistant {
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "assistant.base_url is not set".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SqlAssistant for HttpSqlAssistant {
    async fn ask(&self, question: &str) -> Result<AssistantReply> {
        let mut request = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&QueryRequest { question });

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                service: "text-to-sql".to_string(),
                message: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string(),
            });
        }

        Ok(response.json::<AssistantReply>().await?)
    }
}

/// Orchestrates a question: ask, then optionally run the returned SQL
pub struct ChatService {
    assistant: Arc<dyn SqlAssistant>,
    store: Arc<dyn Store>,
    execute_sql: bool,
    max_rows: usize,
}

impl ChatService {
    pub fn new(
        assistant: Arc<dyn SqlAssistant>,
        store: Arc<dyn Store>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            assistant,
            store,
            execute_sql: config.execute_returned_sql,
            max_rows: config.max_rows,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<AssistantReply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::validation("question", "question must not be empty"));
        }

        let start = Instant::now();
        let reply = match self.assistant.ask(question).await {
            Ok(reply) => reply,
            Err(e) => {
                metrics::record_assistant(start.elapsed().as_secs_f64(), "upstream_error");
                return Err(e);
            }
        };

        let (reply, outcome) = self.complete(reply).await;
        metrics::record_assistant(start.elapsed().as_secs_f64(), outcome);
        info!(outcome, "Chat question answered");
        Ok(reply)
    }

    async fn complete(&self, mut reply: AssistantReply) -> (AssistantReply, &'static str) {
        let runnable = reply.data.is_none() && self.execute_sql;
        let sql = match reply.sql.clone() {
            Some(sql) if runnable => sql,
            _ => return (reply, "passthrough"),
        };

        let statement = match guard::vet_read_only(&sql) {
            Ok(statement) => statement,
            Err(e) => {
                warn!(error = %e, sql = %sql, "Refused assistant SQL");
                reply.error = Some(e.to_string());
                return (reply, "refused");
            }
        };

        match self.store.run_read_only(&statement, self.max_rows).await {
            Ok(rows) => {
                reply.data = Some(Value::Array(rows));
                (reply, "executed")
            }
            Err(e) => {
                warn!(error = %e, sql = %sql, "Assistant SQL failed");
                reply.error = Some(e.to_string());
                (reply, "failed")
            }
        }
    }
}
