//! Thin reqwest wrapper over the hosted assistants API.
//!
//! One method per remote operation; no retries and no partial recovery.
//! Failures propagate to the orchestrator boundary as anyhow errors.

use crate::config::AppConfig;
use crate::model::{AssistantReply, ReplyAnnotation, RunStatus};
use anyhow::{Context, Result};
use reqwest::ClientBuilder;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AssistantClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
pub struct MessageObject {
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
pub struct Annotation {
    /// Literal marker substring occurring in the reply, when the service
    /// includes it.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_citation: Option<FileCitation>,
}

#[derive(Debug, Deserialize)]
pub struct FileCitation {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FileObject {
    pub filename: String,
}

impl MessageObject {
    /// The reply carried by this message, flattened to the first text part.
    pub fn reply(&self) -> Option<AssistantReply> {
        let text = self.content.iter().find_map(|p| p.text.as_ref())?;
        let annotations = text
            .annotations
            .iter()
            .filter_map(|a| {
                a.file_citation.as_ref().map(|fc| ReplyAnnotation {
                    file_id: fc.file_id.clone(),
                    marker: a.text.clone(),
                })
            })
            .collect();
        Some(AssistantReply {
            text: text.value.clone(),
            annotations,
        })
    }
}

impl AssistantClient {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .context("no API key configured (set api_key in config or AZURE_OPENAI_API_KEY)")?;
        anyhow::ensure!(!cfg.endpoint.is_empty(), "no service endpoint configured");

        let http = ClientBuilder::new()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version: cfg.api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/openai/{}?api-version={}",
            self.endpoint, path, self.api_version
        )
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            anyhow::bail!("{what} failed with status {status}: {body}");
        }
        Ok(resp)
    }

    /// Create a new conversation thread. No body payload.
    pub async fn create_thread(&self) -> Result<ThreadObject> {
        debug!("creating thread");
        let resp = self
            .http
            .post(self.url("threads"))
            .header("api-key", &self.api_key)
            .json(&json!({}))
            .send()
            .await
            .context("failed to create conversation thread")?;
        Self::check(resp, "thread creation")
            .await?
            .json()
            .await
            .context("failed to parse thread creation response")
    }

    /// Post the input buffer as a single user-role message.
    pub async fn post_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        debug!(thread_id, "posting user message");
        let resp = self
            .http
            .post(self.url(&format!("threads/{thread_id}/messages")))
            .header("api-key", &self.api_key)
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await
            .context("failed to post user message")?;
        Self::check(resp, "message creation").await?;
        Ok(())
    }

    /// Start a run bound to the selected assistant.
    pub async fn start_run(&self, thread_id: &str, assistant_id: &str) -> Result<RunObject> {
        debug!(thread_id, assistant_id, "starting run");
        let resp = self
            .http
            .post(self.url(&format!("threads/{thread_id}/runs")))
            .header("api-key", &self.api_key)
            .json(&json!({ "assistant_id": assistant_id }))
            .send()
            .await
            .context("failed to start run")?;
        Self::check(resp, "run creation")
            .await?
            .json()
            .await
            .context("failed to parse run creation response")
    }

    /// One remote status fetch for an in-flight run.
    pub async fn fetch_run_status(&self, thread_id: &str, run_id: &str) -> Result<RunStatus> {
        let resp = self
            .http
            .get(self.url(&format!("threads/{thread_id}/runs/{run_id}")))
            .header("api-key", &self.api_key)
            .send()
            .await
            .context("failed to fetch run status")?;
        let run: RunObject = Self::check(resp, "run status fetch")
            .await?
            .json()
            .await
            .context("failed to parse run status response")?;
        debug!(run_id, status = %run.status, "run status");
        Ok(RunStatus::parse(&run.status))
    }

    /// List the conversation's messages, most recent first.
    pub async fn list_messages(&self, thread_id: &str) -> Result<MessageList> {
        debug!(thread_id, "listing messages");
        let resp = self
            .http
            .get(self.url(&format!("threads/{thread_id}/messages")))
            .header("api-key", &self.api_key)
            .send()
            .await
            .context("failed to list messages")?;
        Self::check(resp, "message listing")
            .await?
            .json()
            .await
            .context("failed to parse message list response")
    }

    /// Resolve a file id to its metadata.
    pub async fn fetch_file(&self, file_id: &str) -> Result<FileObject> {
        debug!(file_id, "fetching file metadata");
        let resp = self
            .http
            .get(self.url(&format!("files/{file_id}")))
            .header("api-key", &self.api_key)
            .send()
            .await
            .context("failed to fetch file metadata")?;
        Self::check(resp, "file metadata fetch")
            .await?
            .json()
            .await
            .context("failed to parse file metadata response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_list_deserializes_with_annotations() {
        let raw = r#"{
            "data": [
                {
                    "role": "assistant",
                    "content": [
                        {
                            "type": "text",
                            "text": {
                                "value": "Key points 【3:2†source】",
                                "annotations": [
                                    {
                                        "type": "file_citation",
                                        "text": "【3:2†source】",
                                        "file_citation": { "file_id": "file-1" }
                                    }
                                ]
                            }
                        }
                    ]
                },
                { "role": "user", "content": [] }
            ]
        }"#;
        let list: MessageList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.data.len(), 2);
        let reply = list.data[0].reply().unwrap();
        assert!(reply.text.starts_with("Key points"));
        assert_eq!(reply.annotations.len(), 1);
        assert_eq!(reply.annotations[0].file_id, "file-1");
        assert!(reply.annotations[0].marker.is_some());
        assert!(list.data[1].reply().is_none());
    }

    #[test]
    fn annotations_without_citation_are_skipped() {
        let raw = r#"{
            "role": "assistant",
            "content": [
                {
                    "text": {
                        "value": "see page 3",
                        "annotations": [ { "type": "file_path", "text": "x" } ]
                    }
                }
            ]
        }"#;
        let msg: MessageObject = serde_json::from_str(raw).unwrap();
        let reply = msg.reply().unwrap();
        assert!(reply.annotations.is_empty());
    }

    #[test]
    fn run_object_deserializes() {
        let run: RunObject =
            serde_json::from_str(r#"{ "id": "run_1", "status": "queued" }"#).unwrap();
        assert_eq!(run.id, "run_1");
        assert!(RunStatus::parse(&run.status).is_pending());
    }
}
