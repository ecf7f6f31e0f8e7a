use serde::{Deserialize, Serialize};

/// One entry in the configured assistant catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantOption {
    /// Opaque remote identifier (e.g. "asst_...").
    pub id: String,
    /// Short label shown in the selector.
    pub name: String,
    /// Prompt-style description of what the assistant does.
    pub description: String,
}

/// Lifecycle status of a remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// Any terminal status the service may add (cancelled, expired, ...).
    Other(String),
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            other => RunStatus::Other(other.to_string()),
        }
    }

    /// Pending statuses keep the poll loop alive.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Other(s) => s,
        }
    }
}

/// Stages of one exchange, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreateThread,
    PostMessage,
    StartRun,
    Poll,
    Collect,
    Resolve,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::CreateThread => "creating conversation",
            Phase::PostMessage => "posting message",
            Phase::StartRun => "starting run",
            Phase::Poll => "waiting for run",
            Phase::Collect => "collecting reply",
            Phase::Resolve => "resolving citations",
        }
    }
}

/// Progress events emitted by the engine and consumed by CLI layers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    PhaseStarted { phase: Phase },
    PollTick { status: RunStatus },
    Info(String),
}

/// The assistant's raw reply: text plus whatever citation annotations
/// the service attached to it.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub text: String,
    pub annotations: Vec<ReplyAnnotation>,
}

/// A file-citation annotation on a reply. The marker text is present in
/// the richer API variant and absent otherwise.
#[derive(Debug, Clone)]
pub struct ReplyAnnotation {
    pub file_id: String,
    pub marker: Option<String>,
}

/// What one exchange produced: a terminal status and, when the run
/// completed, the assistant's reply (if it posted one).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub conversation_id: String,
    pub run_id: String,
    pub status: RunStatus,
    pub reply: Option<AssistantReply>,
}

/// Reply text after citation resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReply {
    pub text: String,
    pub sources: Vec<String>,
}

impl ResolvedReply {
    /// Render the user-facing result: cleaned text followed by the
    /// deduplicated Sources list, if any.
    pub fn display_text(&self) -> String {
        if self.sources.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\nSources:\n- {}", self.text, self.sources.join("\n- "))
        }
    }
}

/// Final report for one exchange, printed in `--json` mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub assistant_id: String,
    pub assistant_name: String,
    pub status: String,
    pub result: String,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_round_trips_known_values() {
        for s in ["queued", "in_progress", "completed", "failed"] {
            assert_eq!(RunStatus::parse(s).as_str(), s);
        }
        assert_eq!(
            RunStatus::parse("cancelled"),
            RunStatus::Other("cancelled".to_string())
        );
    }

    #[test]
    fn pending_statuses_keep_polling() {
        assert!(RunStatus::Queued.is_pending());
        assert!(RunStatus::InProgress.is_pending());
        assert!(!RunStatus::Completed.is_pending());
        assert!(!RunStatus::Failed.is_pending());
        assert!(!RunStatus::Other("expired".into()).is_pending());
    }

    #[test]
    fn resolved_reply_appends_sources_block() {
        let reply = ResolvedReply {
            text: "Key points".to_string(),
            sources: vec!["minutes.docx".to_string(), "agenda.docx".to_string()],
        };
        assert_eq!(
            reply.display_text(),
            "Key points\n\nSources:\n- minutes.docx\n- agenda.docx"
        );
    }

    #[test]
    fn resolved_reply_without_sources_is_plain_text() {
        let reply = ResolvedReply {
            text: "Key points".to_string(),
            sources: vec![],
        };
        assert_eq!(reply.display_text(), "Key points");
    }
}
