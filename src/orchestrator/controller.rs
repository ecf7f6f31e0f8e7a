//! Workflow lifecycle controller.
//!
//! State machine: Idle -> Processing -> (Completed | Failed) -> Idle.
//! The busy flag is the sole mutual-exclusion mechanism; exactly one run
//! may be in flight at a time.

use crate::config::AppConfig;
use crate::engine::api::AssistantClient;
use crate::engine::{run_exchange, ExchangeParams};
use crate::model::{
    AssistantOption, ResolvedReply, RunOutcome, RunReport, RunStatus, WorkflowEvent,
};
use crate::orchestrator::resolve;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub const PROCESSING_PLACEHOLDER: &str = "Processing...";
const NO_CONTENT: &str = "No response content available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbenchState {
    Idle,
    Processing,
    Completed,
    Failed,
}

/// Why a process call was refused. Refusal is a no-op: no state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRejection {
    EmptyInput,
    RunInFlight,
    NoAssistantSelected,
}

impl ProcessRejection {
    pub fn message(self) -> &'static str {
        match self {
            ProcessRejection::EmptyInput => "nothing to process: input is empty",
            ProcessRejection::RunInFlight => "a run is already in progress",
            ProcessRejection::NoAssistantSelected => "no assistant selected",
        }
    }
}

/// The one place that owns the UI-bound variables: input buffer, result
/// text, busy flag, selected option, attached file name.
pub struct Workbench {
    client: AssistantClient,
    poll_interval: Duration,
    state: WorkbenchState,
    busy: bool,
    input: String,
    result: String,
    selected: Option<AssistantOption>,
    attached_file: Option<String>,
    last_sources: Vec<String>,
    last_status: Option<RunStatus>,
}

impl Workbench {
    pub fn new(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            client: AssistantClient::new(cfg)?,
            poll_interval: cfg.poll_interval,
            state: WorkbenchState::Idle,
            busy: false,
            input: String::new(),
            result: String::new(),
            selected: None,
            attached_file: None,
            last_sources: Vec::new(),
            last_status: None,
        })
    }

    pub fn state(&self) -> WorkbenchState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn selected(&self) -> Option<&AssistantOption> {
        self.selected.as_ref()
    }

    pub fn attached_file(&self) -> Option<&str> {
        self.attached_file.as_deref()
    }

    /// Changing the selection is allowed in any state; it only affects the
    /// next process call.
    pub fn select(&mut self, option: AssistantOption) {
        self.selected = Some(option);
    }

    /// Append text to the input buffer, blank-line separated.
    pub fn append_input(&mut self, text: &str) {
        crate::extract::append_to_buffer(&mut self.input, text);
    }

    /// Append extracted file text and remember the file's display name.
    pub fn attach(&mut self, file: crate::extract::ExtractedFile) {
        crate::extract::append_to_buffer(&mut self.input, &file.text);
        self.attached_file = Some(file.display_name);
    }

    /// Clear buffer, result, and attached file; return to Idle. Available
    /// in any state.
    pub fn reset(&mut self) {
        self.input.clear();
        self.result.clear();
        self.attached_file = None;
        self.last_sources.clear();
        self.last_status = None;
        self.state = WorkbenchState::Idle;
    }

    fn guard_process(&self) -> Option<ProcessRejection> {
        if self.busy || self.state == WorkbenchState::Processing {
            Some(ProcessRejection::RunInFlight)
        } else if self.input.trim().is_empty() {
            Some(ProcessRejection::EmptyInput)
        } else if self.selected.is_none() {
            Some(ProcessRejection::NoAssistantSelected)
        } else {
            None
        }
    }

    /// Run one exchange end to end. Rejected calls are no-ops; any error
    /// from the pipeline lands in the Failed state with an "Error: ..."
    /// result rather than propagating.
    pub async fn process(
        &mut self,
        event_tx: &mpsc::UnboundedSender<WorkflowEvent>,
    ) -> Result<(), ProcessRejection> {
        if let Some(rejection) = self.guard_process() {
            return Err(rejection);
        }
        let assistant = self.selected.clone().expect("guard checked selection");

        self.busy = true;
        self.state = WorkbenchState::Processing;
        self.result = PROCESSING_PLACEHOLDER.to_string();
        self.last_sources.clear();
        self.last_status = None;
        info!(assistant = %assistant.name, "processing input");

        let outcome = run_exchange(ExchangeParams {
            client: &self.client,
            assistant_id: &assistant.id,
            input: &self.input,
            poll_interval: self.poll_interval,
            event_tx,
        })
        .await;

        match outcome {
            Ok(outcome) => self.finish(outcome, Some(event_tx)).await,
            Err(e) => self.fail(&e),
        }
        self.busy = false;
        Ok(())
    }

    async fn finish(
        &mut self,
        outcome: RunOutcome,
        event_tx: Option<&mpsc::UnboundedSender<WorkflowEvent>>,
    ) {
        info!(
            conversation = %outcome.conversation_id,
            run = %outcome.run_id,
            status = %outcome.status.as_str(),
            "run finished"
        );
        self.last_status = Some(outcome.status.clone());
        match (&outcome.status, outcome.reply) {
            (RunStatus::Completed, Some(reply)) => {
                if let Some(tx) = event_tx {
                    let _ = tx.send(WorkflowEvent::PhaseStarted {
                        phase: crate::model::Phase::Resolve,
                    });
                }
                let resolved = resolve::resolve_citations(&self.client, &reply).await;
                self.complete(resolved);
            }
            (RunStatus::Completed, None) => {
                self.result = NO_CONTENT.to_string();
                self.state = WorkbenchState::Completed;
            }
            (status, _) => {
                // Non-completed terminal status is not an error; report it
                // verbatim as the result text.
                self.result = format!("Run ended with status: {}", status.as_str());
                self.state = WorkbenchState::Completed;
            }
        }
    }

    fn complete(&mut self, resolved: ResolvedReply) {
        self.result = resolved.display_text();
        self.last_sources = resolved.sources;
        self.state = WorkbenchState::Completed;
    }

    fn fail(&mut self, error: &anyhow::Error) {
        self.result = format!("Error: {error:#}");
        self.state = WorkbenchState::Failed;
    }

    /// Snapshot of the last run for `--json` output.
    pub fn report(&self, assistant: &AssistantOption) -> RunReport {
        let timestamp_utc = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());
        RunReport {
            timestamp_utc,
            assistant_id: assistant.id.clone(),
            assistant_name: assistant.name.clone(),
            status: match (&self.state, &self.last_status) {
                (WorkbenchState::Failed, _) => "error".to_string(),
                (_, Some(status)) => status.as_str().to_string(),
                _ => "completed".to_string(),
            },
            result: self.result.clone(),
            sources: self.last_sources.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedFile;

    fn test_config() -> AppConfig {
        AppConfig {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_key: Some("test-key".to_string()),
            ..AppConfig::default()
        }
    }

    fn workbench() -> Workbench {
        Workbench::new(&test_config()).unwrap()
    }

    fn option() -> AssistantOption {
        AssistantOption {
            id: "asst_minutes".to_string(),
            name: "Meeting Minutes".to_string(),
            description: "Summarise meeting minutes".to_string(),
        }
    }

    #[tokio::test]
    async fn process_is_noop_on_empty_input() {
        let mut wb = workbench();
        wb.select(option());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = wb.process(&tx).await.unwrap_err();
        assert_eq!(err, ProcessRejection::EmptyInput);
        assert_eq!(wb.state(), WorkbenchState::Idle);
        assert_eq!(wb.result(), "");
    }

    #[tokio::test]
    async fn process_requires_a_selection() {
        let mut wb = workbench();
        wb.append_input("Summarize this");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = wb.process(&tx).await.unwrap_err();
        assert_eq!(err, ProcessRejection::NoAssistantSelected);
        assert_eq!(wb.state(), WorkbenchState::Idle);
    }

    #[tokio::test]
    async fn process_is_rejected_while_a_run_is_in_flight() {
        let mut wb = workbench();
        wb.select(option());
        wb.append_input("Summarize this");
        wb.busy = true;
        wb.state = WorkbenchState::Processing;
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = wb.process(&tx).await.unwrap_err();
        assert_eq!(err, ProcessRejection::RunInFlight);
    }

    #[test]
    fn reset_returns_to_idle_from_any_state() {
        let mut wb = workbench();
        wb.select(option());
        wb.append_input("text");
        wb.attach(ExtractedFile {
            display_name: "minutes.docx".to_string(),
            text: "extracted".to_string(),
        });
        wb.state = WorkbenchState::Failed;
        wb.result = "Error: boom".to_string();

        wb.reset();
        assert_eq!(wb.state(), WorkbenchState::Idle);
        assert_eq!(wb.input(), "");
        assert_eq!(wb.result(), "");
        assert!(wb.attached_file().is_none());
        // The selection survives reset; it is catalog state, not run state.
        assert!(wb.selected().is_some());
    }

    #[test]
    fn attach_appends_after_typed_text() {
        let mut wb = workbench();
        wb.append_input("Summarize this");
        wb.attach(ExtractedFile {
            display_name: "minutes.docx".to_string(),
            text: "extracted".to_string(),
        });
        assert_eq!(wb.input(), "Summarize this\n\nextracted");
        assert_eq!(wb.attached_file(), Some("minutes.docx"));
    }

    #[tokio::test]
    async fn non_completed_terminal_status_is_reported_verbatim() {
        let mut wb = workbench();
        wb.finish(RunOutcome {
            conversation_id: "thread_1".to_string(),
            run_id: "run_1".to_string(),
            status: RunStatus::Failed,
            reply: None,
        }, None)
        .await;
        assert_eq!(wb.result(), "Run ended with status: failed");
    }

    #[tokio::test]
    async fn completed_run_without_reply_reports_no_content() {
        let mut wb = workbench();
        wb.finish(RunOutcome {
            conversation_id: "thread_1".to_string(),
            run_id: "run_1".to_string(),
            status: RunStatus::Completed,
            reply: None,
        }, None)
        .await;
        assert_eq!(wb.result(), NO_CONTENT);
        assert_eq!(wb.state(), WorkbenchState::Completed);
    }

    #[test]
    fn pipeline_errors_surface_as_error_text() {
        let mut wb = workbench();
        wb.fail(&anyhow::anyhow!("failed to post user message"));
        assert_eq!(wb.state(), WorkbenchState::Failed);
        assert!(wb.result().starts_with("Error: "));
        assert!(wb.result().contains("failed to post user message"));
    }
}
