//! One end-to-end exchange against the assistants API.
//!
//! Explicit sequential pipeline with typed stage outputs:
//! create thread -> post message -> start run -> poll -> collect reply.
//! Citation resolution happens afterwards in the orchestrator.

pub mod api;

use crate::model::{Phase, RunOutcome, RunStatus, WorkflowEvent};
use anyhow::Result;
use api::AssistantClient;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Parameters for one exchange.
pub struct ExchangeParams<'a> {
    pub client: &'a AssistantClient,
    pub assistant_id: &'a str,
    pub input: &'a str,
    /// Fixed interval between run status polls. No backoff, no poll cap.
    pub poll_interval: Duration,
    pub event_tx: &'a mpsc::UnboundedSender<WorkflowEvent>,
}

/// Drive one exchange to a terminal status and collect the assistant's
/// reply when the run completed.
pub async fn run_exchange(params: ExchangeParams<'_>) -> Result<RunOutcome> {
    let ExchangeParams {
        client,
        assistant_id,
        input,
        poll_interval,
        event_tx,
    } = params;

    let _ = event_tx.send(WorkflowEvent::PhaseStarted {
        phase: Phase::CreateThread,
    });
    let thread = client.create_thread().await?;

    let _ = event_tx.send(WorkflowEvent::PhaseStarted {
        phase: Phase::PostMessage,
    });
    client.post_user_message(&thread.id, input).await?;

    let _ = event_tx.send(WorkflowEvent::PhaseStarted {
        phase: Phase::StartRun,
    });
    let run = client.start_run(&thread.id, assistant_id).await?;
    let mut status = RunStatus::parse(&run.status);

    let _ = event_tx.send(WorkflowEvent::PhaseStarted { phase: Phase::Poll });
    let _ = event_tx.send(WorkflowEvent::Info(format!(
        "polling run {} every {}",
        run.id,
        humantime::format_duration(poll_interval)
    )));

    // Fixed-interval poll: one remote fetch per tick, no timeout bound.
    // An indefinitely pending run keeps us here; that is the accepted
    // behavior, not a bug to paper over with a cap.
    while status.is_pending() {
        tokio::time::sleep(poll_interval).await;
        status = client.fetch_run_status(&thread.id, &run.id).await?;
        let _ = event_tx.send(WorkflowEvent::PollTick {
            status: status.clone(),
        });
    }
    info!(run_id = %run.id, status = %status.as_str(), "run reached terminal status");

    let reply = if status == RunStatus::Completed {
        let _ = event_tx.send(WorkflowEvent::PhaseStarted {
            phase: Phase::Collect,
        });
        let messages = client.list_messages(&thread.id).await?;
        pick_assistant_reply(&messages)
    } else {
        None
    };

    Ok(RunOutcome {
        conversation_id: thread.id,
        run_id: run.id,
        status,
        reply,
    })
}

/// Most recent assistant-role message with non-empty content. The message
/// list arrives most recent first.
fn pick_assistant_reply(messages: &api::MessageList) -> Option<crate::model::AssistantReply> {
    messages
        .data
        .iter()
        .filter(|m| m.role == "assistant")
        .find_map(|m| m.reply().filter(|r| !r.text.is_empty()))
}
