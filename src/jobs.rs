/// Background completion jobs.
///
/// Each dispatch runs on its own tokio task and reports back through one
/// shared unbounded channel. The UI drains that channel once per tick; only
/// the drain ever touches the `Document`.
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::instrument::WithSubscriber;

use crate::agents::{AgentPrompts, AgentRequest, OperationKind};
use crate::client::{Completer, Prompt};
use crate::document::Document;
use crate::logging::LogContext;

// ── JobResult ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub passage_id: String,
    pub kind: OperationKind,
    pub success: bool,
    pub text: String,
    pub model: String,
    pub error: Option<String>,
}

impl JobResult {
    fn failed(passage_id: String, kind: OperationKind, error: String) -> Self {
        Self {
            passage_id,
            kind,
            success: false,
            text: String::new(),
            model: String::new(),
            error: Some(error),
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, PartialEq)]
pub struct Drained {
    pub applied: usize,
    /// Status line for the most recent result, if any arrived.
    pub status: Option<String>,
}

// ── JobDispatcher ─────────────────────────────────────────────────────────────

pub struct JobDispatcher {
    completer: Arc<dyn Completer>,
    prompts: AgentPrompts,
    temperature: f32,
    log: LogContext,
    tx: mpsc::UnboundedSender<JobResult>,
    rx: mpsc::UnboundedReceiver<JobResult>,
    in_flight: usize,
}

impl JobDispatcher {
    pub fn new(
        completer: Arc<dyn Completer>,
        prompts: AgentPrompts,
        temperature: f32,
        log: LogContext,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            completer,
            prompts,
            temperature,
            log,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Start a job and return immediately. Exactly one `JobResult` is sent
    /// for it, whether the completion succeeds, fails or panics.
    pub fn dispatch(&mut self, request: AgentRequest) {
        let prompt = self.log.scope(|| Prompt {
            system: self.prompts.system_for(&request),
            user: request.user_prompt(),
            max_tokens: request.max_tokens,
            temperature: self.temperature,
        });
        let passage_id = request.passage_id;
        let kind = request.kind;
        let completer = Arc::clone(&self.completer);
        let tx = self.tx.clone();
        let dispatch = self.log.dispatch().clone();

        self.log.scope(|| {
            tracing::info!(passage = %passage_id, op = kind.label(), "dispatching job");
        });

        let job = async move {
            // Inner task so a panicking completer surfaces as a JoinError.
            let worker = tokio::spawn(
                async move { completer.complete(prompt).await }.with_subscriber(dispatch),
            );
            let result = match worker.await {
                Ok(Ok(c)) if !c.text.trim().is_empty() => JobResult {
                    passage_id,
                    kind,
                    success: true,
                    text: c.text.trim().to_string(),
                    model: c.model,
                    error: None,
                },
                Ok(Ok(_)) => JobResult::failed(passage_id, kind, "empty response".into()),
                Ok(Err(e)) => JobResult::failed(passage_id, kind, format!("{e:#}")),
                Err(e) => JobResult::failed(passage_id, kind, format!("worker crashed: {e}")),
            };
            if let Some(err) = &result.error {
                tracing::warn!(passage = %result.passage_id, op = kind.label(), error = %err, "job failed");
            } else {
                tracing::info!(passage = %result.passage_id, op = kind.label(), model = %result.model, "job finished");
            }
            // Receiver gone means the editor quit; the result is abandoned.
            let _ = tx.send(result);
        };
        tokio::spawn(job.with_subscriber(self.log.dispatch().clone()));
        self.in_flight += 1;
    }

    /// Apply every result that has already arrived. Never waits.
    pub fn drain_and_apply(&mut self, doc: &mut Document) -> Drained {
        let mut drained = Drained::default();
        while let Ok(result) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            drained.status = Some(self.log.scope(|| apply(doc, &result)));
            drained.applied += 1;
        }
        drained
    }
}

/// Fold one result into the document and describe what happened.
fn apply(doc: &mut Document, result: &JobResult) -> String {
    let Some(passage) = doc.passage_by_id(&result.passage_id) else {
        tracing::warn!(passage = %result.passage_id, "result for a deleted passage dropped");
        return "Result for a deleted passage was dropped".to_string();
    };
    let error = result.error.as_deref().unwrap_or("unknown error");

    if passage.pending {
        if result.success {
            doc.complete_pending_passage(&result.passage_id, &result.text, &result.model);
            "Passage ready".to_string()
        } else {
            doc.fail_pending_passage(&result.passage_id, error);
            format!("Error: {error}")
        }
    } else if result.success {
        doc.update_text(
            &result.passage_id,
            &result.text,
            result.kind.label(),
            Some(&result.model),
        );
        format!("{} applied", result.kind.title())
    } else {
        format!("{} failed: {error}", result.kind.title())
    }
}
