//! In-memory [`MailchimpApi`] for unit tests
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::api::{BatchState, BatchStatus, MailchimpApi, Operation};
use crate::error::{Result, WriterError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// One call seen by [`FakeApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Verify,
    Execute(String),
    Submit { batch_id: String, operations: usize },
    Status(String),
}

#[derive(Default)]
struct Batch {
    total: u64,
    polls: usize,
}

/// Records every call and answers like a well-behaved remote service
///
/// Each batch reports `pending` for `pending_polls` status calls, then
/// `finished`. Executed operations echo back `{"id": "remote-<operation_id>"}`.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub pending_polls: usize,
    pub fail_operation: Option<String>,
    events: Mutex<Vec<Event>>,
    batches: Mutex<HashMap<String, Batch>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn failing_on(mut self, operation_id: &str) -> Self {
        self.fail_operation = Some(operation_id.to_string());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

fn status(id: &str, state: BatchState, total: u64) -> BatchStatus {
    let finished = state.is_finished();
    BatchStatus {
        id: id.to_string(),
        status: state,
        total_operations: total,
        finished_operations: if finished { total } else { 0 },
        errored_operations: 0,
        submitted_at: None,
        completed_at: None,
        response_body_url: if finished {
            format!("https://example.com/{}.tar.gz", id)
        } else {
            String::new()
        },
    }
}

#[async_trait]
impl MailchimpApi for FakeApi {
    async fn verify_credentials(&self) -> Result<()> {
        self.record(Event::Verify);
        Ok(())
    }

    async fn execute(&self, operation: &Operation) -> Result<Value> {
        self.record(Event::Execute(operation.operation_id.clone()));
        if self.fail_operation.as_deref() == Some(operation.operation_id.as_str()) {
            return Err(WriterError::transport(Some(400), "Invalid Resource"));
        }
        Ok(json!({"id": format!("remote-{}", operation.operation_id)}))
    }

    async fn submit_batch(&self, operations: &[Operation]) -> Result<BatchStatus> {
        let mut batches = self.batches.lock().unwrap();
        let batch_id = format!("b{}", batches.len() + 1);
        batches.insert(
            batch_id.clone(),
            Batch {
                total: operations.len() as u64,
                polls: 0,
            },
        );
        drop(batches);

        self.record(Event::Submit {
            batch_id: batch_id.clone(),
            operations: operations.len(),
        });
        Ok(status(&batch_id, BatchState::Pending, operations.len() as u64))
    }

    async fn batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        self.record(Event::Status(batch_id.to_string()));
        let mut batches = self.batches.lock().unwrap();
        let batch = batches
            .get_mut(batch_id)
            .ok_or_else(|| WriterError::transport(Some(404), "Resource Not Found"))?;
        batch.polls += 1;
        let state = if batch.polls > self.pending_polls {
            BatchState::Finished
        } else {
            BatchState::Started
        };
        Ok(status(batch_id, state, batch.total))
    }
}
