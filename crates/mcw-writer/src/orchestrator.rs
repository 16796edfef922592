//! Submission orchestration
//!
//! [`SubmissionOrchestrator::submit`] pulls chunks from a record source and
//! sends each one either as individual requests or as one batch job. At most
//! `max_in_flight` batch jobs are outstanding at a time; when the ceiling is
//! reached the oldest job is waited on before the next one is submitted.
//! Jobs still in flight after the input ends are drained in submission
//! order.

use crate::api::{BatchStatus, MailchimpApi, Operation};
use crate::error::{Result, WriterError};
use crate::operations::Action;
use crate::poller::BatchPoller;
use crate::record::Record;
use crate::source::AliasMap;
use serde::Deserialize;
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Submission Constants
// ============================================================================

/// Chunks of at most this many records are sent serially in auto mode
pub const DEFAULT_SERIAL_THRESHOLD: usize = 10;

/// Mailchimp runs at most this many batch jobs per account
pub const DEFAULT_MAX_IN_FLIGHT: usize = 500;

/// How chunks are submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SubmissionMode {
    #[serde(rename = "serial")]
    ForceSerial,
    #[serde(rename = "batch")]
    ForceBatch,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl SubmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::ForceSerial => "serial",
            SubmissionMode::ForceBatch => "batch",
            SubmissionMode::Auto => "auto",
        }
    }
}

impl FromStr for SubmissionMode {
    type Err = WriterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serial" => Ok(SubmissionMode::ForceSerial),
            "batch" => Ok(SubmissionMode::ForceBatch),
            "auto" => Ok(SubmissionMode::Auto),
            other => Err(WriterError::config(format!(
                "Invalid mode '{}'. Use 'auto', 'serial' or 'batch'.",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for one orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub mode: SubmissionMode,
    pub serial_threshold: usize,
    pub max_in_flight: usize,
    /// Pause between consecutive serial requests
    pub request_delay: Option<Duration>,
    pub poller: BatchPoller,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            mode: SubmissionMode::Auto,
            serial_threshold: DEFAULT_SERIAL_THRESHOLD,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_delay: None,
            poller: BatchPoller::default(),
        }
    }
}

/// Phase of a submission run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    DrainingInput,
    Submitting,
    AwaitingCompletion,
    Done,
}

/// Outcome of one submission run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReport {
    /// Finished batch jobs in the order they completed
    pub completed: Vec<BatchStatus>,
    /// Local aliases of created resources mapped to their remote ids
    pub created: AliasMap,
    /// Number of records sent as individual requests
    pub serial_requests: usize,
}

impl SubmissionReport {
    /// Fold another run's results into this one
    pub fn merge(&mut self, other: SubmissionReport) {
        self.completed.extend(other.completed);
        self.created.extend(other.created);
        self.serial_requests += other.serial_requests;
    }
}

/// Drives chunks of records to the remote service
pub struct SubmissionOrchestrator<'a, A: ?Sized> {
    api: &'a A,
    settings: SubmissionSettings,
    state: RunState,
}

impl<'a, A> SubmissionOrchestrator<'a, A>
where
    A: MailchimpApi + ?Sized,
{
    pub fn new(api: &'a A, settings: SubmissionSettings) -> Self {
        Self {
            api,
            settings,
            state: RunState::Done,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Submission state changed");
            self.state = next;
        }
    }

    fn use_serial(&self, action: Action, records: usize) -> bool {
        if action.requires_serial() {
            if self.settings.mode == SubmissionMode::ForceBatch {
                warn!(action = %action, "Batch mode not supported for this action, sending serially");
            }
            return true;
        }
        match self.settings.mode {
            SubmissionMode::ForceSerial => true,
            SubmissionMode::ForceBatch => false,
            SubmissionMode::Auto => records <= self.settings.serial_threshold,
        }
    }

    /// Submit every chunk of `chunks` for `action`
    ///
    /// The first error from the input, a serial request, a batch submission
    /// or a poll aborts the run.
    pub async fn submit<I>(&mut self, action: Action, chunks: I) -> Result<SubmissionReport>
    where
        I: IntoIterator<Item = Result<Vec<Record>>>,
    {
        let ceiling = self.settings.max_in_flight.max(1);
        let mut in_flight: VecDeque<String> = VecDeque::new();
        let mut report = SubmissionReport::default();

        self.transition(RunState::DrainingInput);
        for chunk in chunks {
            let operations = chunk?
                .into_iter()
                .map(|record| action.build(record))
                .collect::<Result<Vec<_>>>()?;

            self.transition(RunState::Submitting);
            if self.use_serial(action, operations.len()) {
                self.submit_serial(action, &operations, &mut report).await?;
            } else {
                if in_flight.len() >= ceiling {
                    if let Some(oldest) = in_flight.pop_front() {
                        debug!(batch_id = %oldest, in_flight = in_flight.len() + 1, "In-flight ceiling reached, waiting for oldest batch");
                        let status = self.settings.poller.wait(self.api, &oldest).await?;
                        report.completed.push(status);
                    }
                }
                let batch = self.api.submit_batch(&operations).await?;
                info!(action = %action, batch_id = %batch.id, operations = operations.len(), "Submitted batch");
                in_flight.push_back(batch.id);
            }
            self.transition(RunState::DrainingInput);
        }

        self.transition(RunState::AwaitingCompletion);
        while let Some(batch_id) = in_flight.pop_front() {
            let status = self.settings.poller.wait(self.api, &batch_id).await?;
            report.completed.push(status);
        }
        self.transition(RunState::Done);

        info!(
            action = %action,
            batches = report.completed.len(),
            serial_requests = report.serial_requests,
            created = report.created.len(),
            "Submission finished"
        );
        Ok(report)
    }

    async fn submit_serial(
        &self,
        action: Action,
        operations: &[Operation],
        report: &mut SubmissionReport,
    ) -> Result<()> {
        for operation in operations {
            if report.serial_requests > 0 {
                if let Some(delay) = self.settings.request_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            let response = self.api.execute(operation).await?;
            report.serial_requests += 1;
            debug!(action = %action, operation_id = %operation.operation_id, "Request succeeded");

            if let Some(alias) = &operation.alias {
                let remote_id = response
                    .get("id")
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| {
                        WriterError::transport(
                            None,
                            format!(
                                "Response for '{}' doesn't contain the created resource id",
                                operation.operation_id
                            ),
                        )
                    })?;
                if report
                    .created
                    .insert(alias.clone(), remote_id.to_string())
                    .is_some()
                {
                    warn!(alias = %alias, "Alias defined more than once, keeping the latest id");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakeApi};
    use serde_json::{json, Value};
    use tokio::time::Instant;

    fn members(range: std::ops::Range<usize>) -> Vec<Record> {
        range
            .map(|i| {
                let Value::Object(record) = json!({
                    "email_address": format!("user{}@example.com", i),
                    "list_id": "abc",
                    "subscriber_hash": format!("hash{}", i),
                    "status": "subscribed"
                }) else {
                    unreachable!()
                };
                record
            })
            .collect()
    }

    fn lists(aliases: &[&str]) -> Vec<Record> {
        aliases
            .iter()
            .map(|alias| {
                let Value::Object(record) = json!({"name": format!("List {}", alias), "custom_id": alias})
                else {
                    unreachable!()
                };
                record
            })
            .collect()
    }

    fn settings(mode: SubmissionMode, max_in_flight: usize) -> SubmissionSettings {
        SubmissionSettings {
            mode,
            max_in_flight,
            poller: BatchPoller::new(Duration::from_secs(1)),
            ..SubmissionSettings::default()
        }
    }

    fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_created_lists_build_alias_map() {
        let api = FakeApi::new();
        let mut orchestrator = SubmissionOrchestrator::new(&api, SubmissionSettings::default());

        let report = orchestrator
            .submit(Action::CreateLists, vec![Ok(lists(&["wizards", "muggles"]))])
            .await
            .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.created["wizards"], "remote-List wizards");
        assert_eq!(report.created["muggles"], "remote-List muggles");
        assert!(report.completed.is_empty());
        assert_eq!(orchestrator.state(), RunState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_chunk_is_serial_and_one_more_is_batched() {
        let api = FakeApi::new();
        let mut orchestrator = SubmissionOrchestrator::new(&api, SubmissionSettings::default());
        let report = orchestrator
            .submit(Action::AddMembers, vec![Ok(members(0..DEFAULT_SERIAL_THRESHOLD))])
            .await
            .unwrap();
        let events = api.events();
        assert_eq!(count(&events, |e| matches!(e, Event::Execute(_))), DEFAULT_SERIAL_THRESHOLD);
        assert_eq!(count(&events, |e| matches!(e, Event::Submit { .. })), 0);
        assert_eq!(report.serial_requests, DEFAULT_SERIAL_THRESHOLD);

        let api = FakeApi::new();
        let mut orchestrator = SubmissionOrchestrator::new(&api, SubmissionSettings::default());
        let report = orchestrator
            .submit(Action::AddMembers, vec![Ok(members(0..DEFAULT_SERIAL_THRESHOLD + 1))])
            .await
            .unwrap();
        assert_eq!(
            api.events(),
            vec![
                Event::Submit {
                    batch_id: "b1".into(),
                    operations: DEFAULT_SERIAL_THRESHOLD + 1
                },
                Event::Status("b1".into()),
            ]
        );
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].total_operations, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_ceiling_waits_for_oldest() {
        let api = FakeApi::new();
        let mut orchestrator =
            SubmissionOrchestrator::new(&api, settings(SubmissionMode::ForceBatch, 2));
        let chunks = vec![Ok(members(0..3)), Ok(members(3..6)), Ok(members(6..9))];

        let report = orchestrator.submit(Action::UpdateMembers, chunks).await.unwrap();

        let submit = |id: &str| Event::Submit {
            batch_id: id.into(),
            operations: 3,
        };
        assert_eq!(
            api.events(),
            vec![
                submit("b1"),
                submit("b2"),
                Event::Status("b1".into()),
                submit("b3"),
                Event::Status("b2".into()),
                Event::Status("b3".into()),
            ]
        );
        let ids: Vec<&str> = report.completed.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_batches_drain_fifo_after_polling() {
        let api = FakeApi::new().with_pending_polls(2);
        let mut orchestrator =
            SubmissionOrchestrator::new(&api, settings(SubmissionMode::ForceBatch, 10));
        let started = Instant::now();

        let report = orchestrator
            .submit(Action::AddMembers, vec![Ok(members(0..2)), Ok(members(2..4))])
            .await
            .unwrap();

        let ids: Vec<&str> = report.completed.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        // b1 needs two sleeps, b2 is polled afterwards and needs two more
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_failure_aborts_run() {
        let api = FakeApi::new().failing_on("user1@example.com");
        let mut orchestrator =
            SubmissionOrchestrator::new(&api, settings(SubmissionMode::ForceSerial, 10));

        let err = orchestrator
            .submit(Action::AddMembers, vec![Ok(members(0..3)), Ok(members(3..6))])
            .await
            .unwrap_err();

        assert!(matches!(err, WriterError::Transport { status: Some(400), .. }));
        assert_eq!(
            api.events(),
            vec![
                Event::Execute("user0@example.com".into()),
                Event::Execute("user1@example.com".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_error_before_any_request() {
        let api = FakeApi::new();
        let mut orchestrator = SubmissionOrchestrator::new(&api, SubmissionSettings::default());
        let chunks: Vec<Result<Vec<Record>>> = vec![Err(WriterError::UnknownAlias {
            alias: "muggles".into(),
            column: "custom_list_id".into(),
        })];

        let err = orchestrator.submit(Action::AddMembers, chunks).await.unwrap_err();
        assert!(matches!(err, WriterError::UnknownAlias { .. }));
        assert!(api.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_batch_still_creates_lists_serially() {
        let api = FakeApi::new();
        let mut orchestrator =
            SubmissionOrchestrator::new(&api, settings(SubmissionMode::ForceBatch, 10));
        let many: Vec<String> = (0..20).map(|i| format!("alias{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();

        let report = orchestrator
            .submit(Action::CreateLists, vec![Ok(lists(&refs))])
            .await
            .unwrap();
        assert_eq!(report.created.len(), 20);
        assert_eq!(count(&api.events(), |e| matches!(e, Event::Submit { .. })), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_delay_between_serial_requests() {
        let api = FakeApi::new();
        let mut config = settings(SubmissionMode::ForceSerial, 10);
        config.request_delay = Some(Duration::from_millis(100));
        let mut orchestrator = SubmissionOrchestrator::new(&api, config);
        let started = Instant::now();

        orchestrator
            .submit(Action::DeleteMembers, vec![Ok(members(0..2)), Ok(members(2..3))])
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("serial".parse::<SubmissionMode>().unwrap(), SubmissionMode::ForceSerial);
        assert_eq!(" BATCH ".parse::<SubmissionMode>().unwrap(), SubmissionMode::ForceBatch);
        assert_eq!("auto".parse::<SubmissionMode>().unwrap(), SubmissionMode::Auto);
        assert!("fast".parse::<SubmissionMode>().is_err());
        let mode: SubmissionMode = serde_json::from_value(json!("batch")).unwrap();
        assert_eq!(mode, SubmissionMode::ForceBatch);
    }

    #[test]
    fn test_report_merge() {
        let mut total = SubmissionReport::default();
        total.created.insert("a".into(), "1".into());
        let mut other = SubmissionReport {
            serial_requests: 3,
            ..SubmissionReport::default()
        };
        other.created.insert("b".into(), "2".into());
        total.merge(other);
        assert_eq!(total.created.len(), 2);
        assert_eq!(total.serial_requests, 3);
    }
}
