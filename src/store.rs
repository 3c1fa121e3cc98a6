//! In-memory view of one collection with optimistic local edits.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::datasets::Dataset;
use crate::error::FetchError;
use crate::source::{RecordSource, WriteOutcome, WriteRequest};

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Transform<T> = Box<dyn Fn(&T) -> T + Send + Sync>;

struct Edit<T> {
    id: u64,
    predicate: Predicate<T>,
    transform: Transform<T>,
}

impl<T: Clone> Edit<T> {
    fn apply(&self, records: &mut [T]) -> usize {
        let mut changed = 0;
        for record in records.iter_mut() {
            if (self.predicate)(record) {
                *record = (self.transform)(record);
                changed += 1;
            }
        }
        changed
    }
}

/// Issued by [`RecordStore::begin_refetch`]. Only the newest ticket applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefetchTicket {
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefetchOutcome {
    Applied { count: usize },
    /// The read failed; the last-known-good collection is kept.
    Failed,
    /// A newer refetch was started before this one finished.
    Stale,
    Cancelled,
}

/// An optimistic edit waiting for its write outcome.
#[must_use = "a pending mutation must be settled"]
#[derive(Debug)]
pub struct PendingMutation {
    id: u64,
    pub changed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

pub struct RecordStore<D: Dataset> {
    source: Arc<dyn RecordSource>,
    dataset: D,
    base: Vec<D::Record>,
    current: Vec<D::Record>,
    edits: Vec<Edit<D::Record>>,
    next_edit: u64,
    issued: u64,
    closed: bool,
    notices: Vec<Notice>,
}

impl<D: Dataset> RecordStore<D> {
    pub fn new(source: Arc<dyn RecordSource>, dataset: D) -> Self {
        Self {
            source,
            dataset,
            base: Vec::new(),
            current: Vec::new(),
            edits: Vec::new(),
            next_edit: 0,
            issued: 0,
            closed: false,
            notices: Vec::new(),
        }
    }

    pub fn current(&self) -> &[D::Record] {
        &self.current
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn begin_refetch(&mut self) -> RefetchTicket {
        self.issued += 1;
        RefetchTicket { seq: self.issued }
    }

    /// Applies a finished read if it belongs to the newest ticket.
    pub fn finish_refetch(
        &mut self,
        ticket: RefetchTicket,
        result: Result<Vec<D::Record>, FetchError>,
    ) -> RefetchOutcome {
        if self.closed {
            debug!(
                dataset = self.dataset.name(),
                seq = ticket.seq,
                "store closed, dropping response"
            );
            return RefetchOutcome::Cancelled;
        }
        if ticket.seq != self.issued {
            debug!(
                dataset = self.dataset.name(),
                seq = ticket.seq,
                newest = self.issued,
                "discarding stale response"
            );
            return RefetchOutcome::Stale;
        }

        match result {
            Ok(records) => {
                self.base = records;
                self.rebuild();
                debug!(
                    dataset = self.dataset.name(),
                    count = self.current.len(),
                    "refetch applied"
                );
                RefetchOutcome::Applied {
                    count: self.current.len(),
                }
            }
            Err(err) => {
                warn!(
                    dataset = self.dataset.name(),
                    error = %err,
                    "refetch failed, keeping last known records"
                );
                self.notices.push(Notice::Error(format!(
                    "Could not load {}: {err}",
                    self.dataset.name()
                )));
                RefetchOutcome::Failed
            }
        }
    }

    pub async fn refetch(&mut self) -> RefetchOutcome {
        let ticket = self.begin_refetch();
        let result = self.dataset.load(self.source.as_ref()).await;
        self.finish_refetch(ticket, result)
    }

    /// Edits matching records in place before any write is sent.
    pub fn apply_local(
        &mut self,
        predicate: impl Fn(&D::Record) -> bool + Send + Sync + 'static,
        transform: impl Fn(&D::Record) -> D::Record + Send + Sync + 'static,
    ) -> PendingMutation {
        self.next_edit += 1;
        let edit = Edit {
            id: self.next_edit,
            predicate: Box::new(predicate),
            transform: Box::new(transform),
        };
        let changed = edit.apply(&mut self.current);
        self.edits.push(edit);
        PendingMutation {
            id: self.next_edit,
            changed,
        }
    }

    /// Resolves an edit. A rejected edit is rolled back; anything else is
    /// assumed to have landed until the next refetch says otherwise.
    pub fn settle(&mut self, pending: PendingMutation, outcome: &WriteOutcome) {
        let Some(position) = self.edits.iter().position(|edit| edit.id == pending.id) else {
            return;
        };
        let edit = self.edits.remove(position);

        match outcome {
            WriteOutcome::Rejected { reason } => {
                warn!(dataset = self.dataset.name(), %reason, "write rejected, rolling back");
                self.notices.push(Notice::Error(format!("Change was not saved: {reason}")));
                self.rebuild();
            }
            WriteOutcome::Accepted | WriteOutcome::Unknown => {
                edit.apply(&mut self.base);
            }
        }
    }

    pub async fn commit(
        &mut self,
        pending: PendingMutation,
        request: &WriteRequest,
    ) -> WriteOutcome {
        let outcome = self.source.write(request).await;
        self.settle(pending, &outcome);
        outcome
    }

    /// Drops matching records immediately. A rejected delete cannot be
    /// undone piecemeal, so it triggers a full refetch instead.
    pub async fn remove(
        &mut self,
        predicate: impl Fn(&D::Record) -> bool,
        request: &WriteRequest,
    ) -> WriteOutcome {
        self.current.retain(|record| !predicate(record));
        self.base.retain(|record| !predicate(record));

        let outcome = self.source.write(request).await;
        if let WriteOutcome::Rejected { reason } = &outcome {
            warn!(dataset = self.dataset.name(), %reason, "delete rejected, refetching");
            self.notices.push(Notice::Error(format!("Delete failed: {reason}")));
            self.refetch().await;
        }
        outcome
    }

    /// Waits out the write window, then rereads the ground truth.
    pub async fn reconcile_after(&mut self, delay: Duration) -> RefetchOutcome {
        tokio::time::sleep(delay).await;
        let outcome = self.refetch().await;
        if let RefetchOutcome::Applied { count } = outcome {
            info!(dataset = self.dataset.name(), count, "reconciled with record service");
            self.notices.push(Notice::Info(format!("Synced {count} {}", self.dataset.name())));
        }
        outcome
    }

    /// Tears the view down. Responses still in flight are discarded.
    pub fn close(&mut self) {
        self.closed = true;
        self.base.clear();
        self.current.clear();
        self.edits.clear();
    }

    fn rebuild(&mut self) {
        self.current = self.base.clone();
        for edit in &self.edits {
            edit.apply(&mut self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{EnrollmentDataset, TaskDataset};
    use crate::models::{EnrollmentView, Task, TaskStatus, APPROVED};
    use crate::source::fake::FakeSource;
    use crate::source::Resource;
    use serde_json::json;

    fn seeded() -> Arc<FakeSource> {
        let source = Arc::new(FakeSource::new());
        source.set(
            Resource::Students,
            vec![
                json!({ "email": "avery@example.com", "name": "Avery", "status": "Pending" }),
                json!({ "email": "jules@example.com", "name": "Jules", "status": "Pending" }),
                json!({ "email": "kiara@example.com", "name": "Kiara", "status": "Pending" }),
            ],
        );
        source.set(Resource::Payments, vec![]);
        source
    }

    async fn loaded(source: &Arc<FakeSource>) -> RecordStore<EnrollmentDataset> {
        let mut store = RecordStore::new(source.clone(), EnrollmentDataset);
        assert_eq!(store.refetch().await, RefetchOutcome::Applied { count: 3 });
        store
    }

    fn approve(
        email: &'static str,
    ) -> (
        impl Fn(&EnrollmentView) -> bool,
        impl Fn(&EnrollmentView) -> EnrollmentView,
    ) {
        (
            move |view: &EnrollmentView| view.email == email,
            |view: &EnrollmentView| EnrollmentView {
                status: APPROVED.to_string(),
                ..view.clone()
            },
        )
    }

    fn status_request(email: &str) -> WriteRequest {
        WriteRequest::new("updateStatus")
            .field("email", email)
            .field("status", APPROVED)
    }

    #[tokio::test]
    async fn rejected_write_restores_snapshot() {
        let source = seeded();
        let mut store = loaded(&source).await;
        let snapshot = store.current().to_vec();

        let (predicate, transform) = approve("jules@example.com");
        let pending = store.apply_local(predicate, transform);
        assert_eq!(pending.changed, 1);
        assert_eq!(store.current()[1].status, APPROVED);
        assert_eq!(store.current()[0].status, "Pending");

        source.next_write(WriteOutcome::Rejected {
            reason: "network down".to_string(),
        });
        let outcome = store.commit(pending, &status_request("jules@example.com")).await;

        assert!(outcome.is_rejected());
        assert_eq!(store.current(), snapshot.as_slice());
        assert!(matches!(store.take_notices().as_slice(), [Notice::Error(_)]));
    }

    #[tokio::test]
    async fn unknown_write_keeps_edit_until_reconciled() {
        let source = seeded();
        let mut store = loaded(&source).await;

        let (predicate, transform) = approve("avery@example.com");
        let pending = store.apply_local(predicate, transform);
        let outcome = store.commit(pending, &status_request("avery@example.com")).await;

        assert_eq!(outcome, WriteOutcome::Unknown);
        assert_eq!(store.current()[0].status, APPROVED);
        assert_eq!(source.writes().len(), 1);
        assert_eq!(source.writes()[0].body()["action"], "updateStatus");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_refetch_converges_to_service_state() {
        let source = seeded();
        let mut store = loaded(&source).await;
        let fetches_before = source.fetch_count();

        let (predicate, transform) = approve("kiara@example.com");
        let pending = store.apply_local(predicate, transform);
        store.commit(pending, &status_request("kiara@example.com")).await;

        // The service applied the write and someone else approved Avery meanwhile.
        source.set(
            Resource::Students,
            vec![
                json!({ "email": "avery@example.com", "name": "Avery", "status": "Approved" }),
                json!({ "email": "jules@example.com", "name": "Jules", "status": "Pending" }),
                json!({ "email": "kiara@example.com", "name": "Kiara", "status": "Approved" }),
            ],
        );
        assert_eq!(store.current()[0].status, "Pending");

        let start = tokio::time::Instant::now();
        let outcome = store.reconcile_after(Duration::from_millis(1500)).await;

        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert_eq!(outcome, RefetchOutcome::Applied { count: 3 });
        assert!(source.fetch_count() > fetches_before);
        let statuses: Vec<&str> = store.current().iter().map(|v| v.status.as_str()).collect();
        assert_eq!(statuses, ["Approved", "Pending", "Approved"]);
    }

    #[tokio::test(start_paused = true)]
    async fn silently_dropped_write_is_corrected_by_reconciliation() {
        let source = seeded();
        let mut store = loaded(&source).await;

        let (predicate, transform) = approve("jules@example.com");
        let pending = store.apply_local(predicate, transform);
        store.commit(pending, &status_request("jules@example.com")).await;
        assert_eq!(store.current()[1].status, APPROVED);

        store.reconcile_after(Duration::from_millis(1500)).await;
        assert_eq!(store.current()[1].status, "Pending");
    }

    #[tokio::test]
    async fn newest_refetch_wins_over_late_response() {
        let source = seeded();
        let mut store = RecordStore::new(source.clone(), EnrollmentDataset);

        let first = store.begin_refetch();
        let first_result = EnrollmentDataset.load(source.as_ref()).await;

        source.set(
            Resource::Students,
            vec![json!({ "email": "new@example.com", "name": "Newcomer" })],
        );
        let second = store.begin_refetch();
        let second_result = EnrollmentDataset.load(source.as_ref()).await;

        assert_eq!(
            store.finish_refetch(second, second_result),
            RefetchOutcome::Applied { count: 1 }
        );
        assert_eq!(store.finish_refetch(first, first_result), RefetchOutcome::Stale);
        assert_eq!(store.current().len(), 1);
        assert_eq!(store.current()[0].name, "Newcomer");
    }

    #[tokio::test]
    async fn failed_refetch_keeps_last_known_good() {
        let source = seeded();
        let mut store = loaded(&source).await;

        source.fail(Resource::Students);
        assert_eq!(store.refetch().await, RefetchOutcome::Failed);
        assert_eq!(store.current().len(), 3);
        assert!(matches!(store.take_notices().as_slice(), [Notice::Error(_)]));

        source.recover();
        assert_eq!(store.refetch().await, RefetchOutcome::Applied { count: 3 });
    }

    #[tokio::test]
    async fn refetch_keeps_unsettled_edits() {
        let source = seeded();
        let mut store = loaded(&source).await;

        let (predicate, transform) = approve("avery@example.com");
        let pending = store.apply_local(predicate, transform);
        store.refetch().await;
        assert_eq!(store.current()[0].status, APPROVED);

        store.settle(
            pending,
            &WriteOutcome::Rejected {
                reason: "quota".to_string(),
            },
        );
        assert_eq!(store.current()[0].status, "Pending");
    }

    #[tokio::test]
    async fn rejected_delete_refetches() {
        let source = seeded();
        let mut store = loaded(&source).await;
        let fetches_before = source.fetch_count();

        source.next_write(WriteOutcome::Rejected {
            reason: "HTTP 500".to_string(),
        });
        let request = WriteRequest::new("deleteStudent").field("email", "avery@example.com");
        let outcome = store
            .remove(|view: &EnrollmentView| view.email == "avery@example.com", &request)
            .await;

        assert!(outcome.is_rejected());
        assert!(source.fetch_count() > fetches_before);
        assert_eq!(store.current().len(), 3);
    }

    #[tokio::test]
    async fn accepted_delete_stays_removed() {
        let source = seeded();
        let mut store = loaded(&source).await;

        source.next_write(WriteOutcome::Accepted);
        let request = WriteRequest::new("deleteStudent").field("email", "jules@example.com");
        store
            .remove(|view: &EnrollmentView| view.email == "jules@example.com", &request)
            .await;

        assert_eq!(store.current().len(), 2);
        assert!(store.current().iter().all(|v| v.email != "jules@example.com"));
    }

    #[tokio::test]
    async fn closed_store_ignores_late_responses() {
        let source = Arc::new(FakeSource::new());
        source.set(
            Resource::Tasks,
            vec![json!({ "taskId": "1", "assignedTo": "a@example.com", "status": "in progress" })],
        );
        let mut store = RecordStore::new(source.clone(), TaskDataset);

        let ticket = store.begin_refetch();
        let result = TaskDataset.load(source.as_ref()).await;
        store.close();

        assert_eq!(store.finish_refetch(ticket, result), RefetchOutcome::Cancelled);
        assert!(store.current().is_empty());
    }

    #[tokio::test]
    async fn task_status_moves_freely() {
        let source = Arc::new(FakeSource::new());
        source.set(
            Resource::Tasks,
            vec![json!({ "taskId": "7", "assignedTo": "a@example.com", "status": "completed" })],
        );
        let mut store = RecordStore::new(source.clone(), TaskDataset);
        store.refetch().await;

        let pending = store.apply_local(
            |task: &Task| task.id == "7",
            |task: &Task| Task {
                status: TaskStatus::Pending,
                ..task.clone()
            },
        );
        store.settle(pending, &WriteOutcome::Accepted);
        assert_eq!(store.current()[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn padded_task_id_is_matched_and_echoed() {
        let source = Arc::new(FakeSource::new());
        source.set(
            Resource::Tasks,
            vec![json!({ "taskId": " 7 ", "assignedTo": "a@example.com", "status": "pending" })],
        );
        let mut store = RecordStore::new(source.clone(), TaskDataset);
        store.refetch().await;

        let id = store.current()[0].id.clone();
        let pending = store.apply_local(
            |task: &Task| task.has_id("7"),
            |task: &Task| Task {
                status: TaskStatus::Completed,
                ..task.clone()
            },
        );
        assert_eq!(pending.changed, 1);

        let request = WriteRequest::new("updateTask")
            .field("id", id.as_str())
            .field("status", TaskStatus::Completed.as_str());
        store.commit(pending, &request).await;
        assert_eq!(store.current()[0].status, TaskStatus::Completed);
        assert_eq!(source.writes()[0].body()["id"], json!(" 7 "));
    }
}
