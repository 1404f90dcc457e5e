//! Multi-item operations with partial-failure tracking and conflict resumption.
//!
//! # Design
//! - Every round submits the full original item set; only the cursor changes.
//! - A settled item outcome never changes in a later round.
//! - Only a conflict reported by a `failed` task with a cursor is resumable, and only
//!   when the caller supplied a resolution policy.
//! - Rounds are strictly sequential: each resumption depends on the previous cursor.
//! - A cursor supplied by the caller gets the policy's directive before it is first sent.
//! - A failure naming no item leaves the unnamed items of its task unsettled.

use std::time::Duration;

use ferry_core::{
    BackgroundTask, BatchAction, BatchItem, ConflictResolutionPolicy, Cursor, FailureCause,
    ItemFailure, PathError, RemoteError, RemotePath, RemoteResult, ResolvedItem, Target,
    TaskFailure, TaskRef, TaskRefs, TaskStatus,
};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::command::{SubmitBatch, execute};
use crate::session::Session;
use crate::task::{TaskBridge, TaskHandle};

/// Default cap on conflict resumptions within one batch call.
pub const DEFAULT_MAX_RESUMPTIONS: u32 = 32;

/// Per-call batch knobs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Answer to conflicts; without one, conflicts are surfaced.
    pub resolver: Option<ConflictResolutionPolicy>,
    /// Cursor of an earlier interrupted run to resume from.
    pub cursor: Option<Cursor>,
    /// Await every task before returning.
    pub wait: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            resolver: None,
            cursor: None,
            wait: true,
        }
    }
}

impl BatchOptions {
    /// Resolve conflicts with `policy`.
    #[must_use]
    pub fn with_resolver(mut self, policy: ConflictResolutionPolicy) -> Self {
        self.resolver = Some(policy);
        self
    }

    /// Resume from `cursor`.
    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Return task handles instead of waiting.
    #[must_use]
    pub const fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Never processed: an earlier item stopped the task.
    Pending,
    /// Processed successfully.
    Succeeded,
    /// Processed and failed.
    Failed(RemoteError),
}

/// Outcome of one item, with its resolved paths.
#[derive(Debug, Clone)]
pub struct ItemReport<P> {
    /// Item source.
    pub source: P,
    /// Resolved destination; `None` for deletes.
    pub destination: Option<P>,
    /// Terminal state.
    pub outcome: ItemOutcome,
}

/// Result of a waited batch.
#[derive(Debug, Clone)]
pub struct BatchReport<P> {
    /// Batch action.
    pub action: BatchAction,
    /// One entry per item, in caller order.
    pub items: Vec<ItemReport<P>>,
    /// Terminal task snapshots, across every round.
    pub tasks: Vec<BackgroundTask>,
    /// Conflict resumptions issued.
    pub resumptions: u32,
}

impl<P: RemotePath> BatchReport<P> {
    /// Items that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &ItemReport<P>> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Succeeded))
    }

    /// Items that failed.
    pub fn failed(&self) -> impl Iterator<Item = &ItemReport<P>> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Failed(_)))
    }

    /// Items never processed.
    pub fn pending(&self) -> impl Iterator<Item = &ItemReport<P>> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Pending))
    }

    /// Whether every item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.items
            .iter()
            .all(|item| matches!(item.outcome, ItemOutcome::Succeeded))
    }

    /// First unresolved conflict, with the cursor a caller can resume from.
    #[must_use]
    pub fn conflict(&self) -> Option<&RemoteError> {
        self.items.iter().find_map(|item| match &item.outcome {
            ItemOutcome::Failed(err) if err.is_conflict() => Some(err),
            _ => None,
        })
    }

    /// Turn a partially failed report into an error.
    ///
    /// # Errors
    ///
    /// Returns the unresolved [`RemoteError::Conflict`] when there is one, so the caller
    /// can resume from its cursor; otherwise [`RemoteError::BatchFailed`] listing every
    /// failed and unprocessed item.
    pub fn into_result(self) -> RemoteResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if let Some(conflict) = self.conflict() {
            return Err(conflict.clone());
        }
        let failures = self
            .items
            .iter()
            .filter_map(|item| {
                let error = match &item.outcome {
                    ItemOutcome::Succeeded => return None,
                    ItemOutcome::Failed(err) => err.clone(),
                    ItemOutcome::Pending => RemoteError::NotReached {
                        path: item.source.absolute(),
                    },
                };
                Some(ItemFailure {
                    source: item.source.to_string(),
                    destination: item.destination.as_ref().map(ToString::to_string),
                    error,
                })
            })
            .collect();
        Err(RemoteError::BatchFailed {
            action: self.action,
            failures,
        })
    }
}

/// What a batch call returns.
#[derive(Debug)]
pub enum BatchOutcome<B: Backend> {
    /// Every task was awaited.
    Completed(BatchReport<B::Path>),
    /// Tasks were submitted; the caller awaits the handles.
    Submitted(Vec<TaskHandle<B>>),
}

impl<B: Backend> BatchOutcome<B> {
    /// Report of a waited batch.
    #[must_use]
    pub fn into_report(self) -> Option<BatchReport<B::Path>> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Submitted(_) => None,
        }
    }

    /// Handles of a submitted batch.
    #[must_use]
    pub fn into_handles(self) -> Option<Vec<TaskHandle<B>>> {
        match self {
            Self::Completed(_) => None,
            Self::Submitted(handles) => Some(handles),
        }
    }
}

/// Resolve every item to a concrete destination before anything is sent.
///
/// # Errors
///
/// Returns [`RemoteError::EmptyBatch`] for no items, a path validation error for a
/// scope-root source, and [`RemoteError::MissingDestination`] when an item has neither
/// its own target nor a fallback destination.
pub fn resolve_items<P: RemotePath>(
    action: BatchAction,
    items: Vec<BatchItem<P>>,
    fallback: Option<&P>,
) -> RemoteResult<Vec<ResolvedItem<P>>> {
    if items.is_empty() {
        return Err(RemoteError::EmptyBatch);
    }
    items
        .into_iter()
        .map(|item| {
            if item.source.is_root() {
                return Err(PathError::ScopeRoot {
                    path: item.source.absolute(),
                }
                .into());
            }
            if !action.requires_destination() {
                return Ok(ResolvedItem {
                    source: item.source,
                    destination: None,
                });
            }
            let target = item
                .target
                .or_else(|| fallback.cloned().map(Target::Directory));
            let destination = match target {
                Some(Target::Exact(path)) if !path.is_root() => path,
                Some(Target::Exact(folder) | Target::Directory(folder)) => {
                    folder.join(item.source.name())?
                }
                None => {
                    return Err(RemoteError::MissingDestination {
                        item: item.source.to_string(),
                    });
                }
            };
            Ok(ResolvedItem {
                source: item.source,
                destination: Some(destination),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Succeeded,
    Failed(RemoteError),
    Conflicted { path: String, cursor: Cursor },
}

impl Slot {
    const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn record(&mut self, outcome: Self) {
        if self.is_pending() {
            *self = outcome;
        }
    }
}

/// Orchestrates one batch call across its resumption rounds.
#[derive(Debug, Clone)]
pub struct BatchResolver<B: Backend> {
    session: Session,
    backend: B,
    tasks: TaskBridge<B>,
    max_resumptions: u32,
}

impl<B: Backend> BatchResolver<B> {
    /// Resolver issuing requests through `session`.
    #[must_use]
    pub fn new(session: Session, backend: B, poll_interval: Duration) -> Self {
        Self {
            tasks: TaskBridge::new(session.clone(), backend.clone(), poll_interval),
            session,
            backend,
            max_resumptions: DEFAULT_MAX_RESUMPTIONS,
        }
    }

    /// Cap the number of conflict resumptions.
    #[must_use]
    pub const fn with_max_resumptions(mut self, limit: u32) -> Self {
        self.max_resumptions = limit;
        self
    }

    /// Run `action` over `items`.
    ///
    /// # Errors
    ///
    /// Returns local validation errors before any request, request-level failures as
    /// they happen, and [`RemoteError::ResumptionLimit`] when conflicts keep coming.
    /// Per-item failures are reported in the [`BatchReport`], not raised.
    pub async fn run(
        &self,
        action: BatchAction,
        items: Vec<BatchItem<B::Path>>,
        fallback: Option<&B::Path>,
        options: BatchOptions,
    ) -> RemoteResult<BatchOutcome<B>> {
        let resolved = resolve_items(action, items, fallback)?;
        let supplied = options
            .cursor
            .map(|cursor| prime_cursor(cursor, options.resolver.as_ref(), &resolved));

        if !options.wait {
            let refs = self.submit(action, &resolved, supplied).await?;
            let handles = refs
                .into_vec()
                .into_iter()
                .map(|task| self.tasks.as_awaitable(task))
                .collect();
            return Ok(BatchOutcome::Submitted(handles));
        }

        let mut slots = vec![Slot::Pending; resolved.len()];
        let mut snapshots = Vec::new();
        let mut cursor = supplied;
        let mut resumptions = 0_u32;

        loop {
            let refs = self.submit(action, &resolved, cursor.clone()).await?;
            for (task, covered) in assign(refs, &slots) {
                let snapshot = self.tasks.wait(&task).await?;
                settle(&self.backend, &resolved, &mut slots, &covered, &snapshot);
                snapshots.push(snapshot);
            }

            let Some(policy) = options.resolver.as_ref() else {
                break;
            };
            let Some((index, path, conflict_cursor)) = first_conflict(&slots) else {
                break;
            };
            let Some(directive) = policy.directive_for(Some(&path)) else {
                break;
            };
            if resumptions >= self.max_resumptions {
                return Err(RemoteError::ResumptionLimit {
                    limit: self.max_resumptions,
                });
            }
            resumptions += 1;
            if let Some(metrics) = self.session.metrics() {
                metrics.inc_resumption(action.as_str());
            }
            info!(
                action = %action,
                path = %path,
                disposition = directive.disposition.as_str(),
                apply_to_all = directive.apply_to_all,
                round = resumptions,
                "resuming batch after conflict"
            );
            slots[index] = Slot::Pending;
            cursor = Some(conflict_cursor.with_directive(directive));
        }

        let items = resolved
            .into_iter()
            .zip(slots)
            .map(|(item, slot)| {
                let outcome = match slot {
                    Slot::Pending => ItemOutcome::Pending,
                    Slot::Succeeded => ItemOutcome::Succeeded,
                    Slot::Failed(err) => ItemOutcome::Failed(err),
                    Slot::Conflicted { path, cursor } => ItemOutcome::Failed(RemoteError::Conflict {
                        path: Some(path),
                        cursor,
                    }),
                };
                ItemReport {
                    source: item.source,
                    destination: item.destination,
                    outcome,
                }
            })
            .collect::<Vec<_>>();

        if let Some(metrics) = self.session.metrics() {
            for item in &items {
                let outcome = match item.outcome {
                    ItemOutcome::Pending => "pending",
                    ItemOutcome::Succeeded => "succeeded",
                    ItemOutcome::Failed(_) => "failed",
                };
                metrics.inc_batch_item(action.as_str(), outcome);
            }
        }

        Ok(BatchOutcome::Completed(BatchReport {
            action,
            items,
            tasks: snapshots,
            resumptions,
        }))
    }

    async fn submit(
        &self,
        action: BatchAction,
        items: &[ResolvedItem<B::Path>],
        cursor: Option<Cursor>,
    ) -> RemoteResult<TaskRefs> {
        let command = SubmitBatch::new(self.backend.clone(), action, items.to_vec(), cursor);
        execute(command, &self.session).await
    }
}

/// Fold the caller's policy into a cursor the caller is resuming from.
///
/// A directive already on the cursor is kept. A per-path policy can only answer for a
/// single-item batch, since the cursor does not say which item conflicted.
fn prime_cursor<P: RemotePath>(
    cursor: Cursor,
    policy: Option<&ConflictResolutionPolicy>,
    items: &[ResolvedItem<P>],
) -> Cursor {
    if cursor.directive().is_some() {
        return cursor;
    }
    let directive = policy.and_then(|policy| match (policy, items) {
        (ConflictResolutionPolicy::Uniform(_), _) => policy.directive_for(None),
        (ConflictResolutionPolicy::PerPath(_), [only]) => {
            policy.directive_for(Some(only.source.absolute().as_str()))
        }
        (ConflictResolutionPolicy::PerPath(_), _) => None,
    });
    match directive {
        Some(directive) => {
            debug!(
                disposition = directive.disposition.as_str(),
                apply_to_all = directive.apply_to_all,
                "attaching resolution to supplied cursor"
            );
            cursor.with_directive(directive)
        }
        None => cursor,
    }
}

/// Pair each task reference with the unsettled items it covers.
fn assign(refs: TaskRefs, slots: &[Slot]) -> Vec<(TaskRef, Vec<usize>)> {
    match refs {
        TaskRefs::Aggregate(task) => {
            let covered: Vec<usize> = (0..slots.len()).filter(|&i| slots[i].is_pending()).collect();
            if covered.is_empty() {
                Vec::new()
            } else {
                vec![(task, covered)]
            }
        }
        TaskRefs::PerItem(refs) => refs
            .into_iter()
            .enumerate()
            .filter(|(index, _)| slots.get(*index).is_some_and(Slot::is_pending))
            .map(|(index, task)| (task, vec![index]))
            .collect(),
    }
}

fn first_conflict(slots: &[Slot]) -> Option<(usize, String, Cursor)> {
    slots.iter().enumerate().find_map(|(index, slot)| match slot {
        Slot::Conflicted { path, cursor } => Some((index, path.clone(), cursor.clone())),
        _ => None,
    })
}

/// Find the covered item a failure entry names.
fn attribute<B: Backend>(
    backend: &B,
    items: &[ResolvedItem<B::Path>],
    covered: &[usize],
    failure: &TaskFailure,
) -> Option<usize> {
    let Some(named) = failure.path.as_deref() else {
        return (covered.len() == 1).then(|| covered[0]);
    };
    let parsed = B::Path::from_href(named).ok();
    covered.iter().copied().find(|&index| {
        let item = &items[index];
        backend.wire_path(&item.source) == named
            || item.source.absolute() == named
            || parsed.as_ref() == Some(&item.source)
            || item.destination.as_ref().is_some_and(|destination| {
                backend.wire_path(destination) == named || parsed.as_ref() == Some(destination)
            })
    })
}

fn classify<P: RemotePath>(item: &ResolvedItem<P>, failure: &TaskFailure, task: &BackgroundTask) -> Slot {
    let source = item.source.absolute();
    match failure.cause() {
        FailureCause::Conflict => match (&task.status, &task.cursor) {
            (TaskStatus::Failed, Some(cursor)) => Slot::Conflicted {
                path: source,
                cursor: cursor.clone(),
            },
            _ => {
                warn!(
                    task_id = %task.id,
                    status = %task.status,
                    path = %source,
                    "conflict reported without a resumable stop; treating as failure"
                );
                Slot::Failed(operation_failed(Some(source), failure, task))
            }
        },
        FailureCause::DestinationNotFound => Slot::Failed(RemoteError::DestinationNotFound {
            path: item
                .destination
                .as_ref()
                .map_or_else(|| source.clone(), |destination| destination.parent().absolute()),
        }),
        FailureCause::SourceNotFound => Slot::Failed(RemoteError::ObjectNotFound { path: source }),
        FailureCause::Other => Slot::Failed(operation_failed(Some(source), failure, task)),
    }
}

fn operation_failed(path: Option<String>, failure: &TaskFailure, task: &BackgroundTask) -> RemoteError {
    RemoteError::OperationFailed {
        path,
        code: failure.code.clone(),
        message: failure.message.clone(),
        cursor: task.cursor.clone(),
    }
}

/// Fold one terminal task into the item slots it covers.
fn settle<B: Backend>(
    backend: &B,
    items: &[ResolvedItem<B::Path>],
    slots: &mut [Slot],
    covered: &[usize],
    task: &BackgroundTask,
) {
    if task.status == TaskStatus::Completed {
        for &index in covered {
            slots[index].record(Slot::Succeeded);
        }
        return;
    }

    if task.failures.is_empty() {
        for &index in covered {
            slots[index].record(Slot::Failed(RemoteError::OperationFailed {
                path: Some(items[index].source.absolute()),
                code: task.status.as_str().to_string(),
                message: task.progress.clone(),
                cursor: task.cursor.clone(),
            }));
        }
        return;
    }

    // Positions within `covered`: first conflict, and last failure of any kind.
    let mut conflict_at: Option<usize> = None;
    let mut last_failure_at: Option<usize> = None;
    let mut unattributed = Vec::new();
    for failure in &task.failures {
        let Some(index) = attribute(backend, items, covered, failure) else {
            unattributed.push(failure);
            continue;
        };
        let slot = classify(&items[index], failure, task);
        let conflicted = matches!(slot, Slot::Conflicted { .. });
        slots[index].record(slot);
        if let Some(position) = covered.iter().position(|&i| i == index) {
            last_failure_at = Some(last_failure_at.map_or(position, |last| last.max(position)));
            if conflicted {
                conflict_at = Some(conflict_at.map_or(position, |first| first.min(position)));
            }
        }
    }

    // The remaining items cannot be told apart, so none of them is settled.
    if let Some(failure) = unattributed.first() {
        let unsettled = covered.iter().filter(|&&index| slots[index].is_pending()).count();
        warn!(
            task_id = %task.id,
            code = %failure.code,
            count = unattributed.len(),
            unsettled,
            "task failure names no submitted item; leaving unnamed items unsettled"
        );
        return;
    }

    // A failed task stopped at its conflict, or at its last reported failure.
    let halted_at = match task.status {
        TaskStatus::Failed => conflict_at.or(last_failure_at),
        _ => None,
    };
    for (position, &index) in covered.iter().enumerate() {
        if halted_at.is_some_and(|halt| position > halt) {
            break;
        }
        slots[index].record(Slot::Succeeded);
    }
}
