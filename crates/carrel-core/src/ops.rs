//! Async operation lifecycle tracking.
//!
//! Every gateway call runs through an [`Operation`] keyed by its
//! [`OpKind`]. The lifecycle is an explicit tagged union: idle until first
//! use, pending while a call is in flight, then success or error. Each
//! invocation gets a generation ticket; a completion presenting a stale
//! ticket is dropped, so the latest invocation always owns the key and an
//! operation makes exactly one pending-to-terminal transition per
//! invocation. An error stays visible until the key is begun again.

use std::collections::HashMap;
use std::fmt;

use crate::error::ApiError;

/// Lifecycle state of one tracked operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpStatus<T> {
    Idle,
    Pending,
    Success(T),
    Error(ApiError),
}

impl<T> OpStatus<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OpStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OpStatus::Success(_) | OpStatus::Error(_))
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            OpStatus::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Invocation ticket handed out by [`Operation::begin`].
pub type Ticket = u64;

/// One tracked operation with supersede protection.
#[derive(Debug)]
pub struct Operation<T> {
    status: OpStatus<T>,
    generation: Ticket,
}

impl<T> Operation<T> {
    pub fn new() -> Self {
        Self {
            status: OpStatus::Idle,
            generation: 0,
        }
    }

    pub fn status(&self) -> &OpStatus<T> {
        &self.status
    }

    /// Start a new invocation: state goes pending and any outcome of an
    /// earlier invocation is forgotten.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.status = OpStatus::Pending;
        self.generation
    }

    /// Land a completion. Returns false (and changes nothing) when the
    /// ticket belongs to a superseded invocation or the operation already
    /// reached a terminal state.
    pub fn complete(&mut self, ticket: Ticket, result: Result<T, ApiError>) -> bool {
        if ticket != self.generation || !self.status.is_pending() {
            return false;
        }
        self.status = match result {
            Ok(value) => OpStatus::Success(value),
            Err(err) => OpStatus::Error(err),
        };
        true
    }
}

impl<T> Default for Operation<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a logical operation. Mutations carry their target id, so
/// "delete document A" and "delete document B" track independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKind {
    Ask,
    ListDocuments,
    ShowDocument(String),
    DeleteDocument(String),
    SummarizeDocument(String),
    FetchReferences(String),
    FetchPdf(String),
    IndexFile,
    IndexFolder,
    Reindex,
    ResetIndex,
    Upload,
    Health,
    Stats,
    ListProjects,
    ShowProject(String),
    CreateProject,
    UpdateProject(String),
    DeleteProject(String),
    AddSource(String),
    UpdateSource(String),
    RemoveSource(String),
    CreateSection(String),
    UpdateSection(String),
    DeleteSection(String),
    ExportProject(String),
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Ask => write!(f, "ask"),
            OpKind::ListDocuments => write!(f, "list-documents"),
            OpKind::ShowDocument(id) => write!(f, "show-document:{}", id),
            OpKind::DeleteDocument(id) => write!(f, "delete-document:{}", id),
            OpKind::SummarizeDocument(id) => write!(f, "summarize-document:{}", id),
            OpKind::FetchReferences(id) => write!(f, "fetch-references:{}", id),
            OpKind::FetchPdf(id) => write!(f, "fetch-pdf:{}", id),
            OpKind::IndexFile => write!(f, "index-file"),
            OpKind::IndexFolder => write!(f, "index-folder"),
            OpKind::Reindex => write!(f, "reindex"),
            OpKind::ResetIndex => write!(f, "reset-index"),
            OpKind::Upload => write!(f, "upload"),
            OpKind::Health => write!(f, "health"),
            OpKind::Stats => write!(f, "stats"),
            OpKind::ListProjects => write!(f, "list-projects"),
            OpKind::ShowProject(id) => write!(f, "show-project:{}", id),
            OpKind::CreateProject => write!(f, "create-project"),
            OpKind::UpdateProject(id) => write!(f, "update-project:{}", id),
            OpKind::DeleteProject(id) => write!(f, "delete-project:{}", id),
            OpKind::AddSource(id) => write!(f, "add-source:{}", id),
            OpKind::UpdateSource(id) => write!(f, "update-source:{}", id),
            OpKind::RemoveSource(id) => write!(f, "remove-source:{}", id),
            OpKind::CreateSection(id) => write!(f, "create-section:{}", id),
            OpKind::UpdateSection(id) => write!(f, "update-section:{}", id),
            OpKind::DeleteSection(id) => write!(f, "delete-section:{}", id),
            OpKind::ExportProject(id) => write!(f, "export-project:{}", id),
        }
    }
}

/// All tracked operations, keyed by [`OpKind`]. Keys never seen report
/// [`OpStatus::Idle`].
#[derive(Debug, Default)]
pub struct OperationLog {
    ops: HashMap<OpKind, Operation<()>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, kind: OpKind) -> Ticket {
        self.ops.entry(kind).or_default().begin()
    }

    pub fn complete(&mut self, kind: &OpKind, ticket: Ticket, result: Result<(), ApiError>) -> bool {
        match self.ops.get_mut(kind) {
            Some(op) => op.complete(ticket, result),
            None => false,
        }
    }

    pub fn status(&self, kind: &OpKind) -> OpStatus<()> {
        self.ops
            .get(kind)
            .map(|op| op.status().clone())
            .unwrap_or(OpStatus::Idle)
    }

    pub fn is_pending(&self, kind: &OpKind) -> bool {
        self.status(kind).is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_idle_pending_success() {
        let mut op: Operation<u32> = Operation::new();
        assert_eq!(*op.status(), OpStatus::Idle);

        let ticket = op.begin();
        assert!(op.status().is_pending());

        assert!(op.complete(ticket, Ok(7)));
        assert_eq!(*op.status(), OpStatus::Success(7));
    }

    #[test]
    fn superseded_completion_is_dropped() {
        let mut op: Operation<&str> = Operation::new();
        let first = op.begin();
        let second = op.begin();

        // the first invocation finishes after being superseded
        assert!(!op.complete(first, Ok("stale")));
        assert!(op.status().is_pending());

        assert!(op.complete(second, Ok("current")));
        assert_eq!(*op.status(), OpStatus::Success("current"));
    }

    #[test]
    fn one_terminal_transition_per_invocation() {
        let mut op: Operation<()> = Operation::new();
        let ticket = op.begin();
        assert!(op.complete(ticket, Ok(())));
        assert!(!op.complete(ticket, Err(ApiError::Timeout)));
        assert_eq!(*op.status(), OpStatus::Success(()));
    }

    #[test]
    fn error_is_sticky_until_next_begin() {
        let mut op: Operation<()> = Operation::new();
        let ticket = op.begin();
        op.complete(ticket, Err(ApiError::Timeout));
        assert_eq!(op.status().error(), Some(&ApiError::Timeout));

        op.begin();
        assert!(op.status().is_pending());
        assert!(op.status().error().is_none());
    }

    #[test]
    fn log_tracks_keys_independently() {
        let mut log = OperationLog::new();
        let del_a = OpKind::DeleteDocument("a".to_string());
        let del_b = OpKind::DeleteDocument("b".to_string());

        let ticket = log.begin(del_a.clone());
        assert!(log.is_pending(&del_a));
        assert_eq!(log.status(&del_b), OpStatus::Idle);

        log.complete(&del_a, ticket, Err(ApiError::Timeout));
        assert_eq!(log.status(&del_a), OpStatus::Error(ApiError::Timeout));
        assert_eq!(log.status(&del_b), OpStatus::Idle);
    }

    #[test]
    fn completion_for_unknown_key_is_dropped() {
        let mut log = OperationLog::new();
        assert!(!log.complete(&OpKind::Ask, 1, Ok(())));
        assert_eq!(log.status(&OpKind::Ask), OpStatus::Idle);
    }
}
