//! Per-statement protocol state.
//!
//! A statement walks `Idle → StatementIdRequested → Prepared → Executed →
//! Negotiated(kind)`, then alternates between the negotiated state and
//! `Putting` / `Fetching` until it is `Closed`. Every protocol step checks
//! the transition first, so a misuse is an `InvalidState` error and nothing
//! goes out on the wire.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::codec::VarcharEncoding;
use crate::protocol::columnar::{BufferPool, ColumnCodec};
use crate::protocol::types::{ColumnDescriptor, ColumnInfo, ColumnMetadata};

/// What a statement turned out to be once its types were negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Has input columns; rows go up with `put`.
    Insert,
    /// Has output columns; rows come down with `fetch`.
    Select,
    /// Neither; done as soon as it executes.
    Dml,
}

/// Protocol state of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Idle,
    StatementIdRequested,
    Prepared,
    Executed,
    Negotiated(StatementKind),
    Putting,
    Fetching,
    Closed,
}

impl StatementState {
    fn allows(self, to: StatementState) -> bool {
        use StatementKind::*;
        use StatementState::*;
        match (self, to) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, StatementIdRequested)
            | (StatementIdRequested, Prepared)
            | (Prepared, Executed)
            | (Executed, Negotiated(_))
            | (Negotiated(Insert), Putting)
            | (Putting, Negotiated(Insert))
            | (Negotiated(Select), Fetching)
            | (Fetching, Negotiated(Select)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StatementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementState::Negotiated(kind) => write!(f, "Negotiated({:?})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Mutable state of the statement currently open on a connection.
#[derive(Debug)]
pub struct StatementContext {
    statement_id: Option<u64>,
    state: StatementState,
    columns: Vec<ColumnMetadata>,
    codecs: Vec<ColumnCodec>,
    column_info: Arc<ColumnInfo>,
    encoding: VarcharEncoding,
    rows_fetched: u64,
    rows_inserted: u64,
    pool: BufferPool,
}

impl StatementContext {
    /// Start a statement on a session with the given VARCHAR encoding.
    pub fn new(encoding: VarcharEncoding) -> Self {
        Self {
            statement_id: None,
            state: StatementState::Idle,
            columns: Vec::new(),
            codecs: Vec::new(),
            column_info: Arc::new(ColumnInfo::new(Vec::new())),
            encoding,
            rows_fetched: 0,
            rows_inserted: 0,
            pool: BufferPool::default(),
        }
    }

    /// Server-assigned statement id, once requested.
    pub fn statement_id(&self) -> Option<u64> {
        self.statement_id
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Negotiated kind, if types have been negotiated and the statement is not closed.
    pub fn kind(&self) -> Option<StatementKind> {
        match self.state {
            StatementState::Negotiated(kind) => Some(kind),
            StatementState::Putting => Some(StatementKind::Insert),
            StatementState::Fetching => Some(StatementKind::Select),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == StatementState::Closed
    }

    /// Negotiated columns (input columns for an insert, output columns for a select).
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn codecs(&self) -> &[ColumnCodec] {
        &self.codecs
    }

    pub fn column_info(&self) -> &Arc<ColumnInfo> {
        &self.column_info
    }

    pub fn encoding(&self) -> VarcharEncoding {
        self.encoding
    }

    pub fn rows_fetched(&self) -> u64 {
        self.rows_fetched
    }

    pub fn rows_inserted(&self) -> u64 {
        self.rows_inserted
    }

    /// Split borrow for packing: metadata and codecs alongside the pool.
    pub fn pack_parts(&mut self) -> (&[ColumnMetadata], &[ColumnCodec], &mut BufferPool) {
        (&self.columns, &self.codecs, &mut self.pool)
    }

    /// Move to `to`, or fail with `InvalidState` naming the operation.
    pub fn transition(&mut self, to: StatementState, operation: &str) -> Result<()> {
        if !self.state.allows(to) {
            return Err(Error::invalid_state(format!(
                "cannot {} a statement in state {}",
                operation, self.state
            )));
        }
        trace!(statement_id = ?self.statement_id, from = %self.state, to = %to, "statement state");
        self.state = to;
        Ok(())
    }

    /// Check that `to` would be allowed without moving.
    pub fn check(&self, to: StatementState, operation: &str) -> Result<()> {
        if self.state.allows(to) {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot {} a statement in state {}",
                operation, self.state
            )))
        }
    }

    /// Record the id from `getStatementId`.
    pub fn assign_id(&mut self, statement_id: u64) -> Result<()> {
        self.transition(StatementState::StatementIdRequested, "assign an id to")?;
        self.statement_id = Some(statement_id);
        Ok(())
    }

    /// Resolve types from `queryTypeIn` / `queryTypeOut` and settle the kind.
    ///
    /// Non-empty input columns make an insert, else non-empty output columns a
    /// select, else the statement is DML.
    pub fn negotiate(
        &mut self,
        input: &[ColumnDescriptor],
        output: &[ColumnDescriptor],
    ) -> Result<StatementKind> {
        self.check(StatementState::Negotiated(StatementKind::Dml), "negotiate types for")?;

        let (kind, descs) = if !input.is_empty() {
            (StatementKind::Insert, input)
        } else if !output.is_empty() {
            (StatementKind::Select, output)
        } else {
            (StatementKind::Dml, output)
        };

        let columns = ColumnMetadata::from_descriptors(descs)?;
        self.codecs = ColumnCodec::for_columns(&columns);
        self.column_info = Arc::new(ColumnInfo::new(columns.clone()));
        if kind == StatementKind::Insert {
            self.pool = BufferPool::new(columns.len());
        }
        self.columns = columns;

        self.transition(StatementState::Negotiated(kind), "negotiate types for")?;
        Ok(kind)
    }

    pub(crate) fn add_inserted(&mut self, rows: usize) {
        self.rows_inserted += rows as u64;
    }

    pub(crate) fn add_fetched(&mut self, rows: usize) {
        self.rows_fetched += rows as u64;
    }

    /// Mark closed and release the pack buffers.
    pub fn close(&mut self) {
        if self.state != StatementState::Closed {
            trace!(statement_id = ?self.statement_id, from = %self.state, "statement closed");
        }
        self.state = StatementState::Closed;
        self.pool = BufferPool::default();
    }
}
