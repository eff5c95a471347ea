//! Prepared statement handle.
//!
//! A `Statement` mutably borrows its `Connection`, so a connection runs at
//! most one statement at a time. The statement's protocol state lives on the
//! connection; dropping the handle without closing leaves the statement open
//! until the next `prepare` or `close` on the connection.

use std::sync::Arc;

use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::columnar::{decode_columns, into_rows, pack_batch, plan_flushes, validate_rows};
use crate::protocol::constants::{ACK_EXECUTED, ACK_PUTTED, ACK_STATEMENT_CLOSED};
use crate::protocol::messages::{
    CloseStatement, Execute, Fetch, Put, PutPayload, QueryTypeIn, QueryTypeOut,
};
use crate::protocol::packet::FrameStream;
use crate::protocol::response::{
    expect_ack, parse_response, FetchResponse, QueryTypeInResponse, QueryTypeOutResponse,
};
use crate::protocol::statement::{StatementContext, StatementKind, StatementState};
use crate::protocol::types::{ColumnInfo, ColumnMetadata, Row, SqreamValue};

/// A prepared statement on a connection.
///
/// # Example
///
/// ```no_run
/// use sqream_thin_rs::{Connection, SqreamValue};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
///
///     let mut stmt = conn.prepare("insert into t values (?, ?)").await?;
///     stmt.execute().await?;
///     stmt.put(&[vec![1i32.into(), "one".into()], vec![2i32.into(), SqreamValue::Null]]).await?;
///     stmt.close().await?;
///     Ok(())
/// }
/// ```
pub struct Statement<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    fn context(&self) -> Option<&StatementContext> {
        self.conn.statement.as_ref()
    }

    /// Server-assigned statement id.
    pub fn statement_id(&self) -> Option<u64> {
        self.context().and_then(StatementContext::statement_id)
    }

    /// Current protocol state.
    pub fn state(&self) -> StatementState {
        self.context()
            .map_or(StatementState::Closed, StatementContext::state)
    }

    /// Negotiated kind, once executed.
    pub fn kind(&self) -> Option<StatementKind> {
        self.context().and_then(StatementContext::kind)
    }

    /// Negotiated columns: insert parameters for an insert, result columns for a select.
    pub fn columns(&self) -> &[ColumnMetadata] {
        self.context().map(StatementContext::columns).unwrap_or(&[])
    }

    /// Shared column info for result rows.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        self.context()
            .map(|ctx| Arc::clone(ctx.column_info()))
            .unwrap_or_else(|| Arc::new(ColumnInfo::new(Vec::new())))
    }

    /// Rows inserted so far.
    pub fn rows_inserted(&self) -> u64 {
        self.context().map_or(0, StatementContext::rows_inserted)
    }

    /// Rows fetched so far.
    pub fn rows_fetched(&self) -> u64 {
        self.context().map_or(0, StatementContext::rows_fetched)
    }

    pub fn is_closed(&self) -> bool {
        self.context().map_or(true, StatementContext::is_closed)
    }

    /// Execute the statement and negotiate its column types.
    ///
    /// Returns the negotiated columns. A statement with neither input nor
    /// output columns is DML; it is finished and closed here.
    pub async fn execute(&mut self) -> Result<&[ColumnMetadata]> {
        self.conn.ensure_usable()?;
        let result = self.execute_inner().await;
        self.conn.settle(result).await?;
        Ok(self.columns())
    }

    async fn execute_inner(&mut self) -> Result<StatementKind> {
        let (stream, ctx, params) = self.conn.parts()?;
        ctx.check(StatementState::Executed, "execute")?;

        stream.send_command(&Execute).await?;
        let frame = stream
            .read_frame_with_keepalive(params.keepalive_interval)
            .await?;
        expect_ack(&frame, ACK_EXECUTED)?;
        ctx.transition(StatementState::Executed, "execute")?;

        stream.send_command(&QueryTypeIn).await?;
        let input: QueryTypeInResponse = parse_response(&stream.read_frame().await?)?;
        let output = if input.query_type.is_empty() {
            stream.send_command(&QueryTypeOut).await?;
            let resp: QueryTypeOutResponse = parse_response(&stream.read_frame().await?)?;
            resp.query_type_named
        } else {
            Vec::new()
        };

        let kind = ctx.negotiate(&input.query_type, &output)?;
        debug!(
            statement_id = ?ctx.statement_id(),
            kind = ?kind,
            columns = ctx.columns().len(),
            "statement executed"
        );
        if kind == StatementKind::Dml {
            close_statement(stream, ctx).await?;
        }
        Ok(kind)
    }

    /// Insert rows, flushing in batches sized by the connection settings.
    ///
    /// Every row is checked against the negotiated columns before anything
    /// is sent; if one value does not fit, no row is inserted.
    /// Returns the number of rows inserted.
    pub async fn put(&mut self, rows: &[Vec<SqreamValue>]) -> Result<u64> {
        self.conn.ensure_usable()?;
        let result = self.put_inner(rows).await;
        self.conn.settle(result).await
    }

    async fn put_inner(&mut self, rows: &[Vec<SqreamValue>]) -> Result<u64> {
        let (stream, ctx, params) = self.conn.parts()?;
        ctx.check(StatementState::Putting, "put into")?;

        let encoding = ctx.encoding();
        validate_rows(rows, ctx.columns(), ctx.codecs(), encoding)?;

        let batches = plan_flushes(
            ctx.columns(),
            rows,
            params.flush_bytes,
            params.max_rows_per_flush,
        );
        for batch in batches {
            ctx.transition(StatementState::Putting, "put into")?;
            let (columns, codecs, pool) = ctx.pack_parts();
            pack_batch(
                &rows[batch.clone()],
                batch.start,
                columns,
                codecs,
                encoding,
                pool,
                params.parallel_packing,
            )?;

            stream.send_command(&Put { put: batch.len() }).await?;
            stream.send_message(&PutPayload::new(pool.buffers())).await?;
            let bytes = pool.packed_len();
            expect_ack(&stream.read_frame().await?, ACK_PUTTED)?;

            ctx.transition(StatementState::Negotiated(StatementKind::Insert), "put into")?;
            ctx.add_inserted(batch.len());
            debug!(
                statement_id = ?ctx.statement_id(),
                rows = batch.len(),
                bytes,
                "flushed rows"
            );
        }
        Ok(rows.len() as u64)
    }

    /// Fetch the next batch of rows.
    ///
    /// Returns `Ok(None)` once the result set is exhausted; the statement is
    /// closed at that point.
    pub async fn fetch(&mut self) -> Result<Option<Vec<Row>>> {
        self.conn.ensure_usable()?;
        let result = self.fetch_inner().await;
        self.conn.settle(result).await
    }

    async fn fetch_inner(&mut self) -> Result<Option<Vec<Row>>> {
        let (stream, ctx, _) = self.conn.parts()?;
        if ctx.is_closed() {
            return Ok(None);
        }
        ctx.transition(StatementState::Fetching, "fetch from")?;

        stream.send_command(&Fetch).await?;
        let resp: FetchResponse = parse_response(&stream.read_frame().await?)?;
        if resp.rows == 0 {
            debug!(statement_id = ?ctx.statement_id(), total = ctx.rows_fetched(), "end of data");
            close_statement(stream, ctx).await?;
            return Ok(None);
        }

        let raw = stream.read_frame().await?.into_binary()?;
        let columns = decode_columns(
            ctx.columns(),
            ctx.codecs(),
            &resp.col_szs,
            raw,
            resp.rows,
            ctx.encoding(),
        )?;
        let rows = into_rows(columns, Arc::clone(ctx.column_info()));

        ctx.add_fetched(rows.len());
        ctx.transition(StatementState::Negotiated(StatementKind::Select), "fetch from")?;
        debug!(statement_id = ?ctx.statement_id(), rows = rows.len(), "fetched rows");
        Ok(Some(rows))
    }

    /// Fetch every remaining row.
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut all = Vec::new();
        while let Some(mut rows) = self.fetch().await? {
            all.append(&mut rows);
        }
        Ok(all)
    }

    /// Close the statement on the server. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.conn.ensure_usable()?;
        let result = match self.conn.parts() {
            Ok((stream, ctx, _)) => close_statement(stream, ctx).await,
            Err(e) => Err(e),
        };
        self.conn.settle(result).await
    }
}

/// Send `closeStatement` and mark the context closed.
///
/// A context that never got a statement id is closed locally.
pub(crate) async fn close_statement(
    stream: &mut FrameStream,
    ctx: &mut StatementContext,
) -> Result<()> {
    if ctx.is_closed() {
        return Ok(());
    }
    if ctx.statement_id().is_some() {
        stream.send_command(&CloseStatement).await?;
        expect_ack(&stream.read_frame().await?, ACK_STATEMENT_CLOSED)?;
    }
    ctx.close();
    Ok(())
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("statement_id", &self.statement_id())
            .field("state", &self.state())
            .finish()
    }
}

