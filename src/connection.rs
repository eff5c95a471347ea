//! High-level Connection API for the SQream thin client.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cursor::RowCursor;
use crate::error::{Error, ErrorKind, Result};
use crate::protocol::auth::{open_session, reattach_session, Credentials, Session};
use crate::protocol::codec::VarcharEncoding;
use crate::protocol::connect::{
    connect_with_retry, open_transport, ConnectParams, Connector, TcpConnector,
};
use crate::protocol::constants::ACK_CONNECTION_CLOSED;
use crate::protocol::messages::{CloseConnection, GetStatementId, Ping, PrepareStatement};
use crate::protocol::packet::FrameStream;
use crate::protocol::response::{expect_ack, parse_response, PrepareResponse, StatementIdResponse};
use crate::protocol::statement::{StatementContext, StatementKind, StatementState};
use crate::protocol::types::{ColumnMetadata, Row, SqreamValue};
use crate::statement::{close_statement, Statement};

/// Result of a query execution.
#[derive(Debug)]
pub struct QueryResult {
    /// Column metadata.
    pub columns: Vec<ColumnMetadata>,
    /// Rows returned.
    pub rows: Vec<Row>,
    /// Total row count.
    pub row_count: u64,
}

impl QueryResult {
    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A SQream database connection.
pub struct Connection {
    /// Frame stream for communication.
    pub(crate) stream: FrameStream,
    params: ConnectParams,
    creds: Credentials,
    connector: Arc<dyn Connector>,
    session: Session,
    /// The statement currently open on this connection, if any.
    pub(crate) statement: Option<StatementContext>,
    /// Set after a protocol or socket failure; every later call fails fast.
    broken: bool,
}

impl Connection {
    /// Connect to a SQream database.
    ///
    /// # Arguments
    ///
    /// * `conn_str` - Connection string in format "host:port/database"
    /// * `username` - Database username
    /// * `password` - Database password
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sqream_thin_rs::Connection;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let conn = Connection::connect(
    ///         "localhost:5000/master",
    ///         "sqream",
    ///         "sqream"
    ///     ).await?;
    ///     conn.close().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(conn_str: &str, username: &str, password: &str) -> Result<Self> {
        let params = ConnectParams::parse(conn_str)?;
        Self::connect_with_params(&params, username, password).await
    }

    /// Connect with explicit connection parameters over plain TCP.
    pub async fn connect_with_params(
        params: &ConnectParams,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        Self::connect_with_connector(params, username, password, Arc::new(TcpConnector)).await
    }

    /// Connect through a custom transport.
    pub async fn connect_with_connector(
        params: &ConnectParams,
        username: &str,
        password: &str,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let creds = Credentials::new(username, password);
        let transport = open_transport(&connector, params).await?;
        let mut stream = FrameStream::new(transport);
        let session = open_session(&mut stream, params, &creds).await?;

        Ok(Self {
            stream,
            params: params.clone(),
            creds,
            connector,
            session,
            statement: None,
            broken: false,
        })
    }

    /// Open another connection with the same parameters and credentials.
    ///
    /// Use one connection per concurrently running statement.
    pub async fn duplicate(&self) -> Result<Self> {
        Self::connect_with_connector(
            &self.params,
            &self.creds.username,
            &self.creds.password,
            Arc::clone(&self.connector),
        )
        .await
    }

    /// Server-assigned connection id.
    pub fn connection_id(&self) -> u64 {
        self.session.connection_id
    }

    /// Encoding the server uses for VARCHAR columns.
    pub fn varchar_encoding(&self) -> VarcharEncoding {
        self.session.varchar_encoding
    }

    /// Connection parameters.
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Whether a fatal error has made this connection unusable.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Prepare a statement.
    ///
    /// A statement still open on this connection is closed first.
    pub async fn prepare(&mut self, sql: &str) -> Result<Statement<'_>> {
        self.ensure_usable()?;
        let result = self.close_open_statement().await;
        self.settle(result).await?;

        let result = self.prepare_inner(sql).await;
        self.settle(result).await?;
        Ok(Statement::new(self))
    }

    async fn prepare_inner(&mut self, sql: &str) -> Result<()> {
        self.statement = Some(StatementContext::new(self.session.varchar_encoding));

        self.stream.send_command(&GetStatementId).await?;
        let resp: StatementIdResponse = parse_response(&self.stream.read_frame().await?)?;
        let statement_id = resp.statement_id;
        self.parts()?.1.assign_id(statement_id)?;

        self.stream
            .send_command(&PrepareStatement {
                prepare_statement: sql,
                chunk_size: self.params.chunk_size,
            })
            .await?;
        let frame = self
            .stream
            .read_frame_with_keepalive(self.params.keepalive_interval)
            .await?;
        let resp: PrepareResponse = parse_response(&frame)?;
        if resp.reconnect {
            self.follow_redirect(&resp, statement_id).await?;
        }

        self.parts()?.1.transition(StatementState::Prepared, "prepare")?;
        debug!(statement_id, "statement prepared");
        Ok(())
    }

    /// Move to the worker named in a `prepareStatement` redirect.
    async fn follow_redirect(&mut self, resp: &PrepareResponse, statement_id: u64) -> Result<()> {
        info!(
            ip = %resp.ip,
            port = resp.port,
            listener_id = resp.listener_id,
            statement_id,
            "statement redirected to another worker"
        );
        let transport =
            connect_with_retry(self.connector.as_ref(), &resp.ip, resp.port, &self.params).await?;
        self.stream.replace(transport);
        reattach_session(
            &mut self.stream,
            &self.params,
            &self.creds,
            &self.session,
            resp.listener_id,
            statement_id,
        )
        .await
    }

    /// Run a statement that returns no rows (DDL or DML).
    ///
    /// A statement that does return rows is closed without fetching them.
    pub async fn execute(&mut self, sql: &str) -> Result<()> {
        let mut stmt = self.prepare(sql).await?;
        stmt.execute().await?;
        stmt.close().await
    }

    /// Run a query and collect every row.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sqream_thin_rs::Connection;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
    ///
    ///     let result = conn.query("select x from t").await?;
    ///     for row in &result {
    ///         println!("{:?}", row.get(0));
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let mut stmt = self.prepare(sql).await?;
        let columns = stmt.execute().await?.to_vec();
        let rows = stmt.fetch_all().await?;
        stmt.close().await?;
        Ok(QueryResult {
            columns,
            row_count: rows.len() as u64,
            rows,
        })
    }

    /// Open a row-by-row cursor over a query.
    ///
    /// The cursor takes exclusive access to the connection until dropped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sqream_thin_rs::{Connection, Cursor};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
    ///
    ///     let mut cursor = conn.open_cursor("select * from large_table").await?;
    ///     while let Some(row) = cursor.next().await? {
    ///         println!("{:?}", row);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn open_cursor(&mut self, sql: &str) -> Result<RowCursor<'_>> {
        let mut stmt = self.prepare(sql).await?;
        stmt.execute().await?;
        Ok(RowCursor::new(stmt))
    }

    /// Insert rows through a parameterized insert statement.
    ///
    /// Returns the number of rows inserted.
    pub async fn execute_many(&mut self, sql: &str, rows: &[Vec<SqreamValue>]) -> Result<u64> {
        let mut stmt = self.prepare(sql).await?;
        stmt.execute().await?;
        let kind = stmt.kind();
        if kind != Some(StatementKind::Insert) {
            stmt.close().await?;
            return Err(Error::invalid_state(format!(
                "execute_many needs an insert statement with parameters, got {:?}",
                kind
            )));
        }
        let inserted = stmt.put(rows).await?;
        stmt.close().await?;
        Ok(inserted)
    }

    /// Send a keep-alive ping. The server does not answer.
    pub async fn ping(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let result = self.stream.send_command(&Ping).await;
        self.settle(result).await
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<()> {
        if self.broken {
            return Ok(());
        }
        self.close_open_statement().await?;
        self.stream.send_command(&CloseConnection).await?;
        expect_ack(&self.stream.read_frame().await?, ACK_CONNECTION_CLOSED)?;
        self.stream.shutdown().await?;
        debug!(connection_id = self.session.connection_id, "connection closed");
        Ok(())
    }

    // --- Statement plumbing ---

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.broken {
            return Err(Error::invalid_state(
                "connection is broken after a fatal error; open a new one",
            ));
        }
        Ok(())
    }

    /// Borrow the stream, the open statement and the parameters together.
    pub(crate) fn parts(
        &mut self,
    ) -> Result<(&mut FrameStream, &mut StatementContext, &ConnectParams)> {
        let ctx = self
            .statement
            .as_mut()
            .ok_or_else(|| Error::invalid_state("no statement is open on this connection"))?;
        Ok((&mut self.stream, ctx, &self.params))
    }

    async fn close_open_statement(&mut self) -> Result<()> {
        match self.statement.as_mut() {
            Some(ctx) if !ctx.is_closed() => {
                debug!(statement_id = ?ctx.statement_id(), "closing previous statement");
                close_statement(&mut self.stream, ctx).await
            }
            _ => Ok(()),
        }
    }

    /// Apply the connection-level consequences of a statement step.
    ///
    /// Fatal errors poison the connection. A server error aborts the open
    /// statement, best-effort closing it so the connection stays usable.
    pub(crate) async fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_fatal() {
            warn!(error = %err, "connection is broken");
            self.broken = true;
            if let Some(ctx) = self.statement.as_mut() {
                ctx.close();
            }
        } else if err.kind() == ErrorKind::Server {
            debug!(error = %err, "aborting statement after server error");
            if let Some(ctx) = self.statement.as_mut() {
                if let Err(close_err) = close_statement(&mut self.stream, ctx).await {
                    if close_err.is_fatal() {
                        warn!(error = %close_err, "connection is broken");
                        self.broken = true;
                    }
                    ctx.close();
                }
            }
        }
        Err(err)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.params.host)
            .field("port", &self.params.port)
            .field("database", &self.session.database)
            .field("connection_id", &self.session.connection_id)
            .field("broken", &self.broken)
            .finish()
    }
}
