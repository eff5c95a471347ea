//! Cursor for iterating over query results with buffering.
//!
//! The `Cursor` trait defines the common interface, while `RowCursor`
//! yields rows one at a time from fetch batches of an executed statement.

use std::collections::VecDeque;
use std::future::Future;

use futures::Stream;

use crate::error::Result;
use crate::protocol::types::{ColumnMetadata, Row};
use crate::statement::Statement;

/// Base trait for all cursor types.
///
/// The cursor holds a mutable borrow of the connection, ensuring only one
/// active cursor per connection at a time.
///
/// # Example
///
/// ```no_run
/// use sqream_thin_rs::{Connection, Cursor, Row};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
///
///     // Generic function that works with any cursor type
///     async fn count_rows<C: Cursor<Item = Row>>(cursor: &mut C) -> u64 {
///         let mut count = 0;
///         while let Some(_) = cursor.next().await.unwrap() {
///             count += 1;
///         }
///         count
///     }
///
///     let mut cursor = conn.open_cursor("select * from users").await?;
///     let total = count_rows(&mut cursor).await;
///
///     Ok(())
/// }
/// ```
pub trait Cursor {
    /// The type of item this cursor yields.
    type Item;

    /// Column metadata for this cursor.
    fn columns(&self) -> &[ColumnMetadata];

    /// Number of rows fetched from the server so far.
    fn rowcount(&self) -> u64;

    /// Whether the underlying statement is closed.
    fn is_closed(&self) -> bool;

    /// Whether more items may be available (buffered or on server).
    fn has_more(&self) -> bool;

    /// Close the cursor and release server resources.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Get the next item, fetching from server if buffer exhausted.
    ///
    /// Returns `Ok(None)` when exhausted.
    fn next(&mut self) -> impl Future<Output = Result<Option<Self::Item>>> + Send;

    /// Get up to `n` items. Fewer than `n` means the cursor is exhausted.
    fn fetch_many(&mut self, n: usize) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;

    /// Fetch all remaining items into a vector.
    ///
    /// The cursor is closed after this call.
    fn fetch_all(&mut self) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;
}

/// Row-by-row cursor over an executed select.
///
/// # Lifecycle
///
/// 1. Created by `Connection::open_cursor()`
/// 2. Iterated via `next()`, `fetch_many()` or `fetch_all()`
/// 3. Closed when exhausted or explicitly via `close()`
pub struct RowCursor<'conn> {
    stmt: Statement<'conn>,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl<'conn> RowCursor<'conn> {
    pub(crate) fn new(stmt: Statement<'conn>) -> Self {
        let exhausted = stmt.is_closed();
        Self {
            stmt,
            buffer: VecDeque::new(),
            exhausted,
        }
    }

    /// Refill the buffer with the next batch. Returns false at end of data.
    async fn do_fetch(&mut self) -> Result<bool> {
        match self.stmt.fetch().await? {
            Some(rows) => {
                self.buffer.extend(rows);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.stmt.columns().iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn num_columns(&self) -> usize {
        self.stmt.columns().len()
    }

    /// Get the number of rows currently buffered.
    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }
}

impl<'conn> Cursor for RowCursor<'conn> {
    type Item = Row;

    fn columns(&self) -> &[ColumnMetadata] {
        self.stmt.columns()
    }

    fn rowcount(&self) -> u64 {
        self.stmt.rows_fetched()
    }

    fn is_closed(&self) -> bool {
        self.stmt.is_closed()
    }

    fn has_more(&self) -> bool {
        !self.buffer.is_empty() || !self.exhausted
    }

    async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.exhausted = true;
        self.stmt.close().await
    }

    async fn next(&mut self) -> Result<Option<Self::Item>> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Ok(Some(row));
            }
            if self.exhausted || !self.do_fetch().await? {
                return Ok(None);
            }
        }
    }

    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Self::Item>> {
        while self.buffer.len() < n && !self.exhausted {
            self.do_fetch().await?;
        }
        let take = n.min(self.buffer.len());
        Ok(self.buffer.drain(..take).collect())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Self::Item>> {
        while !self.exhausted {
            self.do_fetch().await?;
        }
        Ok(std::mem::take(&mut self.buffer).into())
    }
}

/// Extension trait for converting Cursor to Stream.
///
/// # Example
///
/// ```no_run
/// use sqream_thin_rs::{Connection, CursorStreamExt};
/// use futures::stream::TryStreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
///
///     let cursor = conn.open_cursor("select name from users").await?;
///     let names: Vec<String> = cursor.into_stream()
///         .map_ok(|row| row.get(0).map(|v| v.to_string()).unwrap_or_default())
///         .try_collect()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub trait CursorStreamExt: Cursor + Sized {
    /// Convert this cursor into a Stream yielding `Result<Item>`.
    ///
    /// The stream takes ownership of the cursor and ends after the first error.
    fn into_stream(self) -> impl Stream<Item = Result<Self::Item>>;
}

impl<C: Cursor + Unpin> CursorStreamExt for C {
    fn into_stream(self) -> impl Stream<Item = Result<Self::Item>> {
        use futures::stream;

        stream::unfold(Some(self), |opt_cursor| async move {
            let mut cursor = opt_cursor?;
            match cursor.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(cursor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
