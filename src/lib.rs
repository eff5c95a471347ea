//! SQream Thin Client for Rust
//!
//! A pure Rust client for SQream DB that speaks the native columnar wire
//! protocol directly: JSON commands in text frames, column-major row data in
//! binary frames.
//!
//! # Example
//!
//! ```no_run
//! use sqream_thin_rs::{Connection, Result, SqreamValue};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut conn = Connection::connect("localhost:5000/master", "sqream", "sqream").await?;
//!
//!     conn.execute("create or replace table t (x int, s text)").await?;
//!     conn.execute_many(
//!         "insert into t values (?, ?)",
//!         &[vec![1i32.into(), "one".into()], vec![2i32.into(), SqreamValue::Null]],
//!     )
//!     .await?;
//!
//!     let result = conn.query("select x, s from t").await?;
//!     for row in &result {
//!         println!("{:?} {:?}", row.get(0), row.get_by_name("s"));
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod cursor;
pub mod error;
pub mod protocol;
pub mod statement;

// Re-export main types
pub use connection::{Connection, QueryResult};
pub use cursor::{Cursor, CursorStreamExt, RowCursor};
pub use error::{Error, ErrorKind, Result};
pub use protocol::codec::VarcharEncoding;
pub use protocol::connect::{ConnectParams, Connector, RetryPolicy, TcpConnector};
pub use protocol::packet::{AsyncStream, BoxedStream};
pub use protocol::statement::{StatementKind, StatementState};
pub use protocol::types::{
    ColumnInfo, ColumnMetadata, Decimal, Row, SqreamType, SqreamValue,
};
pub use statement::Statement;
