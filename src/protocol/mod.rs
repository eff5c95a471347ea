//! SQream wire protocol implementation.

pub mod auth;
pub mod buffer;
pub mod codec;
pub mod columnar;
pub mod connect;
pub mod constants;
pub mod message;
pub mod messages;
pub mod packet;
pub mod response;
pub mod statement;
pub mod types;

pub use auth::{Credentials, Session};
pub use buffer::ReadBuffer;
pub use connect::{ConnectParams, Connector, RetryPolicy, TcpConnector};
pub use message::{Message, TextMessage, WriteExt};
pub use packet::{AsyncStream, BoxedStream, Frame, FrameHeader, FrameStream};
pub use statement::{StatementContext, StatementKind, StatementState};
pub use types::{ColumnInfo, ColumnMetadata, Decimal, Row, SqreamType, SqreamValue};
