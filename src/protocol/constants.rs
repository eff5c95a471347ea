//! SQream wire protocol constants.

use std::time::Duration;

// Framing
pub const PROTOCOL_VERSION: u8 = 8;
pub const SUPPORTED_PROTOCOL_VERSIONS: &[u8] = &[6, 7, 8];
pub const FRAME_HEADER_SIZE: usize = 10;
pub const FRAME_KIND_TEXT: u8 = 1;
pub const FRAME_KIND_BINARY: u8 = 2;
pub const MAX_FRAME_SIZE: usize = 1 << 31;

// Connection defaults
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SERVICE: &str = "sqream";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

// Statement defaults
pub const DEFAULT_CHUNK_SIZE: u64 = 0;
pub const DEFAULT_FLUSH_BYTES: usize = 100_000_000;
pub const DEFAULT_MAX_ROWS_PER_FLUSH: usize = 1_000_000;

// Server replies that carry no data beyond an acknowledgement
pub const ACK_EXECUTED: &str = "executed";
pub const ACK_PUTTED: &str = "putted";
pub const ACK_STATEMENT_CLOSED: &str = "statementClosed";
pub const ACK_CONNECTION_CLOSED: &str = "connectionClosed";

// Varchar encoding assumed when the server does not name one
pub const DEFAULT_VARCHAR_ENCODING: &str = "ascii";

// Null bitmap markers
pub const NULL_MARKER: u8 = 1;
pub const PRESENT_MARKER: u8 = 0;

// Numeric precision limits
pub const MAX_NUMERIC_DIGITS: u32 = 38;
pub const MAX_NUMERIC_SCALE: u32 = 38;
// Largest scale (or power-of-ten shift) a parsed decimal literal may carry
pub const MAX_DECIMAL_LITERAL_SCALE: u32 = 4_096;

// Milliseconds in a day (exclusive upper bound of the datetime time part)
pub const MILLIS_PER_DAY: i64 = 86_400_000;
