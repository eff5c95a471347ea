//! Column-major batch encoding for `put` and decoding for `fetch`.

pub mod codec;
pub mod flush;
pub mod pack;
pub mod pool;
pub mod unpack;

pub use codec::ColumnCodec;
pub use flush::{plan_flushes, rows_per_flush};
pub use pack::{pack_batch, pack_column, validate_rows};
pub use pool::BufferPool;
pub use unpack::{decode_columns, into_rows, RawColumnBuffers};
