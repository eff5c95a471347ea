//! Fetch command for retrieving the next batch of a result set.

use super::echo_command;

echo_command! {
    /// Request the next batch. The server answers with row count and
    /// region sizes, then a binary frame when rows > 0.
    Fetch => "fetch"
}
