//! Statement lifecycle commands.

use serde::Serialize;

use super::echo_command;

echo_command! {
    /// Allocate a statement id.
    GetStatementId => "getStatementId"
}

/// Compile a statement on the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareStatement<'a> {
    pub prepare_statement: &'a str,
    pub chunk_size: u64,
}

/// Rebuild a statement on the worker after a redirect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructStatement {
    pub reconstruct_statement: u64,
}

echo_command! {
    /// Run the prepared statement.
    Execute => "execute"
}

echo_command! {
    /// Ask for the statement's input (insert parameter) columns.
    QueryTypeIn => "queryTypeIn"
}

echo_command! {
    /// Ask for the statement's result columns.
    QueryTypeOut => "queryTypeOut"
}

echo_command! {
    /// Release the statement.
    CloseStatement => "closeStatement"
}
