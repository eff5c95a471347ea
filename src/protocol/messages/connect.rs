//! Session-level commands.

use serde::Serialize;

use super::echo_command;

/// Open a session on a database.
#[derive(Debug, Serialize)]
pub struct ConnectDatabase<'a> {
    pub username: &'a str,
    pub password: &'a str,
    #[serde(rename = "connectDatabase")]
    pub database: &'a str,
    pub service: &'a str,
}

/// Re-attach a session on the worker a statement was redirected to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectDatabase<'a> {
    pub service: &'a str,
    #[serde(rename = "reconnectDatabase")]
    pub database: &'a str,
    pub connection_id: u64,
    pub listener_id: u64,
    pub username: &'a str,
    pub password: &'a str,
}

echo_command! {
    /// End the session.
    CloseConnection => "closeConnection"
}

echo_command! {
    /// Keep-alive. The server does not answer.
    Ping => "ping"
}
