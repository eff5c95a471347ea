//! Session handshake: `connectDatabase` and the redirect re-attach.

use std::fmt;

use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::codec::VarcharEncoding;
use crate::protocol::connect::ConnectParams;
use crate::protocol::messages::{ConnectDatabase, ReconnectDatabase, ReconstructStatement};
use crate::protocol::packet::FrameStream;
use crate::protocol::response::{parse_response, ConnectResponse, Ignored};

/// Authentication credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the server told us when the session opened.
#[derive(Debug, Clone)]
pub struct Session {
    /// Server-assigned connection id, needed to re-attach after a redirect.
    pub connection_id: u64,
    /// Encoding for VARCHAR columns.
    pub varchar_encoding: VarcharEncoding,
    /// Database the session is bound to.
    pub database: String,
}

/// Open a session on a freshly connected stream.
pub async fn open_session(
    stream: &mut FrameStream,
    params: &ConnectParams,
    creds: &Credentials,
) -> Result<Session> {
    stream
        .send_command(&ConnectDatabase {
            username: &creds.username,
            password: &creds.password,
            database: &params.database,
            service: &params.service,
        })
        .await?;

    let frame = stream.read_frame().await?;
    let resp: ConnectResponse = parse_response(&frame)?;
    let varchar_encoding = resp
        .varchar_encoding
        .as_deref()
        .map(VarcharEncoding::from_label)
        .unwrap_or_default();

    info!(
        connection_id = resp.connection_id,
        database = %params.database,
        encoding = %varchar_encoding,
        "session opened"
    );

    Ok(Session {
        connection_id: resp.connection_id,
        varchar_encoding,
        database: params.database.clone(),
    })
}

/// Re-attach the session and rebuild a statement on the worker a
/// `prepareStatement` redirected us to.
pub async fn reattach_session(
    stream: &mut FrameStream,
    params: &ConnectParams,
    creds: &Credentials,
    session: &Session,
    listener_id: u64,
    statement_id: u64,
) -> Result<()> {
    stream
        .send_command(&ReconnectDatabase {
            service: &params.service,
            database: &session.database,
            connection_id: session.connection_id,
            listener_id,
            username: &creds.username,
            password: &creds.password,
        })
        .await?;
    let frame = stream.read_frame().await?;
    parse_response::<Ignored>(&frame)?;

    stream
        .send_command(&ReconstructStatement {
            reconstruct_statement: statement_id,
        })
        .await?;
    let frame = stream.read_frame().await?;
    parse_response::<Ignored>(&frame)?;

    debug!(statement_id, listener_id, "statement reconstructed");
    Ok(())
}
