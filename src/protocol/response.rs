//! Server response parsing.
//!
//! Every text response is a JSON object. An object carrying `"error"` is a
//! server-side failure regardless of which command it answers; anything else
//! must match the shape the command expects.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::packet::Frame;
use crate::protocol::types::ColumnDescriptor;

/// Answer to `connectDatabase`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub connection_id: u64,
    #[serde(default)]
    pub database_connected: Option<String>,
    #[serde(default)]
    pub varchar_encoding: Option<String>,
}

/// Answer to `getStatementId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementIdResponse {
    pub statement_id: u64,
}

/// Answer to `prepareStatement`, possibly redirecting to another worker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    #[serde(default)]
    pub ip: String,
    #[serde(default, rename = "listener_id")]
    pub listener_id: u64,
    #[serde(default)]
    pub port: u16,
    #[serde(default, rename = "port_ssl")]
    pub port_ssl: u16,
    #[serde(default)]
    pub reconnect: bool,
    #[serde(default)]
    pub statement_prepared: bool,
}

/// Answer to `queryTypeIn`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTypeInResponse {
    pub query_type: Vec<ColumnDescriptor>,
}

/// Answer to `queryTypeOut`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTypeOutResponse {
    pub query_type_named: Vec<ColumnDescriptor>,
}

/// Answer to `fetch`: row count and the size of every raw region.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    pub rows: usize,
    #[serde(rename = "colSzs", default)]
    pub col_szs: Vec<usize>,
}

/// Answers whose content does not matter (`reconnectDatabase`, `reconstructStatement`).
pub type Ignored = IgnoredAny;

/// Parse a text frame into the expected response type.
pub fn parse_response<T: DeserializeOwned>(frame: &Frame) -> Result<T> {
    let value = parse_object(frame)?;
    Ok(serde_json::from_value(value)?)
}

/// Check that a text frame is the acknowledgement `{"<key>": ...}`.
pub fn expect_ack(frame: &Frame, key: &str) -> Result<()> {
    let value = parse_object(frame)?;
    if value.get(key).is_none() {
        return Err(Error::protocol(format!(
            "Expected {:?} acknowledgement, got {}",
            key, value
        )));
    }
    Ok(())
}

fn parse_object(frame: &Frame) -> Result<Value> {
    let value: Value = serde_json::from_str(frame.text()?)?;
    if !value.is_object() {
        return Err(Error::protocol(format!("Expected a JSON object, got {}", value)));
    }
    if let Some(error) = value.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(Error::server(message));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{FRAME_KIND_BINARY, FRAME_KIND_TEXT, PROTOCOL_VERSION};
    use crate::protocol::packet::FrameHeader;
    use bytes::Bytes;

    fn frame(kind: u8, body: &'static str) -> Frame {
        Frame {
            header: FrameHeader {
                version: PROTOCOL_VERSION,
                kind,
                length: body.len(),
            },
            payload: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_parse_connect_response() {
        let f = frame(
            FRAME_KIND_TEXT,
            r#"{"connectionId":12,"databaseConnected":"databaseConnected","varcharEncoding":"cp874"}"#,
        );
        let resp: ConnectResponse = parse_response(&f).unwrap();
        assert_eq!(resp.connection_id, 12);
        assert_eq!(resp.varchar_encoding.as_deref(), Some("cp874"));
    }

    #[test]
    fn test_parse_prepare_response_with_redirect() {
        let f = frame(
            FRAME_KIND_TEXT,
            r#"{"ip":"10.0.0.2","listener_id":3,"port":5001,"port_ssl":5101,"reconnect":true,"statementPrepared":true}"#,
        );
        let resp: PrepareResponse = parse_response(&f).unwrap();
        assert!(resp.reconnect);
        assert_eq!(resp.ip, "10.0.0.2");
        assert_eq!(resp.listener_id, 3);
        assert_eq!(resp.port, 5001);
    }

    #[test]
    fn test_parse_fetch_response() {
        let f = frame(FRAME_KIND_TEXT, r#"{"colSzs":[3,12],"rows":3}"#);
        let resp: FetchResponse = parse_response(&f).unwrap();
        assert_eq!(resp.rows, 3);
        assert_eq!(resp.col_szs, vec![3, 12]);
    }

    #[test]
    fn test_error_key_is_server_error() {
        let f = frame(FRAME_KIND_TEXT, r#"{"error":"Table not found\nat line 1"}"#);
        let err = parse_response::<StatementIdResponse>(&f).unwrap_err();
        assert_eq!(err.server_headline(), Some("Table not found"));
        assert!(matches!(expect_ack(&f, "executed"), Err(Error::Server { .. })));
    }

    #[test]
    fn test_shape_errors() {
        let f = frame(FRAME_KIND_TEXT, r#"{"rows":"many"}"#);
        assert!(matches!(parse_response::<FetchResponse>(&f), Err(Error::Json(_))));

        let f = frame(FRAME_KIND_TEXT, r#"{"putted":"putted"}"#);
        assert!(expect_ack(&f, "putted").is_ok());
        assert!(matches!(expect_ack(&f, "executed"), Err(Error::Protocol { .. })));

        let f = frame(FRAME_KIND_TEXT, "[1]");
        assert!(parse_response::<Ignored>(&f).is_err());

        let f = frame(FRAME_KIND_BINARY, "{}");
        assert!(matches!(
            parse_response::<Ignored>(&f),
            Err(Error::UnexpectedFrameKind { .. })
        ));
    }
}
