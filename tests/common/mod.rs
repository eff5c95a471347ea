//! In-memory SQream server for integration tests.
//!
//! Each connect through `MockConnector` spawns a server session on one end of
//! a `tokio::io::duplex` pipe. Sessions share one `MockState`, so tables,
//! statements and counters survive a redirect to another "worker".

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use sqream_thin_rs::{BoxedStream, ConnectParams, Connection, Connector, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

const TEXT: u8 = 1;
const BINARY: u8 = 2;

/// Column as the mock server describes it: `(name, wire type, size, scale, nullable)`.
#[derive(Debug, Clone)]
pub struct MockColumn {
    pub name: String,
    pub wire_type: &'static str,
    pub size: u32,
    pub scale: u32,
    pub nullable: bool,
}

impl MockColumn {
    fn is_var(&self) -> bool {
        self.wire_type == "ftBlob"
    }

    fn descriptor(&self, named: bool) -> Value {
        let mut desc = json!({
            "nullable": self.nullable,
            "isTrueVarChar": self.is_var(),
            "type": [self.wire_type, self.size, self.scale],
        });
        if named {
            desc["name"] = json!(self.name);
        }
        desc
    }
}

/// A table: its columns and every `put` payload received, in order.
#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<MockColumn>,
    pub chunks: Vec<(usize, Vec<u8>)>,
}

impl MockTable {
    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(|(rows, _)| rows).sum()
    }
}

/// Server-side state shared by every session.
#[derive(Debug)]
pub struct MockState {
    pub tables: HashMap<String, MockTable>,
    statements: HashMap<u64, String>,
    next_statement_id: u64,
    next_connection_id: u64,
    /// `(host, port)` of every connect attempt.
    pub connects: Vec<(String, u16)>,
    /// First key of every text command received.
    pub commands: Vec<String>,
    pub pings: usize,
    pub puts: usize,
    /// Protocol version stamped on responses.
    pub response_version: u8,
    /// Redirect the next `prepareStatement` to this worker.
    pub redirect_next_prepare: Option<(String, u16)>,
    /// Worker the load balancer at host `lb` hands out.
    pub lb_worker: (String, u16),
    /// Hold the `execute` answer back this long.
    pub execute_delay: Option<Duration>,
    /// Declare one byte more than is sent on the next data fetch.
    pub corrupt_next_fetch: bool,
    /// Fail this many connects before accepting.
    pub refuse_connects: u32,
    /// `varcharEncoding` announced on connect.
    pub varchar_encoding: &'static str,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            statements: HashMap::new(),
            next_statement_id: 1,
            next_connection_id: 1,
            connects: Vec::new(),
            commands: Vec::new(),
            pings: 0,
            puts: 0,
            response_version: 8,
            redirect_next_prepare: None,
            lb_worker: ("worker1".to_string(), 5000),
            execute_delay: None,
            corrupt_next_fetch: false,
            refuse_connects: 0,
            varchar_encoding: "ascii",
        }
    }
}

impl MockState {
    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|c| c.as_str() == command).count()
    }
}

/// Handle on a mock server.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            state: Arc::clone(&self.state),
        })
    }

    /// Default parameters: no retry pause, keep-alive on.
    pub fn params() -> ConnectParams {
        ConnectParams::new("mock", 5000, "master").with_retry(1, Duration::ZERO)
    }

    pub async fn connect(&self) -> Connection {
        self.connect_with(Self::params()).await
    }

    pub async fn connect_with(&self, params: ConnectParams) -> Connection {
        self.try_connect(params).await.unwrap()
    }

    pub async fn try_connect(&self, params: ConnectParams) -> Result<Connection> {
        Connection::connect_with_connector(&params, "sqream", "sqream", self.connector()).await
    }
}

struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl Connector for MockConnector {
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<BoxedStream>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock().unwrap();
                state.connects.push((host.to_string(), port));
                if state.refuse_connects > 0 {
                    state.refuse_connects -= 1;
                    return Err(sqream_thin_rs::Error::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    )));
                }
            }

            let (client, server) = tokio::io::duplex(1 << 20);
            let state = Arc::clone(&self.state);
            if host == "lb" {
                tokio::spawn(answer_load_balancer(server, state));
            } else {
                tokio::spawn(serve(server, state));
            }
            Ok(Box::new(client) as BoxedStream)
        })
    }
}

async fn answer_load_balancer(mut io: DuplexStream, state: Arc<Mutex<MockState>>) {
    let (ip, port) = state.lock().unwrap().lb_worker.clone();
    let mut reply = (ip.len() as i32).to_le_bytes().to_vec();
    reply.extend_from_slice(ip.as_bytes());
    reply.extend_from_slice(&(port as i32).to_le_bytes());
    let _ = io.write_all(&reply).await;
}

async fn read_frame(io: &mut DuplexStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 10];
    io.read_exact(&mut header).await.ok()?;
    assert_eq!(header[0], 8, "client must send protocol version 8");
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[2..]);
    let mut payload = vec![0u8; i64::from_le_bytes(len) as usize];
    io.read_exact(&mut payload).await.ok()?;
    Some((header[1], payload))
}

async fn write_frame(io: &mut DuplexStream, version: u8, kind: u8, payload: &[u8]) {
    let mut buf = vec![version, kind];
    buf.extend_from_slice(&(payload.len() as i64).to_le_bytes());
    buf.extend_from_slice(payload);
    let _ = io.write_all(&buf).await;
}

/// What the statement open in a session is doing.
#[derive(Debug, Default)]
struct SessionStatement {
    id: u64,
    sql: String,
    fetch_pos: usize,
}

async fn serve(mut io: DuplexStream, state: Arc<Mutex<MockState>>) {
    let mut stmt = SessionStatement::default();

    while let Some((kind, payload)) = read_frame(&mut io).await {
        assert_eq!(kind, TEXT, "unexpected binary frame");
        let msg: Value = serde_json::from_slice(&payload).unwrap();
        let obj = msg.as_object().unwrap();
        let key = if obj.contains_key("connectDatabase") {
            "connectDatabase".to_string()
        } else if obj.contains_key("reconnectDatabase") {
            "reconnectDatabase".to_string()
        } else {
            obj.keys().next().cloned().unwrap_or_default()
        };

        let version = {
            let mut s = state.lock().unwrap();
            s.commands.push(key.clone());
            s.response_version
        };

        let reply: Option<Value> = match key.as_str() {
            "connectDatabase" => {
                let (id, encoding) = {
                    let mut s = state.lock().unwrap();
                    s.next_connection_id += 1;
                    (s.next_connection_id - 1, s.varchar_encoding)
                };
                Some(json!({
                    "connectionId": id,
                    "databaseConnected": "databaseConnected",
                    "varcharEncoding": encoding,
                }))
            }
            "reconnectDatabase" => Some(json!({"databaseConnected": "databaseConnected"})),
            "reconstructStatement" => {
                let id = msg["reconstructStatement"].as_u64().unwrap();
                let sql = state.lock().unwrap().statements.get(&id).cloned();
                match sql {
                    Some(sql) => {
                        stmt = SessionStatement { id, sql, fetch_pos: 0 };
                        Some(json!({"statementReconstructed": "statementReconstructed"}))
                    }
                    None => Some(json!({"error": format!("Statement {} not found", id)})),
                }
            }
            "getStatementId" => {
                let id = {
                    let mut s = state.lock().unwrap();
                    s.next_statement_id += 1;
                    s.next_statement_id - 1
                };
                stmt = SessionStatement { id, ..Default::default() };
                Some(json!({"statementId": id}))
            }
            "prepareStatement" => {
                let sql = msg["prepareStatement"].as_str().unwrap().trim().to_lowercase();
                let redirect = {
                    let mut s = state.lock().unwrap();
                    s.statements.insert(stmt.id, sql.clone());
                    s.redirect_next_prepare.take()
                };
                stmt.sql = sql;
                Some(match redirect {
                    Some((ip, port)) => json!({
                        "ip": ip, "listener_id": 1, "port": port, "port_ssl": port + 100,
                        "reconnect": true, "statementPrepared": true
                    }),
                    None => json!({
                        "ip": "", "listener_id": 0, "port": 0, "port_ssl": 0,
                        "reconnect": false, "statementPrepared": true
                    }),
                })
            }
            "execute" => {
                let delay = state.lock().unwrap().execute_delay;
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let reply = {
                    let mut s = state.lock().unwrap();
                    execute(&stmt.sql, &mut s)
                };
                Some(reply)
            }
            "queryTypeIn" => {
                let columns: Vec<Value> = {
                    let s = state.lock().unwrap();
                    table_for(&stmt.sql, "insert into", &s)
                        .map(|t| t.columns.iter().map(|c| c.descriptor(false)).collect())
                        .unwrap_or_default()
                };
                Some(json!({"queryType": columns}))
            }
            "queryTypeOut" => {
                let columns: Vec<Value> = {
                    let s = state.lock().unwrap();
                    table_for(&stmt.sql, "from", &s)
                        .filter(|_| stmt.sql.starts_with("select"))
                        .map(|t| t.columns.iter().map(|c| c.descriptor(true)).collect())
                        .unwrap_or_default()
                };
                Some(json!({"queryTypeNamed": columns}))
            }
            "put" => {
                let rows = msg["put"].as_u64().unwrap() as usize;
                let (kind, data) = read_frame(&mut io).await.unwrap();
                assert_eq!(kind, BINARY, "put payload must be binary");
                {
                    let mut s = state.lock().unwrap();
                    s.puts += 1;
                    let name = table_name(&stmt.sql, "insert into");
                    s.tables.get_mut(&name).unwrap().chunks.push((rows, data));
                }
                Some(json!({"putted": "putted"}))
            }
            "fetch" => {
                let next = {
                    let mut s = state.lock().unwrap();
                    let corrupt = std::mem::take(&mut s.corrupt_next_fetch);
                    let table = table_for(&stmt.sql, "from", &s).cloned();
                    table.and_then(|t| {
                        let (rows, data) = t.chunks.get(stmt.fetch_pos)?.clone();
                        let mut sizes = region_sizes(&t.columns, rows, &data);
                        if corrupt {
                            if let Some(last) = sizes.last_mut() {
                                *last += 1;
                            }
                        }
                        Some((rows, sizes, data))
                    })
                };
                match next {
                    Some((rows, sizes, data)) => {
                        stmt.fetch_pos += 1;
                        let head = json!({"rows": rows, "colSzs": sizes}).to_string();
                        write_frame(&mut io, version, TEXT, head.as_bytes()).await;
                        write_frame(&mut io, version, BINARY, &data).await;
                        None
                    }
                    None => Some(json!({"rows": 0, "colSzs": []})),
                }
            }
            "closeStatement" => Some(json!({"statementClosed": "statementClosed"})),
            "closeConnection" => {
                let reply = json!({"connectionClosed": "connectionClosed"}).to_string();
                write_frame(&mut io, version, TEXT, reply.as_bytes()).await;
                return;
            }
            "ping" => {
                state.lock().unwrap().pings += 1;
                None
            }
            other => Some(json!({"error": format!("Unknown command {}", other)})),
        };

        if let Some(reply) = reply {
            write_frame(&mut io, version, TEXT, reply.to_string().as_bytes()).await;
        }
    }
}

fn execute(sql: &str, state: &mut MockState) -> Value {
    if sql.starts_with("fail") {
        return json!({"error": "Syntax error near 'fail'\nat line 1, column 1"});
    }
    if let Some(rest) = sql.strip_prefix("create table ") {
        let (name, columns) = match rest.split_once('(') {
            Some((name, body)) => (name.trim().to_string(), parse_columns(body)),
            None => return json!({"error": "missing column list"}),
        };
        state.tables.insert(name, MockTable { columns, chunks: Vec::new() });
    } else if sql.starts_with("insert") || sql.starts_with("select") {
        let marker = if sql.starts_with("insert") { "insert into" } else { "from" };
        let name = table_name(sql, marker);
        if !state.tables.contains_key(&name) {
            return json!({"error": format!("Table {} not found\nat line 1", name)});
        }
    }
    json!({"executed": "executed"})
}

fn table_name(sql: &str, marker: &str) -> String {
    sql.split_once(marker)
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(|name| name.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .unwrap_or_default()
        .to_string()
}

fn table_for<'s>(sql: &str, marker: &str, state: &'s MockState) -> Option<&'s MockTable> {
    state.tables.get(&table_name(sql, marker))
}

/// Parse `x int, s varchar(10) not null, n numeric(38,2)` (up to the closing paren).
fn parse_columns(body: &str) -> Vec<MockColumn> {
    let body = body.trim().strip_suffix(')').unwrap_or(body);
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    for ch in body.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);

    parts
        .iter()
        .map(|part| {
            let part = part.trim();
            let (name, ty) = part.split_once(' ').unwrap();
            let nullable = !ty.contains("not null");
            let ty = ty.replace("not null", "");
            let ty = ty.trim();
            let (wire_type, size, scale) = match ty {
                "bool" => ("ftBool", 1, 0),
                "tinyint" => ("ftUByte", 1, 0),
                "smallint" => ("ftShort", 2, 0),
                "int" => ("ftInt", 4, 0),
                "bigint" => ("ftLong", 8, 0),
                "real" => ("ftFloat", 4, 0),
                "double" => ("ftDouble", 8, 0),
                "date" => ("ftDate", 4, 0),
                "datetime" => ("ftDateTime", 8, 0),
                "text" => ("ftBlob", 0, 0),
                other if other.starts_with("varchar(") => {
                    let n = other["varchar(".len()..other.len() - 1].parse().unwrap();
                    ("ftVarchar", n, 0)
                }
                other if other.starts_with("numeric(") => {
                    let args = &other["numeric(".len()..other.len() - 1];
                    let scale = args.split(',').nth(1).unwrap().trim().parse().unwrap();
                    ("ftNumeric", 16, scale)
                }
                other => panic!("mock server does not know type {}", other),
            };
            MockColumn {
                name: name.to_string(),
                wire_type,
                size,
                scale,
                nullable,
            }
        })
        .collect()
}

/// Split a packed `put` payload back into the region sizes a fetch reports.
fn region_sizes(columns: &[MockColumn], rows: usize, data: &[u8]) -> Vec<usize> {
    let mut sizes = Vec::new();
    let mut offset = 0;
    for column in columns {
        if column.nullable {
            sizes.push(rows);
            offset += rows;
        }
        if column.is_var() {
            let lengths = &data[offset..offset + 4 * rows];
            let total: usize = lengths
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
                .sum();
            sizes.push(4 * rows);
            sizes.push(total);
            offset += 4 * rows + total;
        } else {
            let width = column.size as usize * rows;
            sizes.push(width);
            offset += width;
        }
    }
    assert_eq!(offset, data.len(), "put payload does not match the table columns");
    sizes
}
