//! Connection parameters and transport establishment.
//!
//! Opening a connection is two steps: get a byte stream to a SQream worker
//! (optionally asking a load balancer which worker to use), then run the
//! `connectDatabase` handshake over it (see `auth`).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::constants::*;
use crate::protocol::packet::BoxedStream;

/// How often and how patiently to retry a failed connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Host address (a worker, or the load balancer when `clustered`).
    pub host: String,
    /// Port number.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Service (worker pool) name.
    pub service: String,
    /// Whether `host:port` is a load balancer that hands out workers.
    pub clustered: bool,
    /// TCP connection timeout (default: 20 seconds).
    pub connect_timeout: Duration,
    /// Retry policy for initial connects and redirects.
    pub retry: RetryPolicy,
    /// Keep-alive ping interval while waiting on long server calls; `None` disables.
    pub keepalive_interval: Option<Duration>,
    /// `chunkSize` sent with `prepareStatement`.
    pub chunk_size: u64,
    /// Target packed bytes per `put` flush.
    pub flush_bytes: usize,
    /// Upper bound on rows per `put` flush.
    pub max_rows_per_flush: usize,
    /// Pack insert columns on the rayon thread pool.
    pub parallel_packing: bool,
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            service: DEFAULT_SERVICE.to_string(),
            clustered: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            chunk_size: DEFAULT_CHUNK_SIZE,
            flush_bytes: DEFAULT_FLUSH_BYTES,
            max_rows_per_flush: DEFAULT_MAX_ROWS_PER_FLUSH,
            parallel_packing: false,
        }
    }

    /// Set the connection timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use sqream_thin_rs::ConnectParams;
    /// use std::time::Duration;
    ///
    /// let params = ConnectParams::new("localhost", 5000, "master")
    ///     .with_connect_timeout(Duration::from_secs(5));
    /// ```
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Treat `host:port` as a load balancer.
    pub fn with_clustered(mut self, clustered: bool) -> Self {
        self.clustered = clustered;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.retry = RetryPolicy { attempts, interval };
        self
    }

    /// Set or disable the keep-alive interval.
    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the `chunkSize` sent with `prepareStatement`.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the packed-bytes target per insert flush.
    pub fn with_flush_bytes(mut self, bytes: usize) -> Self {
        self.flush_bytes = bytes;
        self
    }

    /// Cap rows per insert flush.
    pub fn with_max_rows_per_flush(mut self, rows: usize) -> Self {
        self.max_rows_per_flush = rows;
        self
    }

    /// Pack insert columns in parallel.
    pub fn with_parallel_packing(mut self, parallel: bool) -> Self {
        self.parallel_packing = parallel;
        self
    }

    /// Parse a connection string like "host:port/database".
    pub fn parse(conn_str: &str) -> Result<Self> {
        // Format: host:port/database or host/database (default port 5000)
        let (addr_part, database) =
            conn_str
                .split_once('/')
                .ok_or_else(|| Error::InvalidConnectString {
                    message: "Expected format: host:port/database".to_string(),
                })?;

        if database.is_empty() {
            return Err(Error::InvalidConnectString {
                message: "Database name is empty".to_string(),
            });
        }

        let (host, port) = if let Some((h, p)) = addr_part.split_once(':') {
            let port = p.parse::<u16>().map_err(|_| Error::InvalidConnectString {
                message: format!("Invalid port: {}", p),
            })?;
            (h.to_string(), port)
        } else {
            (addr_part.to_string(), DEFAULT_PORT)
        };

        if host.is_empty() {
            return Err(Error::InvalidConnectString {
                message: "Host is empty".to_string(),
            });
        }

        Ok(Self::new(host, port, database))
    }
}

/// Opens transport streams.
///
/// The default `TcpConnector` speaks plain TCP; tests and TLS setups plug in
/// their own.
pub trait Connector: Send + Sync {
    /// Open a stream to `host:port` within `timeout`.
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<BoxedStream>>;
}

/// Plain TCP connector with DNS and connect timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        connect_timeout: Duration,
    ) -> BoxFuture<'a, Result<BoxedStream>> {
        Box::pin(async move {
            let tcp = tcp_connect(host, port, connect_timeout).await?;
            Ok(Box::new(tcp) as BoxedStream)
        })
    }
}

async fn tcp_connect(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let timed_out = || Error::ConnectionTimeout {
        host: host.to_string(),
        port,
        timeout: connect_timeout,
    };

    // Step 1: DNS resolution with timeout
    let addr_str = format!("{}:{}", host, port);
    let addrs = timeout(connect_timeout, lookup_host(&addr_str))
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| {
            // Check if this is a DNS-specific error
            if e.kind() == std::io::ErrorKind::NotFound
                || e.to_string().contains("could not resolve")
                || e.to_string().contains("Name or service not known")
                || e.to_string().contains("nodename nor servname provided")
                || e.to_string().contains("failed to lookup address")
            {
                Error::DnsResolutionFailed {
                    hostname: host.to_string(),
                    message: e.to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

    // Step 2: Try each resolved address with timeout
    let mut last_error = None;
    for addr in addrs {
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(tcp_stream)) => {
                tcp_stream.set_nodelay(true)?;
                debug!(%addr, "tcp connected");
                return Ok(tcp_stream);
            }
            Ok(Err(e)) => {
                last_error = Some(Error::Io(e));
            }
            Err(_) => return Err(timed_out()),
        }
    }

    Err(last_error.unwrap_or_else(|| Error::DnsResolutionFailed {
        hostname: host.to_string(),
        message: "No addresses returned".to_string(),
    }))
}

/// Connect, retrying connection-level failures per the policy.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    host: &str,
    port: u16,
    params: &ConnectParams,
) -> Result<BoxedStream> {
    let attempts = params.retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match connector.connect(host, port, params.connect_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == ErrorKind::Connection && attempt < attempts => {
                warn!(host, port, attempt, error = %e, "connect failed, retrying");
                tokio::time::sleep(params.retry.interval).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Ask a load balancer which worker to use.
///
/// The answer is `i32 LE length, ip bytes, i32 LE port`.
pub async fn read_worker_address(stream: &mut BoxedStream) -> Result<(String, u16)> {
    let mut len_bytes = [0u8; 4];
    read_exact(stream, &mut len_bytes).await?;
    let ip_len = i32::from_le_bytes(len_bytes);
    let ip_len = usize::try_from(ip_len)
        .map_err(|_| Error::protocol(format!("Load balancer sent ip length {}", ip_len)))?;

    let mut rest = vec![0u8; ip_len + 4];
    read_exact(stream, &mut rest).await?;
    let mut buf = ReadBuffer::new(Bytes::from(rest));
    let ip_bytes = buf.read_bytes(ip_len)?;
    let ip = std::str::from_utf8(&ip_bytes)
        .map_err(|_| Error::protocol("Load balancer sent a non-UTF-8 address"))?
        .to_string();
    let port = buf.read_i32_le()?;
    let port = u16::try_from(port)
        .map_err(|_| Error::protocol(format!("Load balancer sent port {}", port)))?;
    Ok((ip, port))
}

async fn read_exact(stream: &mut BoxedStream, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Open the transport for a new connection, following the load balancer if clustered.
pub async fn open_transport(
    connector: &Arc<dyn Connector>,
    params: &ConnectParams,
) -> Result<BoxedStream> {
    let stream = connect_with_retry(connector.as_ref(), &params.host, params.port, params).await?;
    if !params.clustered {
        return Ok(stream);
    }

    let mut lb = stream;
    let (ip, port) = read_worker_address(&mut lb).await?;
    drop(lb);
    debug!(%ip, port, "load balancer assigned worker");
    connect_with_retry(connector.as_ref(), &ip, port, params).await
}
