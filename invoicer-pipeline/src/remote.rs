//! Remote compilation over the render service's line/byte framing.
//!
//! ```text
//! client -> server: "begin_send" <len> "\n" <len raw bytes of LaTeX source>
//! server -> client: "success\n"
//! client -> server: <YYYY-MM-DD> "\n"
//! server -> client: "begin_send" <len> "\n" <len raw bytes of PDF>
//! client -> server: "success\n"          (only when all <len> bytes arrived)
//! ```
//!
//! The peer is trusted: no checksum, no retry. Any unexpected line or short
//! payload aborts the exchange and nothing is written. Timeouts and the
//! declared-length cap are local limits and do not change the framing.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::artifact::{persist_artifact, Artifact};
use crate::config::PipelineConfig;
use crate::error::{transport_err, RenderError, TransportFailure};

/// Prefix of both upload and download frame headers.
pub const FRAME_HEADER: &str = "begin_send";
/// Acknowledgement / confirmation line body.
pub const ACK: &str = "success";

const MAX_CONTROL_LINE: u64 = 4096;
const IO_CHUNK: usize = 64 * 1024;

/// Where an exchange is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    Connecting,
    AwaitingAck,
    SendingMetadata,
    AwaitingPayloadHeader,
    ReceivingPayload,
    Confirming,
    Done,
    Errored,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExchangeState::Connecting => "connecting",
            ExchangeState::AwaitingAck => "awaiting upload acknowledgement",
            ExchangeState::SendingMetadata => "sending invoice date",
            ExchangeState::AwaitingPayloadHeader => "awaiting payload header",
            ExchangeState::ReceivingPayload => "receiving payload",
            ExchangeState::Confirming => "confirming receipt",
            ExchangeState::Done => "done",
            ExchangeState::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// `begin_send<len>\n`
pub fn encode_header(len: usize) -> String {
    format!("{FRAME_HEADER}{len}\n")
}

/// Declared length of a `begin_send<len>` line, if it is one.
pub fn parse_header(line: &str) -> Option<u64> {
    line.trim_end_matches(['\r', '\n'])
        .strip_prefix(FRAME_HEADER)?
        .parse()
        .ok()
}

/// Local bounds applied to one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeLimits {
    /// Per read/write step. `None` waits forever.
    pub io_timeout: Option<Duration>,
    pub max_artifact_bytes: u64,
}

impl ExchangeLimits {
    pub fn from_config(config: &PipelineConfig) -> Self {
        ExchangeLimits {
            io_timeout: config.io_timeout(),
            max_artifact_bytes: config.max_artifact_bytes,
        }
    }
}

impl Default for ExchangeLimits {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

async fn bounded<T, F>(step: ExchangeState, limit: Option<Duration>, io: F) -> Result<T, RenderError>
where
    F: Future<Output = std::io::Result<T>>,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, io)
            .await
            .map_err(|_| transport_err(step, TransportFailure::TimedOut(limit)))?,
        None => io.await,
    };
    result.map_err(|e| transport_err(step, e))
}

// ---------------------------------------------------------------------------
// RemoteSession
// ---------------------------------------------------------------------------

/// One exchange over an already connected stream.
///
/// Generic over the transport so the framing can run over TCP or an
/// in-memory pipe.
pub struct RemoteSession<S> {
    stream: BufReader<S>,
    state: ExchangeState,
    limits: ExchangeLimits,
}

impl<S> RemoteSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream; the session starts at
    /// [`ExchangeState::AwaitingAck`].
    pub fn new(stream: S, limits: ExchangeLimits) -> Self {
        RemoteSession {
            stream: BufReader::new(stream),
            state: ExchangeState::AwaitingAck,
            limits,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Upload `source`, send the date, and download the compiled artifact.
    ///
    /// On success the session is in [`ExchangeState::Confirming`] and the
    /// payload has not been acknowledged yet; call [`Self::confirm`].
    pub async fn exchange(&mut self, source: &str, invoice_date: NaiveDate) -> Result<Vec<u8>, RenderError> {
        let result = self.run_exchange(source, invoice_date).await;
        if result.is_err() {
            self.state = ExchangeState::Errored;
        }
        result
    }

    /// Tell the server the payload arrived in full.
    pub async fn confirm(&mut self) -> Result<(), RenderError> {
        let result = self.send(format!("{ACK}\n").as_bytes()).await;
        self.state = match result {
            Ok(()) => ExchangeState::Done,
            Err(_) => ExchangeState::Errored,
        };
        result
    }

    async fn run_exchange(&mut self, source: &str, invoice_date: NaiveDate) -> Result<Vec<u8>, RenderError> {
        self.state = ExchangeState::AwaitingAck;
        let mut upload = encode_header(source.len()).into_bytes();
        upload.extend_from_slice(source.as_bytes());
        self.send(&upload).await?;
        tracing::debug!(bytes = source.len(), "uploaded source");

        let ack = self.read_control_line().await?;
        if ack.trim() != ACK {
            return Err(self.unexpected(format!("{ACK:?}"), ack));
        }

        self.state = ExchangeState::SendingMetadata;
        let date_line = format!("{}\n", invoice_date.format("%Y-%m-%d"));
        self.send(date_line.as_bytes()).await?;

        self.state = ExchangeState::AwaitingPayloadHeader;
        let header = self.read_control_line().await?;
        let declared = match parse_header(&header) {
            Some(len) => len,
            None => return Err(self.unexpected(format!("\"{FRAME_HEADER}<length>\""), header)),
        };
        if declared > self.limits.max_artifact_bytes {
            let expected = format!("a length of at most {} bytes", self.limits.max_artifact_bytes);
            return Err(self.unexpected(expected, header));
        }

        self.state = ExchangeState::ReceivingPayload;
        let payload = self.read_payload(declared).await?;
        let received = payload.len() as u64;
        tracing::debug!(declared, received, "received payload");

        self.state = ExchangeState::Confirming;
        if received != declared {
            return Err(transport_err(
                ExchangeState::ReceivingPayload,
                TransportFailure::LengthMismatch { declared, received },
            ));
        }
        Ok(payload)
    }

    /// Read up to `declared` bytes, stopping early at EOF. The I/O timeout
    /// bounds each read, not the whole transfer.
    async fn read_payload(&mut self, declared: u64) -> Result<Vec<u8>, RenderError> {
        let step = self.state;
        let limit = self.limits.io_timeout;
        let mut payload = Vec::with_capacity(declared.min(1024 * 1024) as usize);
        let mut chunk = vec![0u8; IO_CHUNK];
        while (payload.len() as u64) < declared {
            let want = (declared - payload.len() as u64).min(IO_CHUNK as u64) as usize;
            let read = bounded(step, limit, self.stream.read(&mut chunk[..want])).await?;
            if read == 0 {
                break;
            }
            payload.extend_from_slice(&chunk[..read]);
        }
        Ok(payload)
    }

    /// Write and flush `bytes`, one timeout per chunk.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        let step = self.state;
        let limit = self.limits.io_timeout;
        let stream = self.stream.get_mut();
        for chunk in bytes.chunks(IO_CHUNK) {
            bounded(step, limit, stream.write_all(chunk)).await?;
        }
        bounded(step, limit, stream.flush()).await
    }

    async fn read_control_line(&mut self) -> Result<String, RenderError> {
        let step = self.state;
        let mut line = String::new();
        let reader = (&mut self.stream).take(MAX_CONTROL_LINE);
        let read = bounded(step, self.limits.io_timeout, read_line(reader, &mut line)).await?;
        if read == 0 {
            return Err(transport_err(step, TransportFailure::Closed));
        }
        Ok(line)
    }

    fn unexpected(&self, expected: String, line: String) -> RenderError {
        RenderError::Protocol {
            step: self.state,
            expected,
            line: line.trim_end_matches(['\r', '\n']).to_string(),
        }
    }
}

async fn read_line<R: tokio::io::AsyncBufRead + Unpin>(mut reader: R, line: &mut String) -> std::io::Result<usize> {
    reader.read_line(line).await
}

// ---------------------------------------------------------------------------
// RemoteRenderClient
// ---------------------------------------------------------------------------

/// Renders through the remote service at a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct RemoteRenderClient {
    server: String,
    connect_timeout: Option<Duration>,
    limits: ExchangeLimits,
}

impl RemoteRenderClient {
    pub fn new(config: &PipelineConfig) -> Self {
        RemoteRenderClient {
            server: config.server.clone(),
            connect_timeout: config.connect_timeout(),
            limits: ExchangeLimits::from_config(config),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Open a session with the render service.
    pub async fn connect(&self) -> Result<RemoteSession<TcpStream>, RenderError> {
        let connect = TcpStream::connect(self.server.as_str());
        let stream = match self.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no connection within {limit:?}"),
                )),
            },
            None => connect.await,
        }
        .map_err(|source| RenderError::Connection {
            server: self.server.clone(),
            source,
        })?;
        tracing::debug!(server = %self.server, "connected to render service");
        Ok(RemoteSession::new(stream, self.limits))
    }

    /// Compile `source` remotely and write the PDF to `destination`.
    ///
    /// The destination is only written after the confirmation line has been
    /// sent.
    pub async fn render(
        &self,
        source: &str,
        invoice_date: NaiveDate,
        destination: &Path,
    ) -> Result<Artifact, RenderError> {
        tracing::info!(server = %self.server, "remote render started");
        let mut session = self.connect().await?;
        let payload = session.exchange(source, invoice_date).await?;
        session.confirm().await?;
        let artifact = persist_artifact(destination, payload).await?;
        tracing::debug!(sha256 = %artifact.sha256_hex(), bytes = artifact.len(), "remote artifact digest");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("begin_send42\n", Some(42))]
    #[case("begin_send0\n", Some(0))]
    #[case("begin_send17\r\n", Some(17))]
    #[case("begin_send17", Some(17))]
    #[case("begin_send\n", None)]
    #[case("begin_send 17\n", None)]
    #[case("begin_send-1\n", None)]
    #[case("success\n", None)]
    #[case("", None)]
    fn header_parsing(#[case] line: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_header(line), expected);
    }

    #[test]
    fn header_encoding_has_no_separator() {
        assert_eq!(encode_header(1234), "begin_send1234\n");
    }

    #[test]
    fn state_labels_name_the_step() {
        assert_eq!(ExchangeState::AwaitingPayloadHeader.to_string(), "awaiting payload header");
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).expect("date")
    }

    /// Reads one upload frame and returns the source text.
    async fn read_upload<R>(read: &mut BufReader<R>) -> String
    where
        R: AsyncRead + Unpin,
    {
        let mut header = String::new();
        read.read_line(&mut header).await.expect("header");
        let len = parse_header(&header).expect("upload header");
        let mut source = vec![0; len as usize];
        read.read_exact(&mut source).await.expect("source");
        String::from_utf8(source).expect("utf8")
    }

    #[tokio::test]
    async fn exchange_over_duplex_pipe() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            let source = read_upload(&mut read).await;
            write.write_all(b"success\n").await.expect("ack");
            let mut date_line = String::new();
            read.read_line(&mut date_line).await.expect("date");
            write.write_all(b"begin_send4\n%PDF").await.expect("payload");
            let mut confirm = String::new();
            read.read_line(&mut confirm).await.expect("confirm");
            (source, date_line, confirm)
        });

        let mut session = RemoteSession::new(client, ExchangeLimits::default());
        let payload = session.exchange("\\documentclass{dapper-invoice}", date()).await.expect("exchange");
        assert_eq!(payload, b"%PDF");
        assert_eq!(session.state(), ExchangeState::Confirming);
        session.confirm().await.expect("confirm");
        assert_eq!(session.state(), ExchangeState::Done);

        let (source, date_line, confirm) = peer.await.expect("peer");
        assert_eq!(source, "\\documentclass{dapper-invoice}");
        assert_eq!(date_line, "2024-01-15\n");
        assert_eq!(confirm, "success\n");
    }

    #[tokio::test]
    async fn rejected_upload_stops_at_acknowledgement() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            read_upload(&mut read).await;
            write.write_all(b"failure\n").await.expect("reply");
        });

        let mut session = RemoteSession::new(client, ExchangeLimits::default());
        let err = session.exchange("x", date()).await.unwrap_err();
        match err {
            RenderError::Protocol { step, line, .. } => {
                assert_eq!(step, ExchangeState::AwaitingAck);
                assert_eq!(line, "failure");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.state(), ExchangeState::Errored);
        peer.await.expect("peer");
    }

    #[tokio::test]
    async fn short_payload_is_length_mismatch() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            read_upload(&mut read).await;
            write.write_all(b"success\n").await.expect("ack");
            let mut date_line = String::new();
            read.read_line(&mut date_line).await.expect("date");
            write.write_all(b"begin_send10\nabc").await.expect("payload");
        });

        let mut session = RemoteSession::new(client, ExchangeLimits::default());
        let err = session.exchange("x", date()).await.unwrap_err();
        assert!(
            matches!(
                err,
                RenderError::Transport {
                    step: ExchangeState::ReceivingPayload,
                    reason: TransportFailure::LengthMismatch { declared: 10, received: 3 },
                }
            ),
            "got: {err}"
        );
        peer.await.expect("peer");
    }

    #[tokio::test]
    async fn oversized_declaration_is_refused() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            read_upload(&mut read).await;
            write.write_all(b"success\n").await.expect("ack");
            let mut date_line = String::new();
            read.read_line(&mut date_line).await.expect("date");
            write.write_all(b"begin_send2048\n").await.expect("header");
        });

        let limits = ExchangeLimits {
            io_timeout: None,
            max_artifact_bytes: 1024,
        };
        let mut session = RemoteSession::new(client, limits);
        let err = session.exchange("x", date()).await.unwrap_err();
        assert!(
            matches!(err, RenderError::Protocol { step: ExchangeState::AwaitingPayloadHeader, .. }),
            "got: {err}"
        );
        peer.await.expect("peer");
    }

    /// Serves the exchange up to the payload header, then drips `payload`
    /// one byte per `gap`.
    fn slow_peer(server: tokio::io::DuplexStream, payload: &'static [u8], gap: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut read = BufReader::new(read);
            read_upload(&mut read).await;
            write.write_all(b"success\n").await.expect("ack");
            let mut date_line = String::new();
            read.read_line(&mut date_line).await.expect("date");
            write
                .write_all(encode_header(payload.len()).as_bytes())
                .await
                .expect("header");
            for byte in payload {
                tokio::time::sleep(gap).await;
                write.write_all(&[*byte]).await.expect("byte");
            }
            let mut confirm = String::new();
            let _ = read.read_line(&mut confirm).await;
        })
    }

    #[tokio::test(start_paused = true)]
    async fn steady_payload_outlasts_the_io_timeout() {
        let (client, server) = tokio::io::duplex(4096);
        let peer = slow_peer(server, b"%PDF", Duration::from_secs(3));
        let limits = ExchangeLimits {
            io_timeout: Some(Duration::from_secs(5)),
            max_artifact_bytes: 1024,
        };

        let mut session = RemoteSession::new(client, limits);
        let payload = session.exchange("x", date()).await.expect("exchange");
        assert_eq!(payload, b"%PDF");
        session.confirm().await.expect("confirm");
        peer.await.expect("peer");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_payload_times_out() {
        let (client, server) = tokio::io::duplex(4096);
        let _peer = slow_peer(server, b"%PDF", Duration::from_secs(30));
        let limits = ExchangeLimits {
            io_timeout: Some(Duration::from_secs(5)),
            max_artifact_bytes: 1024,
        };

        let mut session = RemoteSession::new(client, limits);
        let err = session.exchange("x", date()).await.unwrap_err();
        assert!(
            matches!(
                err,
                RenderError::Transport {
                    step: ExchangeState::ReceivingPayload,
                    reason: TransportFailure::TimedOut(_),
                }
            ),
            "got: {err}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (client, _server) = tokio::io::duplex(4096);
        let limits = ExchangeLimits {
            io_timeout: Some(Duration::from_secs(5)),
            max_artifact_bytes: 1024,
        };
        let mut session = RemoteSession::new(client, limits);
        let err = session.exchange("x", date()).await.unwrap_err();
        assert!(
            matches!(
                err,
                RenderError::Transport {
                    step: ExchangeState::AwaitingAck,
                    reason: TransportFailure::TimedOut(_),
                }
            ),
            "got: {err}"
        );
    }
}
