//! MELSEC TCP client

use crate::correlation::Correlator;
use crate::manager::ConnectionManager;
use melsec_core::{ClientConfig, MelsecError, MelsecResult, RequestFrame, ResponseFrame};
use melsec_transport::Transport;
use std::sync::Arc;

/// TCP client for MELSEC communication
///
/// The client correlates concurrent requests with the responses the device
/// emits, strictly in send order. Many tasks may call
/// [`send_request`](MelsecClient::send_request) at once; each gets back
/// exactly one of {matching response, timeout error, connection error}.
///
/// The client is cheap to clone; clones share the same connection and
/// pending queue, and all methods take shared references.
///
/// # Example
///
/// ```rust,no_run
/// use melsec_client::MelsecClient;
/// use melsec_core::{ClientConfig, RequestFrame};
/// use melsec_transport::TcpTransport;
///
/// # async fn run(codec: impl melsec_transport::FrameCodec) -> melsec_core::MelsecResult<()> {
/// let config = ClientConfig::new("192.168.1.10", 5007);
/// let client = MelsecClient::new(config, TcpTransport::new(codec));
///
/// client.connect().await?;
/// let response = client.send_request(RequestFrame::new(&b"..."[..])).await?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MelsecClient {
    manager: Arc<ConnectionManager>,
    correlator: Arc<Correlator>,
}

impl MelsecClient {
    /// Create a client for the configured device using the given transport
    pub fn new(config: ClientConfig, transport: impl Transport) -> Self {
        let correlator = Arc::new(Correlator::new(config.request_timeout));
        let manager = Arc::new(ConnectionManager::new(
            config,
            Arc::new(transport),
            Arc::clone(&correlator),
        ));
        Self { manager, correlator }
    }

    /// Establish the connection
    ///
    /// Already connected is a no-op; a concurrent call joins the in-flight
    /// attempt rather than opening a second socket.
    ///
    /// # Errors
    /// `ConnectTimeout` or `ConnectFailure` if establishment fails; the
    /// client stays closed and a later `connect()` may retry.
    pub async fn connect(&self) -> MelsecResult<()> {
        self.manager.connect().await.map(|_| ())
    }

    /// Close the connection
    ///
    /// Requests still pending resolve with a connection error. A no-op when
    /// not connected.
    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
    }

    /// Send a request and await its correlated response
    ///
    /// Connects first if necessary. Resolves with exactly one of the
    /// response, `RequestTimeout` after the configured duration,
    /// `WriteFailure` if the frame could not be flushed, or
    /// `ConnectionFault` if the connection is lost while waiting.
    pub async fn send_request(&self, request: RequestFrame) -> MelsecResult<ResponseFrame> {
        let conn = self.manager.connect().await?;

        let completion = {
            // Holding the write lock across register+write keeps the pending
            // queue in wire order under concurrent senders.
            let mut sink = conn.sink.lock().await;
            let (seq, completion) = self.correlator.register();
            if let Err(e) = sink.write(request).await {
                if self.correlator.abandon(seq) {
                    return Err(e);
                }
                // A concurrent fault already resolved the slot; its result is
                // the definitive one.
            }
            completion
        };

        completion
            .await
            .unwrap_or_else(|_| Err(MelsecError::ConnectionFault("client closed".to_string())))
    }

    /// Whether a live connection currently exists
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Number of requests currently awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }
}
