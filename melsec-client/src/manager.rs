//! Connection lifecycle management
//!
//! The manager owns the single live connection handle and serializes all
//! state transitions. Concurrent `connect()` calls while an attempt is in
//! flight join that attempt instead of opening a second socket
//! (single-flight), and all of them observe the same outcome.

use crate::correlation::Correlator;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use melsec_core::{ClientConfig, MelsecError, MelsecResult};
use melsec_transport::{EventStream, FrameSink, Transport, TransportEvent};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// A live connection: the write side of one open transport connection
///
/// The generation `id` distinguishes this connection from its successors so
/// that a fault reported by an old delivery task cannot tear down a newer
/// connection.
pub(crate) struct Connection {
    id: u64,
    pub(crate) sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
}

impl Connection {
    async fn close(&self) {
        self.sink.lock().await.close().await;
    }
}

/// Shared handle to an in-flight connect attempt
type ConnectFuture = Shared<BoxFuture<'static, MelsecResult<Arc<Connection>>>>;

/// Connection state, owned exclusively by the manager
enum ConnectionState {
    /// No connection and none ever attempted
    Idle,
    /// An attempt is in flight; joiners await its shared result
    Connecting(ConnectFuture),
    /// Exactly one live connection handle exists
    Connected(Arc<Connection>),
    /// Connection closed or last attempt failed; a fresh attempt may follow
    Closed,
}

pub(crate) struct ConnectionManager {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    state: Mutex<ConnectionState>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        correlator: Arc<Correlator>,
    ) -> Self {
        Self {
            config,
            transport,
            correlator,
            state: Mutex::new(ConnectionState::Idle),
            next_id: AtomicU64::new(1),
        }
    }

    /// Obtain the live connection handle, establishing one if necessary
    ///
    /// Returns the cached handle when connected, joins the in-flight attempt
    /// when one exists, and otherwise starts a new attempt.
    pub(crate) async fn connect(self: &Arc<Self>) -> MelsecResult<Arc<Connection>> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            if let ConnectionState::Connected(conn) = &*state {
                return Ok(Arc::clone(conn));
            }
            if let ConnectionState::Connecting(attempt) = &*state {
                attempt.clone()
            } else {
                let attempt = self.spawn_connect();
                *state = ConnectionState::Connecting(attempt.clone());
                attempt
            }
        };
        attempt.await
    }

    /// Close the live connection, failing anything still pending
    ///
    /// A no-op when already closed or never connected. If an attempt is in
    /// flight, waits for it and closes whatever it produced so no orphan
    /// socket survives.
    pub(crate) async fn disconnect(&self) {
        loop {
            enum Action {
                Close(Arc<Connection>),
                Wait(ConnectFuture),
            }

            let action = {
                let mut state = self.state.lock().unwrap();
                if matches!(&*state, ConnectionState::Connected(_)) {
                    match mem::replace(&mut *state, ConnectionState::Closed) {
                        ConnectionState::Connected(conn) => Action::Close(conn),
                        _ => unreachable!(),
                    }
                } else if let ConnectionState::Connecting(attempt) = &*state {
                    Action::Wait(attempt.clone())
                } else {
                    return;
                }
            };

            match action {
                Action::Close(conn) => {
                    conn.close().await;
                    self.correlator.fail_all("connection closed");
                    log::info!("Disconnected from {}:{}", self.config.address, self.config.port);
                    return;
                }
                Action::Wait(attempt) => {
                    let _ = attempt.await;
                }
            }
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(*self.state.lock().unwrap(), ConnectionState::Connected(_))
    }

    /// Start a connect attempt on its own task and return a joinable handle
    /// to its result
    ///
    /// The task, not its awaiters, drives the attempt: the state transition
    /// happens even if every caller stops polling.
    fn spawn_connect(self: &Arc<Self>) -> ConnectFuture {
        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.establish().await;
            if let Err(e) = &result {
                log::warn!(
                    "Connect to {}:{} failed: {}",
                    this.config.address,
                    this.config.port,
                    e
                );
                *this.state.lock().unwrap() = ConnectionState::Closed;
            }
            let _ = tx.send(result);
        });

        rx.map(|joined| match joined {
            Ok(result) => result,
            Err(_) => Err(MelsecError::ConnectFailure("connect task aborted".to_string())),
        })
        .boxed()
        .shared()
    }

    /// Open the transport, publish the handle, and start the delivery loop
    async fn establish(self: &Arc<Self>) -> MelsecResult<Arc<Connection>> {
        let (sink, events) = self.transport.open(&self.config).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(Connection {
            id,
            sink: tokio::sync::Mutex::new(sink),
        });

        // Publish before the delivery loop starts so an immediate fault finds
        // the connection current and can tear it down.
        *self.state.lock().unwrap() = ConnectionState::Connected(Arc::clone(&conn));
        log::info!("Connected to {}:{}", self.config.address, self.config.port);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.deliver(id, events).await;
        });
        Ok(conn)
    }

    /// Per-connection delivery loop: the transport's single sequential
    /// callback context
    ///
    /// Responses resolve pending requests in arrival order. A fault (or the
    /// stream simply ending) drains every pending request with its cause and
    /// closes the handle.
    async fn deliver(&self, id: u64, mut events: EventStream) {
        let cause = loop {
            match events.recv().await {
                Some(TransportEvent::Response(frame)) => self.correlator.on_response(frame),
                Some(TransportEvent::Fault(cause)) => break cause,
                None => break "connection closed".to_string(),
            }
        };

        if let Some(conn) = self.take_if_current(id) {
            log::warn!("Connection fault: {}", cause);
            self.correlator.fail_all(&cause);
            conn.close().await;
        }
    }

    /// Transition to Closed and hand out the handle, but only if connection
    /// `id` is still the current one
    fn take_if_current(&self, id: u64) -> Option<Arc<Connection>> {
        let mut state = self.state.lock().unwrap();
        let is_current = matches!(&*state, ConnectionState::Connected(conn) if conn.id == id);
        if !is_current {
            return None;
        }
        match mem::replace(&mut *state, ConnectionState::Closed) {
            ConnectionState::Connected(conn) => Some(conn),
            _ => unreachable!(),
        }
    }
}
