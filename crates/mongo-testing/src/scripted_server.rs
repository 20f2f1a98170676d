//! Loopback TCP server that replays a fixed script per connection.
//!
//! Each accepted connection runs the same list of [`Step`]s in order. Bytes
//! the server reads during [`Step::Expect`] are appended to a shared record
//! so tests can assert on what the client wrote.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, broadcast};

/// Error type for scripted server operations.
#[derive(Debug, Error)]
pub enum ScriptedServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The expected bytes did not arrive in time.
    #[error("timed out waiting for {expected} received bytes, have {received}")]
    Timeout {
        /// Byte count waited for.
        expected: usize,
        /// Byte count received so far.
        received: usize,
    },
}

/// Result type for scripted server operations.
pub type Result<T> = std::result::Result<T, ScriptedServerError>;

/// One scripted server action.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write these bytes and flush.
    Send(Bytes),
    /// Sleep before the next step.
    Pause(Duration),
    /// Read exactly this many bytes and record them.
    Expect(usize),
    /// Close the connection.
    Close,
}

impl Step {
    /// Shorthand for [`Step::Send`] from a static slice.
    #[must_use]
    pub fn send(bytes: &'static [u8]) -> Self {
        Self::Send(Bytes::from_static(bytes))
    }

    /// Shorthand for [`Step::Pause`] in milliseconds.
    #[must_use]
    pub fn pause_ms(ms: u64) -> Self {
        Self::Pause(Duration::from_millis(ms))
    }
}

#[derive(Default)]
struct Received {
    bytes: Mutex<Vec<u8>>,
    changed: Notify,
}

/// A loopback server replaying a script on every connection.
pub struct ScriptedServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    received: Arc<Received>,
}

impl ScriptedServer {
    /// Bind an ephemeral loopback port and start accepting connections.
    pub async fn start(script: Vec<Step>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let received = Arc::new(Received::default());
        let script = Arc::new(script);

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            received: Arc::clone(&received),
        };

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                tracing::debug!(%peer, "scripted server accepted connection");
                                let script = Arc::clone(&script);
                                let received = Arc::clone(&received);
                                let conn_shutdown = shutdown_tx.subscribe();
                                tokio::spawn(async move {
                                    if let Err(e) =
                                        run_script(stream, &script, &received, conn_shutdown).await
                                    {
                                        tracing::debug!("scripted connection error: {}", e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the host string for connection configuration.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Everything recorded by `Expect` steps so far, across connections.
    pub fn received(&self) -> Vec<u8> {
        self.received.bytes.lock().clone()
    }

    /// Wait until at least `n` bytes have been recorded.
    pub async fn wait_for_received(&self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let wait = async {
            loop {
                let changed = self.received.changed.notified();
                {
                    let bytes = self.received.bytes.lock();
                    if bytes.len() >= n {
                        return bytes.clone();
                    }
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ScriptedServerError::Timeout {
                expected: n,
                received: self.received.bytes.lock().len(),
            })
    }

    /// Stop accepting and drop every open scripted connection.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_script(
    mut stream: TcpStream,
    script: &[Step],
    received: &Received,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let steps = async {
        for step in script {
            match step {
                Step::Send(bytes) => {
                    stream.write_all(bytes).await?;
                    stream.flush().await?;
                }
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
                Step::Expect(n) => {
                    let mut buf = vec![0u8; *n];
                    stream.read_exact(&mut buf).await?;
                    received.bytes.lock().extend_from_slice(&buf);
                    received.changed.notify_waiters();
                }
                Step::Close => {
                    stream.shutdown().await?;
                    return Ok(true);
                }
            }
        }
        Ok::<_, ScriptedServerError>(false)
    };

    let outcome = tokio::select! {
        result = steps => Some(result?),
        _ = shutdown.recv() => None,
    };
    if outcome == Some(false) {
        // script exhausted: hold the connection open until shutdown
        let _ = shutdown.recv().await;
    }
    Ok(())
}
