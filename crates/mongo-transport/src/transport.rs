//! Connection lifecycle and the read/write forms.
//!
//! A [`Transport`] owns one duplex byte stream. After opening, the stream is
//! split: a reader task fills pooled buffers from the read half and hands
//! each one to the inbound queue, while writes go through the write half
//! behind an async mutex.
//!
//! Every operation exists in three forms built on the same async core:
//!
//! - `*_async`: a future to await;
//! - `*_with`: completion callback, invoked once on a runtime thread;
//! - blocking: issues the async form and waits on a one-shot channel.
//!
//! # Blocking forms
//!
//! The blocking forms must not be called from inside an async context. A
//! runtime worker that blocks here can never run the completion it waits
//! for, and tokio panics to report that.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use mongo_tls::TlsConnector;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::buffer::CompositeBuffer;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::inbound::{Inbound, ReadCompletion, Ready};
use crate::pool::BufferPool;

trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

type BoxedStream = Box<dyn Stream>;

/// Lifecycle of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Created, `open` not called yet.
    Unopened,
    /// `open` in progress.
    Opening,
    /// Connected; reads and writes are accepted.
    Open,
    /// Closed by the caller. Terminal.
    Closed,
    /// An I/O failure was recorded. Terminal; the failure is replayed to
    /// every later read and write.
    Failed,
}

fn finish(ready: Option<Ready>) {
    if let Some(ready) = ready {
        ready.run();
    }
}

struct Shared {
    config: TransportConfig,
    runtime: Handle,
    pool: Arc<BufferPool>,
    phase: Mutex<TransportState>,
    inbound: Arc<Mutex<Inbound>>,
    wakeup: Arc<Notify>,
    writer: tokio::sync::Mutex<Option<WriteHalf<BoxedStream>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

/// An asynchronous duplex byte transport with exact-length reads.
///
/// Cloning is cheap; clones share one connection.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

impl Transport {
    /// Create an unopened transport on the current tokio runtime.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| TransportError::Config(format!("no tokio runtime: {e}")))?;
        Ok(Self::with_handle(config, runtime))
    }

    /// Create an unopened transport whose work runs on `runtime`.
    ///
    /// Use this to drive the blocking forms from threads outside the
    /// runtime.
    #[must_use]
    pub fn with_handle(config: TransportConfig, runtime: Handle) -> Self {
        Self::with_pool(config, runtime, BufferPool::shared())
    }

    /// Like [`with_handle`](Self::with_handle) with a dedicated buffer pool.
    #[must_use]
    pub fn with_pool(config: TransportConfig, runtime: Handle, pool: Arc<BufferPool>) -> Self {
        Self::build(config, runtime, pool, None)
    }

    /// Wrap an already established stream. The transport starts `Open`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(stream: S, config: TransportConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| TransportError::Config(format!("no tokio runtime: {e}")))?;
        let (read_half, write_half) = tokio::io::split(Box::new(stream) as BoxedStream);
        let transport = Self::build(config, runtime, BufferPool::shared(), Some(write_half));
        transport.spawn_reader(read_half);
        *transport.shared.phase.lock() = TransportState::Open;
        tracing::debug!("transport opened over existing stream");
        Ok(transport)
    }

    fn build(
        config: TransportConfig,
        runtime: Handle,
        pool: Arc<BufferPool>,
        writer: Option<WriteHalf<BoxedStream>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                runtime,
                pool,
                phase: Mutex::new(TransportState::Unopened),
                inbound: Arc::new(Mutex::new(Inbound::new())),
                wakeup: Arc::new(Notify::new()),
                writer: tokio::sync::Mutex::new(writer),
                reader: Mutex::new(None),
            }),
        }
    }

    /// The configuration this transport was created with.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransportState {
        {
            let inbound = self.shared.inbound.lock();
            if inbound.is_closed() {
                return TransportState::Closed;
            }
            if inbound.failure().is_some() {
                return TransportState::Failed;
            }
        }
        *self.shared.phase.lock()
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.inbound.lock().is_closed()
    }

    /// The stored failure, if the transport is `Failed`.
    #[must_use]
    pub fn failure(&self) -> Option<TransportError> {
        self.shared.inbound.lock().failure().cloned()
    }

    /// Inbound bytes queued and not yet consumed by a read.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.shared.inbound.lock().buffered()
    }

    /// Whether a read is waiting for more inbound bytes.
    #[must_use]
    pub fn has_pending_read(&self) -> bool {
        self.shared.inbound.lock().has_pending()
    }

    /// Get a writable buffer of at least `size` bytes from the pool.
    #[must_use]
    pub fn acquire_buffer(&self, size: usize) -> BytesMut {
        self.shared.pool.acquire(size)
    }

    /// Hand a consumed read result's storage back to the pool.
    pub fn release(&self, buffer: CompositeBuffer) {
        buffer.release_into(&self.shared.pool);
    }

    /// Fails with `Closed`, the stored failure, or `NotOpen` unless open.
    fn check_usable(&self) -> Result<()> {
        {
            let inbound = self.shared.inbound.lock();
            if inbound.is_closed() {
                return Err(TransportError::Closed);
            }
            if let Some(err) = inbound.failure() {
                return Err(err.clone());
            }
        }
        match *self.shared.phase.lock() {
            TransportState::Open => Ok(()),
            _ => Err(TransportError::NotOpen),
        }
    }

    fn interrupted(&self) -> TransportError {
        if self.is_closed() {
            TransportError::Closed
        } else {
            TransportError::InterruptedWait
        }
    }

    fn record_failure(&self, err: TransportError) {
        let ready = self.shared.inbound.lock().fail(err);
        finish(ready);
    }

    // =========================================================================
    // open
    // =========================================================================

    /// Resolve, connect and optionally run the TLS handshake.
    pub async fn open_async(&self) -> Result<()> {
        self.begin_open()?;
        let config = &self.shared.config;
        tracing::debug!(
            address = %config.address(),
            tls = config.tls_enabled,
            "opening transport"
        );

        let stream = match establish(config).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::debug!(error = %err, "open failed");
                self.record_failure(err.clone());
                return Err(err);
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        *self.shared.writer.lock().await = Some(write_half);
        if self.is_closed() {
            // closed while connecting
            self.shared.writer.lock().await.take();
            return Err(TransportError::Closed);
        }
        self.spawn_reader(read_half);
        *self.shared.phase.lock() = TransportState::Open;
        if self.is_closed() {
            self.abort_reader();
            return Err(TransportError::Closed);
        }

        tracing::debug!(address = %config.address(), "transport open");
        Ok(())
    }

    /// Open in the background and pass the outcome to `on_done`.
    pub fn open_with<F>(&self, on_done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let this = self.clone();
        self.shared
            .runtime
            .spawn(async move { on_done(this.open_async().await) });
    }

    /// Open and wait for the outcome.
    pub fn open(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.open_with(move |result| {
            let _ = tx.send(result);
        });
        rx.blocking_recv().unwrap_or_else(|_| Err(self.interrupted()))
    }

    fn begin_open(&self) -> Result<()> {
        {
            let inbound = self.shared.inbound.lock();
            if inbound.is_closed() {
                return Err(TransportError::Closed);
            }
            if let Some(err) = inbound.failure() {
                return Err(err.clone());
            }
        }
        let mut phase = self.shared.phase.lock();
        if *phase != TransportState::Unopened {
            return Err(TransportError::AlreadyOpen);
        }
        *phase = TransportState::Opening;
        Ok(())
    }

    fn spawn_reader(&self, read_half: ReadHalf<BoxedStream>) {
        let reader = Reader {
            inbound: Arc::clone(&self.shared.inbound),
            wakeup: Arc::clone(&self.shared.wakeup),
            pool: Arc::clone(&self.shared.pool),
            chunk_size: self.shared.config.read_chunk_size,
            read_timeout: self.shared.config.read_timeout,
            max_buffered: self.shared.config.max_buffered,
        };
        let handle = self.shared.runtime.spawn(reader.run(read_half));
        *self.shared.reader.lock() = Some(handle);
    }

    fn abort_reader(&self) {
        if let Some(handle) = self.shared.reader.lock().take() {
            handle.abort();
        }
    }

    // =========================================================================
    // write
    // =========================================================================

    /// Write `regions` back to back as one transmission and flush.
    ///
    /// A write failure moves the transport to `Failed`.
    pub async fn write_async(&self, regions: Vec<Bytes>) -> Result<()> {
        self.check_usable()?;
        let mut guard = self.shared.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(self.interrupted_write());
        };

        let mut buf = CompositeBuffer::from(regions);
        let len = buf.len();
        let result = async {
            writer.write_all_buf(&mut buf).await?;
            writer.flush().await
        }
        .await;
        drop(guard);

        match result {
            Ok(()) => {
                tracing::trace!(len, "write flushed");
                Ok(())
            }
            Err(e) => {
                let err = TransportError::from(e);
                self.record_failure(err.clone());
                Err(err)
            }
        }
    }

    fn interrupted_write(&self) -> TransportError {
        self.check_usable().err().unwrap_or(TransportError::Closed)
    }

    /// Write in the background and pass the outcome to `on_done`.
    pub fn write_with<F>(&self, regions: Vec<Bytes>, on_done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let this = self.clone();
        self.shared
            .runtime
            .spawn(async move { on_done(this.write_async(regions).await) });
    }

    /// Write and wait for the flush.
    pub fn write(&self, regions: Vec<Bytes>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.write_with(regions, move |result| {
            let _ = tx.send(result);
        });
        rx.blocking_recv().unwrap_or_else(|_| Err(self.interrupted()))
    }

    // =========================================================================
    // read
    // =========================================================================

    fn submit_read(&self, len: usize, completion: ReadCompletion) {
        if let Err(err) = self.check_usable() {
            completion.complete(Err(err));
            return;
        }
        let ready = self.shared.inbound.lock().request(len, completion);
        // the reader re-arms its idle timeout and resumes if it was paused
        self.shared.wakeup.notify_one();
        if let Some(ready) = ready {
            ready.run();
        }
    }

    /// Read exactly `len` bytes.
    ///
    /// The read is registered immediately, before the future is first
    /// polled. Only one read may be outstanding; a second one fails with
    /// [`TransportError::ReadAlreadyPending`].
    pub fn read_async(&self, len: usize) -> ReadFuture {
        let (tx, rx) = oneshot::channel();
        self.submit_read(len, ReadCompletion::Channel(tx));
        ReadFuture { rx }
    }

    /// Read exactly `len` bytes and pass the outcome to `on_done`.
    ///
    /// `on_done` runs once, either on the calling thread when the read
    /// resolves immediately or on the reader task. It is never invoked if
    /// the transport is closed first.
    pub fn read_with<F>(&self, len: usize, on_done: F)
    where
        F: FnOnce(Result<CompositeBuffer>) + Send + 'static,
    {
        self.submit_read(len, ReadCompletion::Callback(Box::new(on_done)));
    }

    /// Read exactly `len` bytes, blocking the calling thread.
    pub fn read(&self, len: usize) -> Result<CompositeBuffer> {
        let (tx, rx) = oneshot::channel();
        self.submit_read(len, ReadCompletion::Channel(tx));
        rx.blocking_recv().unwrap_or_else(|_| Err(self.interrupted()))
    }

    // =========================================================================
    // close
    // =========================================================================

    /// Close the transport. Idempotent.
    ///
    /// Queued inbound regions go back to the pool. A pending read is
    /// abandoned without its completion running; a pending
    /// [`ReadFuture`] resolves to [`TransportError::Closed`].
    pub fn close(&self) {
        let closed = self.shared.inbound.lock().close();
        let Some(closed) = closed else {
            return;
        };
        self.abort_reader();
        drop(closed.abandoned);
        for region in closed.regions {
            self.shared.pool.release_bytes(region);
        }
        *self.shared.phase.lock() = TransportState::Closed;

        let shared = Arc::clone(&self.shared);
        self.shared.runtime.spawn(async move {
            if let Some(mut writer) = shared.writer.lock().await.take() {
                let _ = writer.shutdown().await;
            }
        });
        tracing::debug!(address = %self.shared.config.address(), "transport closed");
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("address", &self.shared.config.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

pin_project! {
    /// Future returned by [`Transport::read_async`].
    #[must_use = "futures do nothing unless polled"]
    pub struct ReadFuture {
        #[pin]
        rx: oneshot::Receiver<Result<CompositeBuffer>>,
    }
}

impl Future for ReadFuture {
    type Output = Result<CompositeBuffer>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.project().rx.poll(cx)) {
            Ok(result) => Poll::Ready(result),
            // the completion was abandoned by close
            Err(_) => Poll::Ready(Err(TransportError::Closed)),
        }
    }
}

// =============================================================================
// Connection establishment
// =============================================================================

async fn establish(config: &TransportConfig) -> Result<BoxedStream> {
    config.validate()?;
    let address = config.address();
    match tokio::time::timeout(config.connect_timeout, connect_and_secure(config, &address)).await
    {
        Ok(result) => result,
        Err(_) => Err(TransportError::ConnectTimeout {
            address,
            timeout: config.connect_timeout,
        }),
    }
}

async fn connect_and_secure(config: &TransportConfig, address: &str) -> Result<BoxedStream> {
    let tcp = connect_tcp(config, address).await?;
    if !config.tls_enabled {
        return Ok(Box::new(tcp));
    }

    let connector = TlsConnector::new(config.tls.clone())?;
    let tls = connector.connect(tcp, &config.host).await?;
    Ok(Box::new(tls))
}

async fn connect_tcp(config: &TransportConfig, address: &str) -> Result<TcpStream> {
    let connect_error = |reason: String| TransportError::Connect {
        address: address.to_owned(),
        reason,
    };

    let addrs = lookup_host(address)
        .await
        .map_err(|e| connect_error(e.to_string()))?;

    let mut last_error = None;
    for addr in addrs {
        tracing::debug!(%addr, "connecting");
        match connect_addr(config, addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(connect_error(last_error.map_or_else(
        || "no addresses resolved".to_owned(),
        |e| e.to_string(),
    )))
}

async fn connect_addr(config: &TransportConfig, addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(config.keepalive)?;
    if let Some(size) = config.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = config.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

// =============================================================================
// Reader task
// =============================================================================

struct Reader {
    inbound: Arc<Mutex<Inbound>>,
    wakeup: Arc<Notify>,
    pool: Arc<BufferPool>,
    chunk_size: usize,
    read_timeout: Option<Duration>,
    max_buffered: usize,
}

enum ReadEvent {
    Read(io::Result<usize>),
    Rearm,
    Idle,
}

async fn idle_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Reader {
    fn deadline(&self) -> Option<Instant> {
        let timeout = self.read_timeout?;
        self.inbound.lock().idle_deadline(timeout)
    }

    fn saturated(&self) -> bool {
        self.inbound.lock().is_saturated(self.max_buffered)
    }

    fn fail(&self, err: TransportError) {
        let ready = self.inbound.lock().fail(err);
        finish(ready);
    }

    async fn run(self, mut stream: ReadHalf<BoxedStream>) {
        let mut buf = self.pool.acquire(self.chunk_size);
        loop {
            let deadline = self.deadline();
            let paused = self.saturated();
            if paused {
                tracing::trace!(
                    max_buffered = self.max_buffered,
                    "inbound queue full, pausing reads"
                );
            }
            let event = tokio::select! {
                result = stream.read_buf(&mut buf), if !paused => ReadEvent::Read(result),
                () = self.wakeup.notified() => ReadEvent::Rearm,
                () = idle_until(deadline) => ReadEvent::Idle,
            };

            match event {
                ReadEvent::Rearm => {}
                ReadEvent::Read(Ok(0)) => {
                    self.fail(
                        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
                            .into(),
                    );
                    return;
                }
                ReadEvent::Read(Ok(_)) => {
                    let next = self.pool.acquire(self.chunk_size);
                    let region = std::mem::replace(&mut buf, next).freeze();
                    let delivered = self.inbound.lock().deliver(region);
                    match delivered {
                        Ok(ready) => finish(ready),
                        Err(region) => {
                            self.pool.release_bytes(region);
                            return;
                        }
                    }
                }
                ReadEvent::Read(Err(e)) => {
                    self.fail(e.into());
                    return;
                }
                ReadEvent::Idle => {
                    // a delivery or a new read may have moved the deadline
                    let Some(timeout) = self.read_timeout else {
                        continue;
                    };
                    if self.deadline().is_some_and(|d| d <= Instant::now()) {
                        tracing::debug!(?timeout, "idle read timeout");
                        self.fail(TransportError::ReadTimeout(timeout));
                        return;
                    }
                }
            }
        }
    }
}
