//! Two logical channels over one duplex byte stream.
//!
//! A [`Connection`] owns both halves of a stream. Writes go through a single
//! async mutex so text and frame senders never interleave partial messages.
//! Reads are done by one background task per connection which decodes a
//! message at a time and hands it to the bounded queue of its kind.
//!
//! Queues are fed with `try_send`: when the consumer of one channel falls
//! behind, its messages are dropped instead of stalling the socket read or
//! the other channel. Ordering holds within a channel, never across them.
//!
//! Send failures close the connection and are otherwise swallowed; callers
//! that care check [`Connection::is_closed`]. Receives return `None` once the
//! connection is closed and the queue is drained.

use crate::wire::{encode_frame, encode_text, read_message, Message};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::{mpsc, Mutex, Notify};

pub const DEFAULT_TEXT_QUEUE: usize = 256;
pub const DEFAULT_FRAME_QUEUE: usize = 32;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct Connection {
    writer: Mutex<Option<BoxedWriter>>,
    text_rx: Mutex<mpsc::Receiver<String>>,
    frame_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Connection {
    /// Wraps `stream` and starts its receive task on the current runtime.
    pub fn spawn<S>(stream: S) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_capacity(stream, DEFAULT_TEXT_QUEUE, DEFAULT_FRAME_QUEUE)
    }

    pub fn with_capacity<S>(stream: S, text_capacity: usize, frame_capacity: usize) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (text_tx, text_rx) = mpsc::channel(text_capacity.max(1));
        let (frame_tx, frame_rx) = mpsc::channel(frame_capacity.max(1));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(receive_loop(
            reader,
            text_tx,
            frame_tx,
            Arc::clone(&closed),
            Arc::clone(&shutdown),
        ));

        Arc::new(Self {
            writer: Mutex::new(Some(Box::new(writer))),
            text_rx: Mutex::new(text_rx),
            frame_rx: Mutex::new(frame_rx),
            closed,
            shutdown,
        })
    }

    pub async fn send_text(&self, text: &str) {
        match encode_text(text) {
            Ok(bytes) => self.write_raw(&bytes).await,
            Err(e) => {
                warn!("Dropping connection, cannot encode text: {}", e);
                self.close().await;
            }
        }
    }

    /// Sends one binary frame. `None` is a no-op.
    pub async fn send_frame(&self, data: Option<&[u8]>) {
        let Some(data) = data else {
            return;
        };

        match encode_frame(data) {
            Ok(bytes) => self.write_raw(&bytes).await,
            Err(e) => {
                warn!("Dropping connection, cannot encode frame: {}", e);
                self.close().await;
            }
        }
    }

    async fn write_raw(&self, bytes: &[u8]) {
        if self.is_closed() {
            return;
        }

        let failed = {
            let mut guard = self.writer.lock().await;
            match guard.as_mut() {
                Some(writer) => {
                    let result = match writer.write_all(bytes).await {
                        Ok(()) => writer.flush().await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &result {
                        debug!("Write failed: {}", e);
                    }
                    result.is_err()
                }
                None => false,
            }
        };

        if failed {
            self.close().await;
        }
    }

    pub async fn receive_text(&self) -> Option<String> {
        self.text_rx.lock().await.recv().await
    }

    pub async fn receive_frame(&self) -> Option<Vec<u8>> {
        self.frame_rx.lock().await.recv().await
    }

    /// Closes the connection. Safe to call any number of times.
    ///
    /// Stops the receive task, which drops the queue senders and so wakes
    /// every task parked in a receive call, then shuts the write half down.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            // The receive task may have marked us closed on its own; the
            // writer still has to be released.
            self.release_writer().await;
            return;
        }

        self.shutdown.notify_one();
        self.release_writer().await;
    }

    async fn release_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Error shutting down write half: {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn receive_loop<S>(
    mut reader: ReadHalf<S>,
    text_tx: mpsc::Sender<String>,
    frame_tx: mpsc::Sender<Vec<u8>>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) where
    S: AsyncRead + Send,
{
    loop {
        let message = tokio::select! {
            _ = shutdown.notified() => break,
            result = read_message(&mut reader) => result,
        };

        match message {
            Ok(Some(Message::Text(text))) => {
                if let Err(mpsc::error::TrySendError::Full(_)) = text_tx.try_send(text) {
                    warn!("Text queue full, dropping message");
                }
            }
            Ok(Some(Message::Frame(frame))) => {
                if let Err(mpsc::error::TrySendError::Full(_)) = frame_tx.try_send(frame) {
                    debug!("Frame queue full, dropping frame");
                }
            }
            Ok(None) => {
                debug!("Peer closed the stream");
                break;
            }
            Err(e) if e.is_framing_violation() => {
                warn!("Framing error, closing connection: {}", e);
                break;
            }
            Err(e) => {
                debug!("Read failed, closing connection: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
}
