//! Live screencast session over the CDP WebSocket.
//!
//! One session per streaming task. The session owns the socket and runs a
//! single read loop: decode, hand frames to the sink, ack. Viewers never
//! touch the socket; they subscribe to the sink's broadcast feed.

use crate::cdp::{CdpCommand, CdpMessage, ScreencastParams};
use crate::error::StreamError;
use crate::tabs;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use peek_core::TaskId;
use peek_store::FrameSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const ENABLE_ID: u64 = 1;
const START_ID: u64 = 2;

/// A running screencast for one task.
///
/// Reference-counted by subscribers: [`retain`](Self::retain) on attach,
/// [`release`](Self::release) on detach. When the count drops to zero (or
/// [`close`](Self::close) is called) the read loop sends
/// `Page.stopScreencast` and closes the socket.
#[derive(Debug)]
pub struct ScreencastSession {
    task_id: TaskId,
    tab_url: String,
    tab_title: String,
    subscribers: AtomicUsize,
    cancel: CancellationToken,
}

impl ScreencastSession {
    /// Select a tab on the browser at `base_url`, attach to its debugger,
    /// and start streaming frames into `sink`.
    ///
    /// Fails fast (before any background work) when no tab is streamable
    /// or the WebSocket connection cannot be established.
    pub async fn open(
        task_id: TaskId,
        base_url: &str,
        sink: Arc<FrameSink>,
    ) -> Result<Self, StreamError> {
        let target = tabs::pick_target(base_url).await?;
        // select_tab only returns attachable tabs.
        let ws_url = target
            .web_socket_debugger_url
            .clone()
            .ok_or(StreamError::NoTabAvailable)?;

        let (ws, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|err| StreamError::ConnectionFailure {
                context: err.to_string(),
            })?;

        info!(task_id = %task_id, url = %target.url, "screencast session opened");
        metrics::gauge!("screencast_sessions_active").increment(1.0);

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let loop_task = task_id.clone();
        let _ = tokio::spawn(async move {
            run_loop(ws, sink, loop_cancel, &loop_task).await;
            metrics::gauge!("screencast_sessions_active").decrement(1.0);
        });

        Ok(Self {
            task_id,
            tab_url: target.url,
            tab_title: target.title,
            subscribers: AtomicUsize::new(0),
            cancel,
        })
    }

    /// The task this session streams.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// URL of the tab being streamed.
    #[must_use]
    pub fn tab_url(&self) -> &str {
        &self.tab_url
    }

    /// Title of the tab being streamed.
    #[must_use]
    pub fn tab_title(&self) -> &str {
        &self.tab_title
    }

    /// Register one subscriber. Returns the new count.
    pub fn retain(&self) -> usize {
        self.subscribers.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Deregister one subscriber; the last one out closes the session.
    /// Returns the remaining count.
    pub fn release(&self) -> usize {
        let prev = self.subscribers.fetch_sub(1, Ordering::SeqCst);
        let remaining = prev.saturating_sub(1);
        if remaining == 0 {
            debug!(task_id = %self.task_id, "last subscriber detached, closing screencast");
            self.cancel.cancel();
        }
        remaining
    }

    /// Current subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// Close regardless of subscriber count (task termination).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the session has been cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn send_command(tx: &mut WsSink, cmd: CdpCommand) -> Result<(), StreamError> {
    tx.send(Message::Text(cmd.encode().into()))
        .await
        .map_err(|err| StreamError::ConnectionFailure {
            context: err.to_string(),
        })
}

async fn run_loop(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    sink: Arc<FrameSink>,
    cancel: CancellationToken,
    task_id: &TaskId,
) {
    let (mut tx, mut rx) = ws.split();

    let params = ScreencastParams::default();
    if send_command(&mut tx, CdpCommand::page_enable(ENABLE_ID)).await.is_err()
        || send_command(&mut tx, CdpCommand::start_screencast(START_ID, &params))
            .await
            .is_err()
    {
        sink.publish_error("browser connection closed");
        return;
    }

    let mut next_id = START_ID;
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                next_id += 1;
                let _ = send_command(&mut tx, CdpCommand::stop_screencast(next_id)).await;
                let _ = tx.send(Message::Close(None)).await;
                debug!(task_id = %task_id, "screencast stopped");
                break;
            }
            msg = rx.next() => {
                if !handle_message(msg, &mut tx, &sink, &mut next_id, task_id).await {
                    break;
                }
            }
        }
    }
}

/// Process one socket read. Returns false when the loop should end.
async fn handle_message(
    msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    tx: &mut WsSink,
    sink: &Arc<FrameSink>,
    next_id: &mut u64,
    task_id: &TaskId,
) -> bool {
    let text = match msg {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(Message::Ping(payload))) => {
            let _ = tx.send(Message::Pong(payload)).await;
            return true;
        }
        Some(Ok(Message::Close(_))) | None => {
            sink.publish_error("browser connection closed");
            return false;
        }
        Some(Ok(_)) => return true,
        Some(Err(err)) => {
            warn!(task_id = %task_id, error = %err, "screencast socket error");
            sink.publish_error(format!("browser connection failure: {err}"));
            return false;
        }
    };

    match CdpMessage::decode(text.as_str()) {
        Some(CdpMessage::ScreencastFrame {
            data,
            session_id,
            metadata,
        }) => {
            let frame = sink.accept(data, metadata).await;
            *next_id += 1;
            // Ack before reading further; the browser holds the next frame
            // until it arrives.
            if send_command(tx, CdpCommand::frame_ack(*next_id, &session_id))
                .await
                .is_err()
            {
                sink.publish_error("browser connection closed");
                return false;
            }
            debug!(task_id = %task_id, seq = frame.seq, "frame acked");
            true
        }
        Some(CdpMessage::ReplyError { id, message }) if id == START_ID => {
            warn!(task_id = %task_id, error = %message, "screencast start rejected");
            sink.publish_error(StreamError::ScreencastRejected { message }.to_string());
            false
        }
        Some(CdpMessage::ReplyError { id, message }) => {
            warn!(task_id = %task_id, id, error = %message, "CDP command failed");
            true
        }
        Some(CdpMessage::Reply { .. } | CdpMessage::Event { .. }) | None => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
