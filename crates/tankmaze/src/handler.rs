//! Per-connection handler: framing, dispatch and cleanup.
//!
//! Each accepted connection gets a reader task (this handler) and a
//! writer task:
//!   1. The writer drains the player's outbound queue, framing each
//!      message onto the socket.
//!   2. The reader reassembles frames, decodes each one and applies it
//!      to the room registry under the global lock.
//!   3. When either side stops, the session leaves its room exactly once,
//!      replies already queued are flushed and the socket is closed.

use std::sync::Arc;
use std::time::Duration;

use tankmaze_protocol::{ClientMessage, FrameBuffer, PlayerId, ServerMessage, encode_frame};
use tankmaze_room::RoomError;
use tankmaze_session::Session;
use tankmaze_transport::{Connection, TcpConnection, TransportError, origin_label};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::RelayError;
use crate::server::ServerState;

/// How long a closing connection waits for queued replies when no write
/// timeout is configured.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// The peer closed its side.
    PeerClosed,
    /// The client sent `Disconnect`.
    Disconnect,
    /// The writer stopped after a failed or stalled write.
    WriterStopped,
}

/// Drop guard that runs room cleanup if the handler exits without
/// calling [`release`](Self::release).
///
/// `Drop` is synchronous, so the fallback path spawns a task for the
/// async lock.
struct SessionGuard {
    session: Option<Session>,
    state: Arc<ServerState>,
}

impl SessionGuard {
    fn new(session: Session, state: Arc<ServerState>) -> Self {
        Self {
            session: Some(session),
            state,
        }
    }

    /// Leaves the session's room and drops the session.
    async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            self.state.rooms.lock().await.leave(&mut session);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                state.rooms.lock().await.leave(&mut session);
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), RelayError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let player_id = PlayerId(conn_id.into_inner());
    tracing::info!(%conn_id, %player_id, %peer, "player connected");

    let (tx, rx) = mpsc::unbounded_channel();
    let mut guard = SessionGuard::new(
        Session::new(player_id, origin_label(&peer), tx),
        Arc::clone(&state),
    );
    let mut writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        rx,
        state.config.write_timeout(),
    ));

    let outcome = match guard.session.as_mut() {
        Some(session) => read_loop(&conn, &state, session, &mut writer).await,
        None => Ok(ReadEnd::PeerClosed),
    };

    guard.release().await;
    if !matches!(outcome, Ok(ReadEnd::WriterStopped)) {
        flush_writer(&mut writer, state.config.write_timeout()).await;
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }

    match outcome {
        Ok(reason) => {
            tracing::info!(%conn_id, %player_id, ?reason, "player disconnected");
            Ok(())
        }
        Err(e) => {
            tracing::info!(%conn_id, %player_id, error = %e, "connection dropped");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

async fn read_loop(
    conn: &TcpConnection,
    state: &ServerState,
    session: &mut Session,
    writer: &mut JoinHandle<()>,
) -> Result<ReadEnd, RelayError> {
    let idle = state.config.idle_timeout();
    let mut frames = FrameBuffer::with_max_payload(state.config.max_frame_len);

    loop {
        let chunk = tokio::select! {
            chunk = recv_chunk(conn, idle) => chunk?,
            _ = &mut *writer => return Ok(ReadEnd::WriterStopped),
        };
        let Some(bytes) = chunk else {
            return Ok(ReadEnd::PeerClosed);
        };

        frames.extend(&bytes);
        while let Some(payload) = frames.next_frame()? {
            if dispatch_payload(state, session, &payload).await == ReadStep::Close {
                return Ok(ReadEnd::Disconnect);
            }
        }
    }
}

/// Reads the next chunk, bounded by the idle timeout if one is set.
async fn recv_chunk(
    conn: &TcpConnection,
    idle: Option<Duration>,
) -> Result<Option<Vec<u8>>, RelayError> {
    let chunk = match idle {
        Some(limit) => tokio::time::timeout(limit, conn.recv())
            .await
            .map_err(|_| TransportError::TimedOut("read"))??,
        None => conn.recv().await?,
    };
    Ok(chunk)
}

#[derive(Debug, PartialEq, Eq)]
enum ReadStep {
    Continue,
    Close,
}

/// Decodes one frame payload and applies it.
///
/// Undecodable payloads and rejected room operations are logged and
/// dropped; neither closes the connection.
async fn dispatch_payload(state: &ServerState, session: &mut Session, payload: &[u8]) -> ReadStep {
    let player_id = session.player_id();
    let msg = match ClientMessage::decode(payload) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(%player_id, error = %e, "dropping undecodable frame");
            return ReadStep::Continue;
        }
    };

    if matches!(msg, ClientMessage::Disconnect) {
        tracing::debug!(%player_id, "client requested disconnect");
        return ReadStep::Close;
    }

    let kind = msg.kind();
    let result = state.rooms.lock().await.dispatch(session, msg);
    match result {
        Ok(()) => {}
        Err(RoomError::CapacityReached) => {
            tracing::warn!(%player_id, "room limit reached, create dropped");
        }
        Err(e) => {
            tracing::debug!(%player_id, ?kind, error = %e, "message dropped");
        }
    }
    ReadStep::Continue
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Waits for the writer to send what is already queued, aborting it after
/// `limit`.
///
/// Only finishes early once every sender for the queue is gone, so the
/// session must already have left its room.
async fn flush_writer(writer: &mut JoinHandle<()>, limit: Option<Duration>) {
    let limit = limit.unwrap_or(CLOSE_FLUSH_TIMEOUT);
    if tokio::time::timeout(limit, &mut *writer).await.is_err() {
        tracing::debug!(?limit, "outbound queue not flushed in time");
        writer.abort();
    }
}

/// Drains the outbound queue onto the socket until the queue closes or a
/// write fails.
async fn write_loop(
    conn: Arc<TcpConnection>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    write_timeout: Option<Duration>,
) {
    let conn_id = conn.id();
    while let Some(msg) = rx.recv().await {
        let frame = match msg.encode().and_then(|payload| encode_frame(&payload)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "dropping unencodable message");
                continue;
            }
        };

        let sent = match write_timeout {
            Some(limit) => tokio::time::timeout(limit, conn.send(&frame))
                .await
                .unwrap_or(Err(TransportError::TimedOut("write"))),
            None => conn.send(&frame).await,
        };
        if let Err(e) = sent {
            tracing::warn!(%conn_id, error = %e, "write failed, closing connection");
            return;
        }
    }
}
