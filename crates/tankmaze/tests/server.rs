//! Integration tests for the relay server, handler, and full connection flow.

use std::time::Duration;

use tankmaze::prelude::*;
use tankmaze_protocol::{FrameBuffer, RoomInfo, encode_frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

async fn start_server(config: RelayConfig) -> (String, RelayHandle) {
    let server = RelayServer::builder()
        .config(config)
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let handle = server.handle();
    tokio::spawn(server.run());
    (addr, handle)
}

struct TestClient {
    stream: TcpStream,
    frames: FrameBuffer,
}

impl TestClient {
    async fn connect(addr: &str) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            frames: FrameBuffer::new(),
        }
    }

    async fn send(&mut self, payload: &[u8]) {
        self.stream
            .write_all(&encode_frame(payload).unwrap())
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Next server message, failing the test if none arrives in time.
    async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(REPLY_TIMEOUT, self.next_message())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
    }

    async fn next_message(&mut self) -> Option<ServerMessage> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(frame) = self.frames.next_frame().unwrap() {
                return Some(ServerMessage::decode(&frame).unwrap());
            }
            let n = self.stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            self.frames.extend(&buf[..n]);
        }
    }

    /// Asserts nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        let got = tokio::time::timeout(Duration::from_millis(200), self.next_message()).await;
        assert!(got.is_err(), "unexpected message: {got:?}");
    }

    /// Asserts the server closes the connection.
    async fn expect_closed(&mut self) {
        let got = tokio::time::timeout(REPLY_TIMEOUT, self.next_message())
            .await
            .expect("connection was not closed");
        assert_eq!(got, None);
    }
}

fn create(width: u16, height: u16) -> Vec<u8> {
    let mut p = vec![MessageType::CreateRoom.tag()];
    p.extend_from_slice(&width.to_le_bytes());
    p.extend_from_slice(&height.to_le_bytes());
    p
}

fn join(code: &RoomCode) -> Vec<u8> {
    let mut p = vec![MessageType::JoinRoom.tag(), code.as_str().len() as u8];
    p.extend_from_slice(code.as_str().as_bytes());
    p
}

/// Host creates a room and a guest joins it; returns both with their
/// join traffic consumed.
async fn paired(addr: &str) -> (TestClient, TestClient, RoomCode) {
    let mut host = TestClient::connect(addr).await;
    host.send(&create(21, 15)).await;
    let code = match host.recv().await {
        ServerMessage::RoomCreated { code } => code,
        other => panic!("expected RoomCreated, got {other:?}"),
    };
    assert!(matches!(host.recv().await, ServerMessage::RoomInfo(_)));

    let mut guest = TestClient::connect(addr).await;
    guest.send(&join(&code)).await;
    assert_eq!(guest.recv().await, ServerMessage::RoomJoined { code: code.clone() });
    assert!(matches!(guest.recv().await, ServerMessage::RoomInfo(_)));
    assert_eq!(host.recv().await, ServerMessage::RequestMaze);
    assert!(matches!(host.recv().await, ServerMessage::RoomInfo(_)));
    (host, guest, code)
}

async fn wait_for_room_count(handle: &RelayHandle, expected: usize) {
    tokio::time::timeout(REPLY_TIMEOUT, async {
        while handle.room_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room count never reached expected value");
}

// =========================================================================
// Connection basics
// =========================================================================

#[tokio::test]
async fn test_server_builds_and_binds() {
    let server = RelayServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    assert_ne!(server.local_addr().unwrap().port(), 0);
    assert_eq!(server.config().max_rooms, None);
}

#[tokio::test]
async fn test_connect_acknowledged() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&[MessageType::Connect.tag()]).await;
    assert_eq!(client.recv().await, ServerMessage::ConnectAck);
}

#[tokio::test]
async fn test_fragmented_frame_reassembled() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    let frame = encode_frame(&create(8, 8)).unwrap();
    for byte in frame {
        client.send_raw(&[byte]).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(matches!(client.recv().await, ServerMessage::RoomCreated { .. }));
}

#[tokio::test]
async fn test_coalesced_frames_each_handled() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    let mut bytes = encode_frame(&[1]).unwrap();
    bytes.extend_from_slice(&encode_frame(&[1]).unwrap());
    client.send_raw(&bytes).await;
    assert_eq!(client.recv().await, ServerMessage::ConnectAck);
    assert_eq!(client.recv().await, ServerMessage::ConnectAck);
}

#[tokio::test]
async fn test_malformed_frames_ignored_connection_stays_open() {
    let (addr, handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&[]).await;
    client.send(&[200]).await;
    client.send(&[MessageType::CreateRoom.tag(), 1]).await;
    client.send(&[MessageType::GameWin.tag()]).await;
    client.expect_silence().await;
    assert_eq!(handle.room_count().await, 0);

    client.send(&[MessageType::Connect.tag()]).await;
    assert_eq!(client.recv().await, ServerMessage::ConnectAck);
}

#[tokio::test]
async fn test_disconnect_message_closes_connection() {
    let (addr, handle) = start_server(RelayConfig::default()).await;
    let mut host = TestClient::connect(&addr).await;
    host.send(&create(4, 4)).await;
    host.recv().await;
    host.recv().await;
    assert_eq!(handle.room_count().await, 1);

    host.send(&[MessageType::Disconnect.tag()]).await;
    host.expect_closed().await;
    wait_for_room_count(&handle, 0).await;
}

#[tokio::test]
async fn test_disconnect_after_connect_in_one_write_still_acks() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    let mut bytes = encode_frame(&[MessageType::Connect.tag()]).unwrap();
    bytes.extend_from_slice(&encode_frame(&[MessageType::Disconnect.tag()]).unwrap());
    client.send_raw(&bytes).await;

    assert_eq!(client.recv().await, ServerMessage::ConnectAck);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_create_then_disconnect_delivers_room_replies() {
    let (addr, handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    let mut bytes = encode_frame(&create(6, 6)).unwrap();
    bytes.extend_from_slice(&encode_frame(&[MessageType::Disconnect.tag()]).unwrap());
    client.send_raw(&bytes).await;

    assert!(matches!(client.recv().await, ServerMessage::RoomCreated { .. }));
    assert!(matches!(client.recv().await, ServerMessage::RoomInfo(_)));
    client.expect_closed().await;
    wait_for_room_count(&handle, 0).await;
}

// =========================================================================
// Lobby and round
// =========================================================================

#[tokio::test]
async fn test_room_info_shows_origins() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let (mut host, mut guest, _code) = paired(&addr).await;

    guest.send(&[MessageType::PlayerReady.tag(), 1]).await;
    assert_eq!(host.recv().await, ServerMessage::Relay(vec![29, 1]));
    let expected = ServerMessage::RoomInfo(RoomInfo {
        host_origin: "127.0.0.1".into(),
        guest_origin: "127.0.0.1".into(),
        guest_ready: true,
        dark_mode: false,
    });
    assert_eq!(host.recv().await, expected);
    assert_eq!(guest.recv().await, expected);
}

#[tokio::test]
async fn test_full_round_relays_and_wins_once() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let (mut host, mut guest, _code) = paired(&addr).await;

    // Maze upload reaches the guest but does not start the round.
    host.send(&[12, 1, 3, 3, 3]).await;
    assert_eq!(guest.recv().await, ServerMessage::Relay(vec![12, 1, 3, 3, 3]));

    // Gameplay is dropped in the lobby.
    host.send(&[MessageType::PlayerUpdate.tag(), 9]).await;
    guest.expect_silence().await;

    guest.send(&[29, 1]).await;
    host.recv().await;
    host.recv().await;
    guest.recv().await;

    host.send(&[MessageType::HostStartGame.tag()]).await;
    assert_eq!(host.recv().await, ServerMessage::GameStart);
    assert_eq!(guest.recv().await, ServerMessage::GameStart);

    host.send(&[MessageType::PlayerUpdate.tag(), 9]).await;
    assert_eq!(guest.recv().await, ServerMessage::Relay(vec![10, 9]));
    guest.send(&[MessageType::PlayerShoot.tag(), 4, 4]).await;
    assert_eq!(host.recv().await, ServerMessage::Relay(vec![11, 4, 4]));

    guest.send(&[MessageType::ReachExit.tag()]).await;
    assert_eq!(host.recv().await, ServerMessage::Relay(vec![14]));
    host.send(&[MessageType::ReachExit.tag()]).await;
    assert_eq!(guest.recv().await, ServerMessage::GameWin);
    assert_eq!(guest.recv().await, ServerMessage::Relay(vec![14]));
    assert_eq!(host.recv().await, ServerMessage::GameWin);

    host.send(&[MessageType::ReachExit.tag()]).await;
    assert_eq!(guest.recv().await, ServerMessage::Relay(vec![14]));
    guest.expect_silence().await;
}

#[tokio::test]
async fn test_start_without_ready_guest_ignored() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let (mut host, mut guest, _code) = paired(&addr).await;
    host.send(&[MessageType::HostStartGame.tag()]).await;
    host.expect_silence().await;
    guest.expect_silence().await;
}

#[tokio::test]
async fn test_join_unknown_code_reports_not_found() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&join(&RoomCode::from_number(9999).unwrap())).await;
    assert_eq!(
        client.recv().await,
        ServerMessage::RoomError {
            message: "Room not found".into()
        }
    );
}

#[tokio::test]
async fn test_third_player_rejected_as_full() {
    let (addr, _handle) = start_server(RelayConfig::default()).await;
    let (mut host, _guest, code) = paired(&addr).await;
    let mut third = TestClient::connect(&addr).await;
    third.send(&join(&code)).await;
    assert_eq!(
        third.recv().await,
        ServerMessage::RoomError {
            message: "Room is full".into()
        }
    );
    host.expect_silence().await;
}

// =========================================================================
// Departure
// =========================================================================

#[tokio::test]
async fn test_host_socket_close_promotes_guest() {
    let (addr, handle) = start_server(RelayConfig::default()).await;
    let (host, mut guest, code) = paired(&addr).await;
    drop(host);

    assert_eq!(guest.recv().await, ServerMessage::PlayerLeft { is_host: true });
    assert_eq!(
        guest.recv().await,
        ServerMessage::RoomInfo(RoomInfo {
            host_origin: "127.0.0.1".into(),
            guest_origin: String::new(),
            guest_ready: false,
            dark_mode: false,
        })
    );
    assert_eq!(handle.room_codes().await, vec![code.clone()]);

    // A newcomer joins the promoted host, who is asked for the maze.
    let mut newcomer = TestClient::connect(&addr).await;
    newcomer.send(&join(&code)).await;
    assert_eq!(newcomer.recv().await, ServerMessage::RoomJoined { code });
    assert_eq!(guest.recv().await, ServerMessage::RequestMaze);
}

#[tokio::test]
async fn test_last_player_leaving_removes_room() {
    let (addr, handle) = start_server(RelayConfig::default()).await;
    let (host, guest, code) = paired(&addr).await;
    drop(guest);
    drop(host);
    wait_for_room_count(&handle, 0).await;

    let mut late = TestClient::connect(&addr).await;
    late.send(&join(&code)).await;
    assert!(matches!(late.recv().await, ServerMessage::RoomError { .. }));
}

// =========================================================================
// Limits
// =========================================================================

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let config = RelayConfig {
        max_frame_len: Some(16),
        ..RelayConfig::default()
    };
    let (addr, _handle) = start_server(config).await;
    let mut client = TestClient::connect(&addr).await;
    client.send(&[10; 64]).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_idle_connection_closed_and_cleaned_up() {
    let config = RelayConfig {
        idle_timeout_secs: Some(1),
        ..RelayConfig::default()
    };
    let (addr, handle) = start_server(config).await;
    let mut host = TestClient::connect(&addr).await;
    host.send(&create(4, 4)).await;
    host.recv().await;
    host.recv().await;

    host.expect_closed().await;
    wait_for_room_count(&handle, 0).await;
}

#[tokio::test]
async fn test_room_limit_drops_create() {
    let config = RelayConfig {
        max_rooms: Some(1),
        ..RelayConfig::default()
    };
    let (addr, handle) = start_server(config).await;
    let mut first = TestClient::connect(&addr).await;
    first.send(&create(4, 4)).await;
    first.recv().await;

    let mut second = TestClient::connect(&addr).await;
    second.send(&create(4, 4)).await;
    second.expect_silence().await;
    assert_eq!(handle.room_count().await, 1);
}
