//! Integration tests driving a real server over real sockets.
//!
//! Each test binds an ephemeral port, runs the production accept loop on
//! it, and speaks the wire protocol through plain `TcpStream`s.

use server::{acceptor, board::BoardState};
use shared::BoardConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// The standard fixture board: 10x10, 2x2 notes, colors RED/BLUE/WHITE.
async fn spawn_server() -> SocketAddr {
    spawn_server_with(BoardConfig::new(
        10,
        10,
        2,
        2,
        ["red", "blue", "white"].map(String::from),
    ))
    .await
}

async fn spawn_server_with(config: BoardConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let board = Arc::new(RwLock::new(BoardState::new(config)));
    tokio::spawn(acceptor::serve(listener, board, 8));
    addr
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connects and consumes the handshake, returning its four lines.
    async fn connect(addr: SocketAddr) -> (Self, Vec<String>) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut client = TestClient {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        let mut handshake = Vec::new();
        for _ in 0..4 {
            handshake.push(client.read_line().await);
        }
        (client, handshake)
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "unexpected EOF from server");
        line.trim_end().to_string()
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Sends one command and returns its single-line reply.
    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }

    /// Sends a query and returns the lines inside the DATA envelope.
    async fn request_block(&mut self, line: &str) -> Vec<String> {
        self.send(line).await;
        let first = self.read_line().await;
        assert_eq!(first, "DATA BEGIN", "expected a data block, got: {first}");
        let mut body = Vec::new();
        loop {
            let line = self.read_line().await;
            if line == "DATA END" {
                break;
            }
            body.push(line);
        }
        body
    }
}

#[tokio::test]
async fn handshake_advertises_board_note_and_sorted_colors() {
    let addr = spawn_server().await;
    let (_client, handshake) = TestClient::connect(addr).await;
    assert_eq!(
        handshake,
        vec![
            "BOARD 10 10".to_string(),
            "NOTE 2 2".to_string(),
            "COLORS BLUE RED WHITE".to_string(),
            "OK READY".to_string(),
        ]
    );
}

#[tokio::test]
async fn post_then_query_by_substring() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(client.request("POST 0 0 red Hello world").await, "OK POSTED 1");
    let notes = client.request_block("GET refersTo=hello").await;
    assert_eq!(notes, vec!["NOTE 1 0 0 RED UNPINNED Hello world".to_string()]);
}

#[tokio::test]
async fn complete_overlap_is_rejected_with_colliding_id() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(client.request("POST 0 0 red Hello world").await, "OK POSTED 1");
    assert_eq!(
        client.request("POST 0 0 blue Again").await,
        "ERROR OVERLAP_ERROR Complete overlap not allowed with note id=1"
    );
}

#[tokio::test]
async fn out_of_bounds_post_is_rejected() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    // 9 + 2 > 10 on the x axis.
    let reply = client.request("POST 9 0 blue X").await;
    assert!(
        reply.starts_with("ERROR OUT_OF_BOUNDS "),
        "unexpected reply: {reply}"
    );
}

#[tokio::test]
async fn pin_protects_note_through_shake() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(client.request("POST 4 4 white Keep me").await, "OK POSTED 1");
    assert_eq!(client.request("PIN 5 5").await, "OK PINNED 5 5");
    assert_eq!(client.request("POST 0 0 red Drop me").await, "OK POSTED 2");
    assert_eq!(client.request("SHAKE").await, "OK SHAKEN REMOVED 1");

    let notes = client.request_block("GET").await;
    assert_eq!(notes, vec!["NOTE 1 4 4 WHITE PINNED Keep me".to_string()]);
}

#[tokio::test]
async fn invalid_color_filter_reports_canonical_name() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(
        client.request("GET color=green").await,
        "ERROR INVALID_COLOR Invalid color: GREEN"
    );
}

#[tokio::test]
async fn get_pins_lists_sorted_by_row_then_column() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    client.request("POST 0 0 red a").await;
    client.request("POST 4 0 blue b").await;
    client.request("POST 0 4 white c").await;
    client.request("PIN 5 1").await;
    client.request("PIN 0 4").await;
    client.request("PIN 1 1").await;

    let pins = client.request_block("GET PINS").await;
    assert_eq!(
        pins,
        vec![
            "PIN 1 1".to_string(),
            "PIN 5 1".to_string(),
            "PIN 0 4".to_string(),
        ]
    );
}

#[tokio::test]
async fn clear_empties_board_but_ids_keep_growing() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(client.request("POST 0 0 red a").await, "OK POSTED 1");
    assert_eq!(client.request("POST 4 4 red b").await, "OK POSTED 2");
    client.request("PIN 4 4").await;
    assert_eq!(client.request("CLEAR").await, "OK CLEARED");

    assert!(client.request_block("GET").await.is_empty());
    assert!(client.request_block("GET PINS").await.is_empty());
    assert_eq!(client.request("POST 0 0 red c").await, "OK POSTED 3");
}

#[tokio::test]
async fn malformed_lines_keep_the_session_open() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    let reply = client.request("FROB 1 2").await;
    assert_eq!(reply, "ERROR INVALID_FORMAT Unknown command");
    let reply = client.request("POST 1 2").await;
    assert!(reply.starts_with("ERROR INVALID_FORMAT "));

    // The session still works afterwards.
    assert_eq!(client.request("POST 0 0 red still here").await, "OK POSTED 1");
}

#[tokio::test]
async fn disconnect_replies_bye_then_closes() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    assert_eq!(client.request("DISCONNECT").await, "OK BYE");
    let mut line = String::new();
    let n = client.reader.read_line(&mut line).await.unwrap();
    assert_eq!(n, 0, "server should close after OK BYE");
}

#[tokio::test]
async fn sessions_share_one_board() {
    let addr = spawn_server().await;
    let (mut alice, _) = TestClient::connect(addr).await;
    let (mut bob, _) = TestClient::connect(addr).await;

    assert_eq!(alice.request("POST 0 0 red from alice").await, "OK POSTED 1");
    let notes = bob.request_block("GET").await;
    assert_eq!(notes, vec!["NOTE 1 0 0 RED UNPINNED from alice".to_string()]);
}

#[tokio::test]
async fn carriage_returns_are_tolerated() {
    let addr = spawn_server().await;
    let (mut client, _) = TestClient::connect(addr).await;

    client.send("POST 0 0 red windows line\r").await;
    assert_eq!(client.read_line().await, "OK POSTED 1");
    let notes = client.request_block("GET").await;
    assert_eq!(notes, vec!["NOTE 1 0 0 RED UNPINNED windows line".to_string()]);
}

/// Two sessions race: one posts continuously, the other shakes. After a
/// completed SHAKE, no observable note may predate it. The poster records
/// the highest id the server acknowledged; any note visible after a shake
/// must be newer than every id acknowledged before the shake was issued.
#[tokio::test]
async fn shake_is_atomic_against_concurrent_posts() {
    let addr = spawn_server_with(BoardConfig::new(
        100,
        100,
        1,
        1,
        ["red"].map(String::from),
    ))
    .await;
    let acked = Arc::new(AtomicU32::new(0));

    let poster = {
        let acked = Arc::clone(&acked);
        tokio::spawn(async move {
            let (mut client, _) = TestClient::connect(addr).await;
            for i in 0..200u32 {
                let (x, y) = (i % 100, i / 100);
                let reply = client.request(&format!("POST {x} {y} red note {i}")).await;
                let id: u32 = reply
                    .strip_prefix("OK POSTED ")
                    .unwrap_or_else(|| panic!("post failed: {reply}"))
                    .parse()
                    .unwrap();
                acked.store(id, Ordering::SeqCst);
            }
        })
    };

    let (mut shaker, _) = TestClient::connect(addr).await;
    for _ in 0..20 {
        let floor = acked.load(Ordering::SeqCst);
        let reply = shaker.request("SHAKE").await;
        assert!(reply.starts_with("OK SHAKEN REMOVED "), "got: {reply}");

        for line in shaker.request_block("GET").await {
            let mut fields = line.split_whitespace();
            assert_eq!(fields.next(), Some("NOTE"));
            let id: u32 = fields.next().unwrap().parse().unwrap();
            assert!(
                id > floor,
                "note {id} predates the completed shake (floor {floor})"
            );
        }
        tokio::task::yield_now().await;
    }

    poster.await.unwrap();
}
