//! Per-connection session handling: handshake, line dispatch, replies.
//!
//! Each accepted socket gets one session task. The session performs the
//! four-line handshake, then reads one command line at a time, executes it
//! against the shared board under the appropriate side of the lock, and
//! writes exactly one reply message before reading the next line. Protocol
//! failures become a single `ERROR …` line and the session continues; only
//! socket I/O errors (or `DISCONNECT`, or EOF) end it.

use crate::board::BoardState;
use log::{debug, info};
use shared::{parse_command, wire, Command};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::RwLock;

/// Runs a session to completion, logging the connection lifecycle.
pub async fn handle_session(stream: TcpStream, addr: SocketAddr, board: Arc<RwLock<BoardState>>) {
    info!("Connected: {addr}");
    if let Err(e) = run_session(stream, addr, board).await {
        debug!("Session I/O error ({addr}): {e}");
    }
    info!("Disconnected: {addr}");
}

async fn run_session(
    stream: TcpStream,
    addr: SocketAddr,
    board: Arc<RwLock<BoardState>>,
) -> std::io::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    let handshake = {
        let state = board.read().await;
        wire::handshake(state.config())
    };
    write_reply(&mut writer, &handshake).await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break; // EOF
        }
        // Tolerates CR before the LF and surrounding whitespace.
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!("{addr} -> {trimmed}");

        let command = match parse_command(trimmed) {
            Ok(command) => command,
            Err(e) => {
                write_reply(&mut writer, &wire::error_line(&e)).await?;
                continue;
            }
        };

        let disconnect = matches!(command, Command::Disconnect);
        let reply = execute(&board, command).await;
        write_reply(&mut writer, &reply).await?;
        if disconnect {
            break;
        }
    }
    Ok(())
}

/// Executes one parsed command against the board and renders the reply.
///
/// Mutators take the write lock, queries the read lock; each arm acquires
/// the lock once and holds it across validation and mutation, so a failed
/// precondition leaves no partial state behind.
async fn execute(board: &Arc<RwLock<BoardState>>, command: Command) -> String {
    match command {
        Command::Post {
            x,
            y,
            color,
            message,
        } => {
            let mut state = board.write().await;
            match state.post(x, y, color, message) {
                Ok(id) => wire::posted(id),
                Err(e) => wire::error_line(&e),
            }
        }
        Command::Pin { x, y } => {
            let mut state = board.write().await;
            match state.pin(x, y) {
                Ok(()) => wire::pinned(x, y),
                Err(e) => wire::error_line(&e),
            }
        }
        Command::Unpin { x, y } => {
            let mut state = board.write().await;
            match state.unpin(x, y) {
                Ok(()) => wire::unpinned(x, y),
                Err(e) => wire::error_line(&e),
            }
        }
        Command::Shake => {
            let mut state = board.write().await;
            wire::shaken(state.shake())
        }
        Command::Clear => {
            let mut state = board.write().await;
            state.clear();
            wire::cleared()
        }
        Command::GetPins => {
            let state = board.read().await;
            let lines: Vec<String> = state
                .pins_sorted()
                .into_iter()
                .map(wire::pin_line)
                .collect();
            wire::data_block(&lines)
        }
        Command::Get(query) => {
            let state = board.read().await;
            match state.notes_filtered(&query) {
                Ok(notes) => {
                    let lines: Vec<String> = notes
                        .iter()
                        .map(|(note, pinned)| wire::note_line(note, *pinned))
                        .collect();
                    wire::data_block(&lines)
                }
                Err(e) => wire::error_line(&e),
            }
        }
        Command::Disconnect => wire::bye(),
    }
}

/// Writes one complete reply message (single line or DATA block) followed
/// by its terminator, flushing once so the reply is fully emitted before
/// the next command is read.
async fn write_reply<W>(writer: &mut BufWriter<W>, reply: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
