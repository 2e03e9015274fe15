use clap::Parser;
use log::info;
use server::{acceptor, board::BoardState};
use shared::BoardConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// TCP port to listen on
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Board width
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    board_width: u32,

    /// Board height
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    board_height: u32,

    /// Note width
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    note_width: u32,

    /// Note height
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    note_height: u32,

    /// Allowed note colors (at least one)
    #[clap(required = true, num_args = 1..)]
    colors: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info cargo run");
    }

    let args = Args::parse();
    let config = BoardConfig::new(
        args.board_width,
        args.board_height,
        args.note_width,
        args.note_height,
        args.colors,
    );

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("Bulletin board server listening on port {}", args.port);
    info!(
        "Board: {}x{} | Note: {}x{}",
        config.board_width, config.board_height, config.note_width, config.note_height
    );
    info!(
        "Colors: {}",
        config.colors().collect::<Vec<_>>().join(" ")
    );

    let board = Arc::new(RwLock::new(BoardState::new(config)));
    acceptor::serve(listener, board, acceptor::default_session_workers()).await?;

    Ok(())
}
