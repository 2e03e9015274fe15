//! Minimal interactive peer for manual testing: prints every server line
//! and forwards stdin lines verbatim. Any conforming client works against
//! the server; this one is just the smallest possible.

use clap::Parser;
use shared::wire;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server host to connect to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[clap(short, long, default_value = "4242")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    println!("Connected to {}", stream.peer_addr()?);

    let (read_half, mut write_half) = stream.into_split();

    // Print every server line as it arrives, including the handshake.
    let reader_task = tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("< {line}");
            if line == wire::bye() {
                break;
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        write_half.write_all(line.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        if line.trim().eq_ignore_ascii_case("DISCONNECT") {
            break;
        }
    }

    let _ = reader_task.await;
    Ok(())
}
