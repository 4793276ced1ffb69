//! Integration test support.
//!
//! The tests in `tests/` exercise the server crates end to end over real
//! sockets; shared helpers live here.

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Reads one length-prefixed frame from a snapshot stream.
pub async fn read_frame(stream: &mut TcpStream) -> anyhow::Result<Vec<u8>> {
    let mut len = [0u8; 4];
    stream
        .read_exact(&mut len)
        .await
        .context("read frame length")?;
    let len = u32::from_be_bytes(len) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.context("read frame body")?;
    Ok(buf)
}
