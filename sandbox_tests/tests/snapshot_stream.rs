//! Full socket-based integration tests for the snapshot broadcast stream.

use std::time::Duration;

use sandbox_server::server::GameServer;
use sandbox_shared::config::ServerConfig;
use sandbox_shared::math::Vec2;
use sandbox_shared::npc::Npc;
use sandbox_shared::player::{spawn_player, PlayerIdentity, PlayerUuid};
use sandbox_shared::snapshot::{decode_chat, decode_tick};
use sandbox_shared::wire::{TAG_CHAT, TAG_TICK};
use sandbox_tests::read_frame;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

fn ephemeral_config() -> ServerConfig {
    ServerConfig {
        server_addr: "127.0.0.1:0".to_string(),
        tick_hz: 60,
        ..Default::default()
    }
}

/// Full integration: spawn server, connect a raw TCP client, decode the
/// broadcast tick frames.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connected_peer_receives_decodable_snapshots() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let mut server = GameServer::new(ephemeral_config());
    spawn_player(
        server.world_mut(),
        PlayerIdentity {
            uuid: PlayerUuid(0xA1),
            name: "alice".to_string(),
        },
        Vec2::new(0.0, 1.0),
    );
    spawn_player(
        server.world_mut(),
        PlayerIdentity {
            uuid: PlayerUuid(0xB2),
            name: "bob".to_string(),
        },
        Vec2::new(3.0, 1.0),
    );
    let npc_id = server.npcs_mut().spawn(Npc::slime(Vec2::new(8.0, 0.0)));

    let local = server.listen().await?;
    let exit = server.exit_flag();
    let handle = tokio::spawn(async move { server.run().await });

    let mut client = TcpStream::connect(local).await?;
    let frame = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut client)).await??;

    assert_eq!(frame[0], TAG_TICK);
    let decoded = decode_tick(&frame)?;
    assert_eq!(decoded.players.len(), 2);
    let mut identities: Vec<u64> = decoded.players.iter().map(|p| p.identity).collect();
    identities.sort_unstable();
    assert_eq!(identities, vec![0xA1, 0xB2]);
    assert_eq!(decoded.npcs.len(), 1);
    assert_eq!(decoded.npcs[0].id, npc_id);

    exit.store(true, std::sync::atomic::Ordering::Relaxed);
    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}

/// Console-driven chat reaches connected peers between tick frames, and
/// `system exit` shuts the loop down cleanly.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn console_chat_and_exit_reach_the_stream() -> anyhow::Result<()> {
    let mut server = GameServer::new(ephemeral_config());
    let (console_tx, console_rx) = mpsc::channel::<String>(8);
    server.set_console_input(console_rx);

    let local = server.listen().await?;
    let handle = tokio::spawn(async move { server.run().await });

    let mut client = TcpStream::connect(local).await?;

    // First tick frame confirms the peer is registered.
    let frame = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut client)).await??;
    assert_eq!(frame[0], TAG_TICK);

    console_tx.send("chat broadcast hello there".to_string()).await?;

    // Skip tick frames until the chat frame shows up.
    let chat = loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), read_frame(&mut client)).await??;
        if frame[0] == TAG_CHAT {
            break frame;
        }
    };
    assert_eq!(decode_chat(&chat)?, "hello there");

    console_tx.send("system exit".to_string()).await?;
    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}
