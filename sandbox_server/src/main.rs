//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p sandbox_server -- [--addr 127.0.0.1:40000] [--tick-hz 60] [--mods-dir mods]
//!
//! The server accepts client connections, runs a fixed timestep simulation,
//! and broadcasts world snapshots at the (slower) network tick rate.
//!
//! Console commands:
//!   info network             - Connected peers and current tick
//!   info mods                - Loaded mods
//!   chat broadcast <msg>     - Send a chat message to all peers
//!   system exit              - Shutdown server

use std::env;
use std::path::Path;

use anyhow::Context;
use sandbox_server::server::GameServer;
use sandbox_shared::config::ServerConfig;
use sandbox_shared::console::spawn_stdin_reader;
use sandbox_shared::math::Vec2;
use sandbox_shared::ecs::World;
use sandbox_shared::mods::{load_descriptors, ModRuntime};
use sandbox_shared::npc::Npc;
use tracing::info;

fn parse_args() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            "--net-tick-hz" if i + 1 < args.len() => {
                cfg.net_tick_hz = args[i + 1].parse().unwrap_or(32);
                i += 2;
            }
            "--mods-dir" if i + 1 < args.len() => {
                cfg.mods_dir = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

/// Placeholder runtime for descriptor-only mods; behavior hooks arrive
/// with the scripting host.
struct DataMod;

impl ModRuntime for DataMod {
    fn init(&mut self, _world: &mut World) -> anyhow::Result<()> {
        Ok(())
    }

    fn update(&mut self, _world: &mut World, _delta: f64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A handful of ambient creatures so a fresh world is not empty.
fn seed_world(server: &mut GameServer) {
    server.npcs_mut().spawn(Npc::slime(Vec2::new(4.0, 0.0)));
    server.npcs_mut().spawn(Npc::rabbit(Vec2::new(-6.0, 0.0)));
    server.npcs_mut().spawn(Npc::blue_blob(Vec2::new(12.0, 0.0)));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, mods_dir = %cfg.mods_dir, "starting server");

    let descriptors = load_descriptors(Path::new(&cfg.mods_dir));
    info!(count = descriptors.len(), "mod descriptors loaded");

    let mut server = GameServer::new(cfg);
    for descriptor in descriptors {
        server.mods_mut().register(descriptor, Box::new(DataMod));
    }
    server.init_mods();
    seed_world(&mut server);

    let local = server.listen().await.context("bind listener")?;
    info!(%local, "server ready; type 'system exit' to quit");

    server.set_console_input(spawn_stdin_reader(32));

    server.run().await
}
