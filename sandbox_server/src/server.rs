//! Server implementation.
//!
//! An authoritative fixed-timestep loop over a sandbox world:
//! - Simulation (movement, vitality, NPC behavior, mod hooks) runs at the
//!   simulation rate with the measured wall delta.
//! - Snapshot broadcast runs on its own decoupled timer, usually slower.
//! - The simulation thread exclusively owns all mutable world state; socket
//!   I/O lives on tokio tasks that only ever see frozen encoded frames.
//!
//! Determinism notes:
//! - Keep per-tick work a function of the tick delta, never of wall-clock
//!   branching inside gameplay code.
//! - Use stable ordering when iterating collections.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sandbox_shared::{
    clock::TickTimer,
    config::ServerConfig,
    console::{CommandCategory, CommandSet, Resolution},
    ecs::World,
    mods::ModHost,
    moveable::{update_moveables, CollisionMap, Moveable, OpenField},
    net::{self, Broadcaster, PeerHandle},
    npc::NpcRegistry,
    player::PlayerIdentity,
    snapshot::{encode_chat, encode_tick},
    soul::{update_souls, Soul},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Actions the operator console can trigger. Resolution happens against
/// the registration table; execution happens here, with full access to
/// server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    /// `info network`: connected peer count and addresses.
    NetworkInfo,
    /// `info mods`: loaded mod names and how many are still active.
    ModsInfo,
    /// `chat broadcast <msg>`: send a chat frame to every peer.
    BroadcastChat,
    /// `system exit`: request shutdown; the current iteration finishes.
    Exit,
}

/// Game server.
pub struct GameServer {
    pub cfg: ServerConfig,
    world: World,
    npcs: NpcRegistry,
    mods: ModHost,
    broadcaster: Broadcaster,
    commands: CommandSet<ServerCommand>,
    collision: Box<dyn CollisionMap>,

    net_timer: TickTimer,
    tick: u64,

    exit: Arc<AtomicBool>,
    console_rx: Option<mpsc::Receiver<String>>,
    peer_rx: Option<mpsc::Receiver<PeerHandle>>,
    local_addr: Option<SocketAddr>,
}

impl GameServer {
    /// Creates a server with the given config. No sockets are bound until
    /// [`GameServer::listen`].
    pub fn new(cfg: ServerConfig) -> Self {
        let mut commands = CommandSet::new();
        Self::register_commands(&mut commands);
        let net_timer = TickTimer::new(cfg.net_tick_hz, cfg.max_catch_up, Instant::now());
        Self {
            cfg,
            world: World::new(),
            npcs: NpcRegistry::new(),
            mods: ModHost::new(),
            broadcaster: Broadcaster::new(),
            commands,
            collision: Box::new(OpenField),
            net_timer,
            tick: 0,
            exit: Arc::new(AtomicBool::new(false)),
            console_rx: None,
            peer_rx: None,
            local_addr: None,
        }
    }

    fn register_commands(commands: &mut CommandSet<ServerCommand>) {
        commands.register(CommandCategory::Info, "network", ServerCommand::NetworkInfo);
        commands.register(CommandCategory::Info, "mods", ServerCommand::ModsInfo);
        commands.register(
            CommandCategory::Chat,
            "broadcast",
            ServerCommand::BroadcastChat,
        );
        commands.register(CommandCategory::System, "exit", ServerCommand::Exit);
    }

    /// Binds the listener and starts accepting peers.
    pub async fn listen(&mut self) -> anyhow::Result<SocketAddr> {
        let (listener, local) = net::bind(&self.cfg.server_addr).await?;
        let (tx, rx) = mpsc::channel::<PeerHandle>(16);
        tokio::spawn(async move {
            if let Err(e) = net::run_listener(listener, tx).await {
                error!(error = %e, "listener stopped");
            }
        });
        self.peer_rx = Some(rx);
        self.local_addr = Some(local);
        info!(%local, "server listening");
        Ok(local)
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Shared exit flag; setting it stops the loop at the next iteration
    /// boundary.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit)
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Relaxed);
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn npcs(&self) -> &NpcRegistry {
        &self.npcs
    }

    pub fn npcs_mut(&mut self) -> &mut NpcRegistry {
        &mut self.npcs
    }

    pub fn mods_mut(&mut self) -> &mut ModHost {
        &mut self.mods
    }

    /// Runs every registered mod's `init` hook against the world.
    pub fn init_mods(&mut self) {
        self.mods.init_all(&mut self.world);
    }

    pub fn set_collision_map(&mut self, map: Box<dyn CollisionMap>) {
        self.collision = map;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn peer_count(&self) -> usize {
        self.broadcaster.peer_count()
    }

    /// Runs one simulation iteration with the measured wall `delta`.
    ///
    /// `now` also drives the decoupled broadcast timer, so a stalled host
    /// emits a clamped burst of snapshots rather than drifting.
    pub fn step_at(&mut self, delta: f64, now: Instant) {
        self.process_console();
        self.accept_pending_peers();

        self.mods.update_all(&mut self.world, delta);
        update_moveables(&mut self.world, delta, self.collision.as_ref());
        update_souls(&mut self.world, delta);
        self.npcs.update_all(delta);
        self.tick += 1;

        assert!(
            self.players_are_complete(),
            "player entity missing moveable or soul component"
        );

        for _ in 0..self.net_timer.due_ticks(now) {
            self.broadcast_snapshot();
        }
    }

    /// Every entity carrying an identity must also carry movement and
    /// vitality. A violation is a programming error and aborts the tick,
    /// in release builds too; continuing would silently drop the ghost
    /// player from every snapshot.
    fn players_are_complete(&self) -> bool {
        self.world.iter::<PlayerIdentity>().all(|(e, _)| {
            self.world.get::<Moveable>(e).is_some() && self.world.get::<Soul>(e).is_some()
        })
    }

    fn process_console(&mut self) {
        // Collect lines first to avoid borrowing self across execution.
        let lines: Vec<String> = match self.console_rx {
            Some(ref mut rx) => {
                let mut collected = Vec::new();
                while let Ok(line) = rx.try_recv() {
                    collected.push(line);
                }
                collected
            }
            None => Vec::new(),
        };
        for line in lines {
            self.exec_console(&line);
        }
    }

    /// Executes one console line. Unrecognized input logs help and is
    /// otherwise a no-op.
    pub fn exec_console(&mut self, line: &str) {
        let resolution = self.commands.resolve(line);
        match resolution {
            Resolution::Matched { action, ref input } => self.run_command(action, input),
            ref other => self.commands.report_unmatched(other),
        }
    }

    fn run_command(&mut self, action: ServerCommand, input: &str) {
        match action {
            ServerCommand::NetworkInfo => {
                info!(
                    addr = ?self.local_addr,
                    peers = self.broadcaster.peer_count(),
                    peer_ids = ?self.broadcaster.peer_ids(),
                    tick = self.tick,
                    "network status"
                );
            }
            ServerCommand::ModsInfo => {
                info!(
                    mods = ?self.mods.mod_names(),
                    active = self.mods.active_count(),
                    "mod status"
                );
            }
            ServerCommand::BroadcastChat => match encode_chat(input) {
                Ok(frame) => {
                    let delivered = self.broadcaster.broadcast(&frame);
                    info!(delivered, "chat broadcast");
                }
                Err(e) => warn!(error = %e, "chat message too large, not sent"),
            },
            ServerCommand::Exit => {
                info!("exit requested");
                self.request_exit();
            }
        }
    }

    fn accept_pending_peers(&mut self) {
        let Some(ref mut rx) = self.peer_rx else {
            return;
        };
        while let Ok(peer) = rx.try_recv() {
            self.broadcaster.add_peer(peer);
        }
    }

    /// Encodes and fans out one tick frame.
    ///
    /// An encode failure aborts this frame entirely; a truncated snapshot
    /// is never broadcast. The next due tick retries from fresh state.
    fn broadcast_snapshot(&mut self) {
        match encode_tick(&self.world, &self.npcs) {
            Ok(frame) => {
                self.broadcaster.broadcast(&frame);
            }
            Err(e) => {
                error!(error = %e, tick = self.tick, "snapshot encode failed, frame dropped");
            }
        }
    }

    /// Main loop. Returns when the exit flag is set; the iteration in
    /// flight when the flag goes up completes, including its broadcasts.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let sim_interval = std::time::Duration::from_secs_f64(1.0 / f64::from(self.cfg.tick_hz));
        let mut next_iteration = tokio::time::Instant::now() + sim_interval;
        let mut last = Instant::now();

        info!(
            tick_hz = self.cfg.tick_hz,
            net_tick_hz = self.cfg.net_tick_hz,
            "simulation loop started"
        );

        while !self.exit.load(Ordering::Relaxed) {
            let now = Instant::now();
            let delta = now.duration_since(last).as_secs_f64();
            last = now;

            self.step_at(delta, now);

            tokio::time::sleep_until(next_iteration).await;
            next_iteration += sim_interval;
        }

        info!(tick = self.tick, "simulation loop stopped");
        Ok(())
    }

    /// Test helper: runs `ticks` iterations back to back.
    pub fn run_for_ticks(&mut self, ticks: u32) {
        let delta = 1.0 / f64::from(self.cfg.tick_hz);
        for _ in 0..ticks {
            self.step_at(delta, Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_shared::math::Vec2;
    use sandbox_shared::npc::Npc;
    use sandbox_shared::player::{spawn_player, PlayerUuid};
    use sandbox_shared::snapshot::{decode_chat, decode_tick};

    fn test_server() -> GameServer {
        GameServer::new(ServerConfig::default())
    }

    fn add_test_peer(server: &mut GameServer) -> mpsc::Receiver<bytes::Bytes> {
        let (peer, rx) = PeerHandle::channel(sandbox_shared::net::PeerId::new_unique());
        server.broadcaster.add_peer(peer);
        rx
    }

    #[test]
    fn exit_command_raises_flag() {
        let mut server = test_server();
        assert!(!server.exit.load(Ordering::Relaxed));
        server.exec_console("system exit");
        assert!(server.exit.load(Ordering::Relaxed));
    }

    #[test]
    #[should_panic(expected = "player entity missing")]
    fn incomplete_player_aborts_the_tick() {
        let mut server = test_server();
        // An identity without moveable/soul is a programming error, not a
        // state the loop may carry forward.
        let ghost = server.world_mut().spawn();
        server.world_mut().insert(
            ghost,
            PlayerIdentity {
                uuid: PlayerUuid(9),
                name: "ghost".to_string(),
            },
        );
        server.step_at(1.0 / 60.0, Instant::now());
    }

    #[test]
    fn unknown_console_input_is_harmless() {
        let mut server = test_server();
        server.exec_console("frobnicate everything");
        server.exec_console("system reboot");
        server.exec_console("");
        assert!(!server.exit.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn chat_broadcast_reaches_peers() {
        let mut server = test_server();
        let mut rx = add_test_peer(&mut server);

        server.exec_console("chat broadcast brace for impact");
        let frame = rx.recv().await.unwrap();
        assert_eq!(decode_chat(&frame).unwrap(), "brace for impact");
    }

    #[tokio::test]
    async fn step_broadcasts_on_net_tick_boundary() {
        let mut server = test_server();
        let mut rx = add_test_peer(&mut server);

        spawn_player(
            server.world_mut(),
            PlayerIdentity {
                uuid: PlayerUuid(42),
                name: "tester".to_string(),
            },
            Vec2::new(0.0, 1.0),
        );
        server.npcs_mut().spawn(Npc::slime(Vec2::ZERO));

        // One network interval past the timer origin: exactly one frame due.
        let later = Instant::now() + server.net_timer.interval();
        server.step_at(1.0 / 60.0, later);

        let frame = rx.recv().await.unwrap();
        let decoded = decode_tick(&frame).unwrap();
        assert_eq!(decoded.players.len(), 1);
        assert_eq!(decoded.players[0].identity, 42);
        assert_eq!(decoded.npcs.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn simulation_rate_outpaces_network_rate() {
        let mut server = test_server();
        let start = Instant::now();
        let sim_dt = 1.0 / f64::from(server.cfg.tick_hz);

        // Two seconds of perfectly paced iterations.
        let mut broadcast_ticks = 0;
        for i in 1..=120u32 {
            let now = start + std::time::Duration::from_secs_f64(sim_dt * f64::from(i));
            broadcast_ticks += server.net_timer.due_ticks(now);
            server.tick += 1;
        }
        assert_eq!(server.tick, 120);
        // 32 Hz over ~2s, allowing for interval rounding.
        assert!((63..=65).contains(&broadcast_ticks), "{broadcast_ticks}");
    }

    #[test]
    fn run_for_ticks_advances_simulation() {
        let mut server = test_server();
        spawn_player(
            server.world_mut(),
            PlayerIdentity {
                uuid: PlayerUuid(1),
                name: "faller".to_string(),
            },
            Vec2::new(0.0, 10.0),
        );
        // Mark airborne so gravity applies.
        let id = server
            .world()
            .iter::<PlayerIdentity>()
            .next()
            .map(|(e, _)| e)
            .unwrap();
        server.world_mut().get_mut::<Moveable>(id).unwrap().jumping = true;

        server.run_for_ticks(30);
        assert_eq!(server.tick(), 30);
        let m = server.world().get::<Moveable>(id).unwrap();
        assert!(m.position.y < 10.0);
    }
}
