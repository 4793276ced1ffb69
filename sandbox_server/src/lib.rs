//! `sandbox_server`
//!
//! Server-side systems:
//! - Fixed timestep simulation loop with decoupled snapshot broadcast
//! - Player and NPC simulation (movement, vitality, behavior)
//! - Mod host driving per-tick script hooks
//! - Operator console (`info`/`system`/`chat` command categories)
//!
//! Networking model:
//! - TCP: length-prefixed snapshot stream, server to client
//! - Broadcast fan-out never blocks the simulation thread

pub mod server;

pub use server::{GameServer, ServerCommand};
