//! `sandbox_shared`
//!
//! Shared libraries used by the sandbox world server.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (clock, ecs, wire, net, console, mods).
//! - Explicit little-endian wire layout, never host-dependent.
//! - No `unsafe`.

pub mod clock;
pub mod config;
pub mod console;
pub mod ecs;
pub mod math;
pub mod mods;
pub mod moveable;
pub mod net;
pub mod npc;
pub mod player;
pub mod snapshot;
pub mod soul;
pub mod wire;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::clock::TickTimer;
    pub use crate::config::ServerConfig;
    pub use crate::ecs::{EntityId, World};
    pub use crate::math::Vec2;
    pub use crate::moveable::{Moveable, MoveableIncrement, PlayerInput};
    pub use crate::npc::{Npc, NpcId, NpcRegistry};
    pub use crate::player::{PlayerIdentity, PlayerUuid};
    pub use crate::snapshot::{decode_tick, encode_tick};
    pub use crate::soul::Soul;
}
