//! Player identity.
//!
//! A connected player is an entity carrying `PlayerIdentity`, `Moveable`
//! and `Soul` together. Snapshots select players by that exact component
//! intersection, so an entity missing any of the three is never replicated
//! as a player.

use std::fmt;

use crate::ecs::{EntityId, World};
use crate::math::Vec2;
use crate::moveable::Moveable;
use crate::soul::Soul;

/// Stable 64-bit identity distinguishing a player across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerUuid(pub u64);

impl PlayerUuid {
    pub fn new_random() -> Self {
        Self(rand::random::<u64>())
    }
}

impl fmt::Display for PlayerUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity component attached to every connected player entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerIdentity {
    pub uuid: PlayerUuid,
    pub name: String,
}

/// Spawns a player entity with the full component set at `position`.
///
/// Attaching identity, moveable and soul in one place keeps the player-view
/// invariant from ever being violated piecemeal.
pub fn spawn_player(world: &mut World, identity: PlayerIdentity, position: Vec2) -> EntityId {
    let entity = world.spawn();
    let mut moveable = Moveable::player_default();
    moveable.position = position;
    world.insert(entity, identity);
    world.insert(entity, moveable);
    world.insert(entity, Soul::default());
    entity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_player_has_full_component_set() {
        let mut world = World::new();
        let identity = PlayerIdentity {
            uuid: PlayerUuid::new_random(),
            name: "tester".to_string(),
        };
        let e = spawn_player(&mut world, identity, Vec2::new(1.0, 2.0));
        assert!(world.get::<PlayerIdentity>(e).is_some());
        assert!(world.get::<Soul>(e).is_some());
        assert_eq!(
            world.get::<Moveable>(e).unwrap().position,
            Vec2::new(1.0, 2.0)
        );
    }

    #[test]
    fn uuid_formats_as_hex() {
        let uuid = PlayerUuid(0xdead_beef);
        assert_eq!(uuid.to_string(), "00000000deadbeef");
    }
}
