//! Tick snapshot encoding.
//!
//! Once per network tick the server walks the registry and serializes the
//! replicated state into a single frame:
//!
//! ```text
//! [TAG_TICK:u8]
//! [player_count:u32] then per player:
//!     [identity:u64][movement increment][vitality:f32]
//! [npc_count:u32] then per NPC:
//!     [npc_id:u32][kind-specific incremental payload]
//! ```
//!
//! Players are exactly the `{PlayerIdentity, Moveable, Soul}` view; an
//! entity missing any of the three never appears. Ordering follows registry
//! iteration order, not id order; clients key off the id fields.
//!
//! Encoding is all-or-nothing: any write failure aborts the frame, so a
//! truncated snapshot is never broadcast. The frame lives for one tick; it
//! is produced, broadcast, and dropped, never diffed against history.

use bytes::Bytes;

use crate::ecs::World;
use crate::moveable::{Moveable, MoveableIncrement};
use crate::npc::{NpcId, NpcIncrement, NpcRegistry};
use crate::player::PlayerIdentity;
use crate::soul::Soul;
use crate::wire::{FrameReader, FrameWriter, WireError, MAX_FRAME_BYTES, TAG_CHAT, TAG_TICK};

/// Encodes the tick frame for the current registry state.
///
/// Deterministic: encoding the same unmutated state twice yields
/// byte-identical output.
pub fn encode_tick(world: &World, npcs: &NpcRegistry) -> Result<Bytes, WireError> {
    let mut w = FrameWriter::new(MAX_FRAME_BYTES);
    w.put_u8(TAG_TICK)?;

    let player_count = world.view3::<PlayerIdentity, Moveable, Soul>().count();
    w.put_u32(player_count as u32)?;
    for (_, identity, moveable, soul) in world.view3::<PlayerIdentity, Moveable, Soul>() {
        w.put_u64(identity.uuid.0)?;
        moveable.increment().encode(&mut w)?;
        w.put_f32(soul.hp())?;
    }

    w.put_u32(npcs.len() as u32)?;
    for (id, npc) in npcs.iter() {
        w.put_u32(id.0)?;
        npc.encode_increment(&mut w)?;
    }

    Ok(w.finish())
}

/// One player's record in a decoded tick frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub identity: u64,
    pub movement: MoveableIncrement,
    pub vitality: f32,
}

/// One NPC's record in a decoded tick frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcRecord {
    pub id: NpcId,
    pub increment: NpcIncrement,
}

/// A decoded tick frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFrame {
    pub players: Vec<PlayerRecord>,
    pub npcs: Vec<NpcRecord>,
}

/// Decodes a tick frame. Fails on a wrong tag or a truncated buffer.
pub fn decode_tick(bytes: &[u8]) -> Result<TickFrame, WireError> {
    let mut r = FrameReader::new(bytes);
    let tag = r.get_u8()?;
    if tag != TAG_TICK {
        return Err(WireError::UnexpectedTag(tag));
    }

    let player_count = r.get_u32()?;
    let mut players = Vec::with_capacity(player_count as usize);
    for _ in 0..player_count {
        players.push(PlayerRecord {
            identity: r.get_u64()?,
            movement: MoveableIncrement::decode(&mut r)?,
            vitality: r.get_f32()?,
        });
    }

    let npc_count = r.get_u32()?;
    let mut npcs = Vec::with_capacity(npc_count as usize);
    for _ in 0..npc_count {
        npcs.push(NpcRecord {
            id: NpcId(r.get_u32()?),
            increment: NpcIncrement::decode(&mut r)?,
        });
    }

    Ok(TickFrame { players, npcs })
}

/// Encodes a server chat broadcast.
pub fn encode_chat(message: &str) -> Result<Bytes, WireError> {
    let mut w = FrameWriter::new(MAX_FRAME_BYTES);
    w.put_u8(TAG_CHAT)?;
    w.put_str(message)?;
    Ok(w.finish())
}

/// Decodes a server chat broadcast.
pub fn decode_chat(bytes: &[u8]) -> Result<String, WireError> {
    let mut r = FrameReader::new(bytes);
    let tag = r.get_u8()?;
    if tag != TAG_CHAT {
        return Err(WireError::UnexpectedTag(tag));
    }
    r.get_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::npc::Npc;
    use crate::player::{spawn_player, PlayerIdentity, PlayerUuid};

    fn sample_world() -> (World, NpcRegistry) {
        let mut world = World::new();
        spawn_player(
            &mut world,
            PlayerIdentity {
                uuid: PlayerUuid(0xA),
                name: "a".to_string(),
            },
            Vec2::new(1.0, 0.0),
        );
        spawn_player(
            &mut world,
            PlayerIdentity {
                uuid: PlayerUuid(0xB),
                name: "b".to_string(),
            },
            Vec2::new(2.0, 0.0),
        );
        let mut npcs = NpcRegistry::new();
        npcs.spawn(Npc::slime(Vec2::new(5.0, 0.0)));
        (world, npcs)
    }

    #[test]
    fn encoding_is_deterministic() {
        let (world, npcs) = sample_world();
        let a = encode_tick(&world, &npcs).unwrap();
        let b = encode_tick(&world, &npcs).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn frame_starts_with_tick_tag() {
        let (world, npcs) = sample_world();
        let bytes = encode_tick(&world, &npcs).unwrap();
        assert_eq!(bytes[0], TAG_TICK);
    }

    #[test]
    fn counts_and_ids_roundtrip() {
        let (world, npcs) = sample_world();
        let frame = decode_tick(&encode_tick(&world, &npcs).unwrap()).unwrap();
        assert_eq!(frame.players.len(), 2);
        let mut identities: Vec<u64> = frame.players.iter().map(|p| p.identity).collect();
        identities.sort_unstable();
        assert_eq!(identities, vec![0xA, 0xB]);
        assert_eq!(frame.npcs.len(), 1);
    }

    #[test]
    fn partial_players_are_excluded() {
        let (mut world, npcs) = sample_world();
        // An identity without moveable/soul must never reach the player section.
        let ghost = world.spawn();
        world.insert(
            ghost,
            PlayerIdentity {
                uuid: PlayerUuid(0xDEAD),
                name: "ghost".to_string(),
            },
        );
        let frame = decode_tick(&encode_tick(&world, &npcs).unwrap()).unwrap();
        assert_eq!(frame.players.len(), 2);
        assert!(frame.players.iter().all(|p| p.identity != 0xDEAD));
    }

    #[test]
    fn empty_world_still_encodes() {
        let world = World::new();
        let npcs = NpcRegistry::new();
        let frame = decode_tick(&encode_tick(&world, &npcs).unwrap()).unwrap();
        assert!(frame.players.is_empty());
        assert!(frame.npcs.is_empty());
    }

    #[test]
    fn chat_roundtrip() {
        let bytes = encode_chat("server restarting soon").unwrap();
        assert_eq!(bytes[0], TAG_CHAT);
        assert_eq!(decode_chat(&bytes).unwrap(), "server restarting soon");
    }

    #[test]
    fn tick_decoder_rejects_chat_frames() {
        let bytes = encode_chat("hi").unwrap();
        assert_eq!(decode_tick(&bytes), Err(WireError::UnexpectedTag(TAG_CHAT)));
    }
}
