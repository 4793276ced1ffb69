//! NPC directory.
//!
//! NPCs live in their own registry keyed by `NpcId` (distinct from the
//! generic entity registry), so content can insert and remove NPCs without
//! disturbing the ids of survivors. Behavior is a closed set of variants
//! with a fixed dispatch contract (`update`, `encode_increment`) resolved
//! at spawn time, not ad-hoc callbacks.

use std::collections::HashMap;

use rand::Rng;

use crate::math::Vec2;
use crate::moveable::{Moveable, MoveableIncrement};
use crate::soul::Soul;
use crate::wire::{FrameReader, FrameWriter, WireError};

/// Identifier in the NPC directory. Monotonic, never recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NpcId(pub u32);

/// Behavior variant, one per NPC kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Brain {
    /// Creeps steadily in its heading direction, reversing at random.
    Slime { heading: f32 },
    /// Hops in a random direction when its timer expires.
    Rabbit { hop_timer: f32 },
    /// Drifts; becomes aggressive when hurt.
    BlueBlob { aggro: bool },
}

impl Brain {
    const TAG_SLIME: u8 = 0;
    const TAG_RABBIT: u8 = 1;
    const TAG_BLUE_BLOB: u8 = 2;

    fn tag(&self) -> u8 {
        match self {
            Brain::Slime { .. } => Self::TAG_SLIME,
            Brain::Rabbit { .. } => Self::TAG_RABBIT,
            Brain::BlueBlob { .. } => Self::TAG_BLUE_BLOB,
        }
    }
}

/// One live NPC: behavior plus the same movement/vitality state players use.
#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    pub brain: Brain,
    pub moveable: Moveable,
    pub soul: Soul,
}

impl Npc {
    pub fn slime(position: Vec2) -> Self {
        let mut moveable = Moveable::player_default();
        moveable.position = position;
        moveable.velocity_max = 1.5;
        Self {
            brain: Brain::Slime { heading: 1.0 },
            moveable,
            soul: Soul::new(30.0),
        }
    }

    pub fn rabbit(position: Vec2) -> Self {
        let mut moveable = Moveable::player_default();
        moveable.position = position;
        moveable.velocity_max = 4.0;
        Self {
            brain: Brain::Rabbit { hop_timer: 0.0 },
            moveable,
            soul: Soul::new(10.0),
        }
    }

    pub fn blue_blob(position: Vec2) -> Self {
        let mut moveable = Moveable::player_default();
        moveable.position = position;
        moveable.velocity_max = 2.0;
        Self {
            brain: Brain::BlueBlob { aggro: false },
            moveable,
            soul: Soul::new(50.0),
        }
    }

    /// Advances this NPC's behavior by `delta` seconds.
    pub fn update(&mut self, delta: f64) {
        let dt = delta as f32;
        self.soul.tick_timeout(dt);
        match &mut self.brain {
            Brain::Slime { heading } => {
                if rand::thread_rng().gen_bool((0.2 * delta).min(1.0)) {
                    *heading = -*heading;
                }
                self.moveable.velocity.x = *heading * self.moveable.velocity_max;
                self.moveable.position.x += self.moveable.velocity.x * dt;
            }
            Brain::Rabbit { hop_timer } => {
                *hop_timer -= dt;
                if *hop_timer <= 0.0 {
                    let mut rng = rand::thread_rng();
                    let dir = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    self.moveable.velocity.x = dir * self.moveable.velocity_max;
                    *hop_timer = rng.gen_range(0.5..2.0);
                }
                self.moveable.position.x += self.moveable.velocity.x * dt;
                // Friction between hops.
                self.moveable.velocity.x *= 1.0 - dt.min(1.0);
            }
            Brain::BlueBlob { aggro } => {
                if !self.soul.is_alive() {
                    *aggro = false;
                } else if self.soul.hp() < 50.0 {
                    *aggro = true;
                }
                let speed = if *aggro {
                    self.moveable.velocity_max
                } else {
                    self.moveable.velocity_max * 0.25
                };
                self.moveable.velocity.x = speed;
                self.moveable.position.x += speed * dt;
            }
        }
    }

    /// Writes this NPC's kind-specific incremental payload.
    pub fn encode_increment(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.put_u8(self.brain.tag())?;
        self.moveable.increment().encode(w)?;
        w.put_f32(self.soul.hp())?;
        match &self.brain {
            Brain::Slime { heading } => w.put_f32(*heading),
            Brain::Rabbit { hop_timer } => w.put_f32(*hop_timer),
            Brain::BlueBlob { aggro } => w.put_u8(u8::from(*aggro)),
        }
    }
}

/// Decoded form of an NPC's incremental payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcIncrement {
    pub brain: Brain,
    pub movement: MoveableIncrement,
    pub hp: f32,
}

impl NpcIncrement {
    pub fn decode(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        let tag = r.get_u8()?;
        let movement = MoveableIncrement::decode(r)?;
        let hp = r.get_f32()?;
        let brain = match tag {
            Brain::TAG_SLIME => Brain::Slime {
                heading: r.get_f32()?,
            },
            Brain::TAG_RABBIT => Brain::Rabbit {
                hop_timer: r.get_f32()?,
            },
            Brain::TAG_BLUE_BLOB => Brain::BlueBlob {
                aggro: r.get_u8()? != 0,
            },
            other => return Err(WireError::UnexpectedTag(other)),
        };
        Ok(Self {
            brain,
            movement,
            hp,
        })
    }
}

/// Directory of live NPCs, iterated in insertion order.
#[derive(Default)]
pub struct NpcRegistry {
    next_id: u32,
    order: Vec<NpcId>,
    npcs: HashMap<NpcId, Npc>,
}

impl NpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an NPC, assigning it a fresh id.
    pub fn spawn(&mut self, npc: Npc) -> NpcId {
        let id = NpcId(self.next_id);
        self.next_id += 1;
        self.order.push(id);
        self.npcs.insert(id, npc);
        id
    }

    /// Removes an NPC. Survivor ids are untouched.
    pub fn remove(&mut self, id: NpcId) -> Option<Npc> {
        let npc = self.npcs.remove(&id)?;
        if let Some(pos) = self.order.iter().position(|&o| o == id) {
            self.order.remove(pos);
        }
        Some(npc)
    }

    pub fn get(&self, id: NpcId) -> Option<&Npc> {
        self.npcs.get(&id)
    }

    pub fn get_mut(&mut self, id: NpcId) -> Option<&mut Npc> {
        self.npcs.get_mut(&id)
    }

    /// All live ids, in insertion order.
    pub fn ids(&self) -> &[NpcId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates `(id, npc)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NpcId, &Npc)> {
        self.order.iter().filter_map(|id| Some((*id, self.npcs.get(id)?)))
    }

    /// Advances every NPC's behavior by `delta` seconds, in insertion
    /// order. Stable ordering keeps update side effects reproducible.
    pub fn update_all(&mut self, delta: f64) {
        for id in &self.order {
            if let Some(npc) = self.npcs.get_mut(id) {
                npc.update(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_remove_keeps_survivor_ids() {
        let mut registry = NpcRegistry::new();
        let a = registry.spawn(Npc::slime(Vec2::ZERO));
        let b = registry.spawn(Npc::rabbit(Vec2::ZERO));
        let c = registry.spawn(Npc::blue_blob(Vec2::ZERO));

        registry.remove(b);
        assert!(registry.get(a).is_some());
        assert!(registry.get(b).is_none());
        assert!(registry.get(c).is_some());
        assert_eq!(registry.ids(), &[a, c]);

        // New spawns never reuse a removed id.
        let d = registry.spawn(Npc::slime(Vec2::ZERO));
        assert_ne!(d, b);
    }

    #[test]
    fn increment_roundtrips_per_kind() {
        for npc in [
            Npc::slime(Vec2::new(1.0, 2.0)),
            Npc::rabbit(Vec2::new(-3.0, 0.5)),
            Npc::blue_blob(Vec2::new(7.0, 7.0)),
        ] {
            let mut w = FrameWriter::new(256);
            npc.encode_increment(&mut w).unwrap();
            let bytes = w.finish();
            let mut r = FrameReader::new(&bytes);
            let inc = NpcIncrement::decode(&mut r).unwrap();
            assert_eq!(inc.movement.position, npc.moveable.position);
            assert_eq!(inc.hp, npc.soul.hp());
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn unknown_brain_tag_is_rejected() {
        let mut w = FrameWriter::new(256);
        w.put_u8(9).unwrap();
        MoveableIncrement::default().encode(&mut w).unwrap();
        w.put_f32(1.0).unwrap();
        let bytes = w.finish();
        let mut r = FrameReader::new(&bytes);
        assert_eq!(
            NpcIncrement::decode(&mut r),
            Err(WireError::UnexpectedTag(9))
        );
    }

    #[test]
    fn update_all_advances_every_npc() {
        let mut registry = NpcRegistry::new();
        let slime = registry.spawn(Npc::slime(Vec2::ZERO));
        let blob = registry.spawn(Npc::blue_blob(Vec2::ZERO));

        registry.update_all(0.5);
        assert_ne!(registry.get(slime).unwrap().moveable.position.x, 0.0);
        assert_ne!(registry.get(blob).unwrap().moveable.position.x, 0.0);
    }

    #[test]
    fn update_moves_slime_horizontally() {
        let mut npc = Npc::slime(Vec2::ZERO);
        npc.update(0.5);
        assert_ne!(npc.moveable.position.x, 0.0);
    }
}
