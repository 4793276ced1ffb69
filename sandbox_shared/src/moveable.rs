//! Movement component and its network increment.
//!
//! `Moveable` holds the full movement state of an entity. Only the
//! fast-changing subset travels over the network each tick, as a
//! `MoveableIncrement` (velocity, jump state, position, input); the tuning
//! fields and footprint stay server-side.
//!
//! Collision is an opaque predicate: movement proposes a position and the
//! [`CollisionMap`] answers whether it is blocked.

use bitflags::bitflags;

use crate::ecs::World;
use crate::math::Vec2;
use crate::wire::{FrameReader, FrameWriter, WireError};

/// Standard gravity, m/s^2.
pub const STANDARD_GRAVITY: f32 = 9.80665;

bitflags! {
    /// Directional input held this tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerInput: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const JUMP = 1 << 2;
    }
}

/// The fast-changing projection of a [`Moveable`], sized for the wire.
///
/// Layout (little-endian): `vel.x:f32 | vel.y:f32 | jumping:u8 |
/// pos.x:f32 | pos.y:f32 | input:u8`, 18 bytes total.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveableIncrement {
    pub velocity: Vec2,
    pub jumping: bool,
    pub position: Vec2,
    pub input: PlayerInput,
}

impl MoveableIncrement {
    pub fn encode(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.put_f32(self.velocity.x)?;
        w.put_f32(self.velocity.y)?;
        w.put_u8(u8::from(self.jumping))?;
        w.put_f32(self.position.x)?;
        w.put_f32(self.position.y)?;
        w.put_u8(self.input.bits())
    }

    pub fn decode(r: &mut FrameReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            velocity: Vec2::new(r.get_f32()?, r.get_f32()?),
            jumping: r.get_u8()? != 0,
            position: Vec2::new(r.get_f32()?, r.get_f32()?),
            input: PlayerInput::from_bits_truncate(r.get_u8()?),
        })
    }
}

/// Full movement state. Position origin is at the feet, in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Moveable {
    pub velocity: Vec2,
    /// Horizontal acceleration applied while input is held.
    pub velocity_input: f32,
    /// Horizontal speed cap.
    pub velocity_max: f32,
    /// Instant vertical speed applied on jump.
    pub velocity_jump: f32,
    pub jumping: bool,
    pub position: Vec2,
    pub input: PlayerInput,
    /// Physical footprint, in meters.
    pub width: f32,
    pub height: f32,
}

impl Moveable {
    /// Sensible defaults for a player-sized moveable.
    pub fn player_default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            velocity_input: 20.0,
            velocity_max: 6.0,
            velocity_jump: 5.0,
            jumping: false,
            position: Vec2::ZERO,
            input: PlayerInput::empty(),
            width: 0.8,
            height: 1.8,
        }
    }

    /// Projects the fast-changing subset for the wire.
    pub fn increment(&self) -> MoveableIncrement {
        MoveableIncrement {
            velocity: self.velocity,
            jumping: self.jumping,
            position: self.position,
            input: self.input,
        }
    }

    /// Applies an incremental update received from the authority.
    pub fn apply_increment(&mut self, inc: &MoveableIncrement) {
        self.velocity = inc.velocity;
        self.jumping = inc.jumping;
        self.position = inc.position;
        self.input = inc.input;
    }
}

/// Opaque collision predicate consumed by movement integration.
pub trait CollisionMap: Send + Sync {
    /// Whether a footprint of `width`x`height` at `pos` collides.
    fn blocked(&self, pos: Vec2, width: f32, height: f32) -> bool;
}

/// A map with no obstacles. Ground at y = 0.
#[derive(Debug, Default)]
pub struct OpenField;

impl CollisionMap for OpenField {
    fn blocked(&self, pos: Vec2, _width: f32, _height: f32) -> bool {
        pos.y < 0.0
    }
}

/// Integrates all moveables by `delta` seconds against the collision map.
pub fn update_moveables(world: &mut World, delta: f64, map: &dyn CollisionMap) {
    let dt = delta as f32;
    for (_, m) in world.iter_mut::<Moveable>() {
        // Horizontal: accelerate toward held input, clamped to the cap.
        let mut dir = 0.0f32;
        if m.input.contains(PlayerInput::LEFT) {
            dir -= 1.0;
        }
        if m.input.contains(PlayerInput::RIGHT) {
            dir += 1.0;
        }
        if dir != 0.0 {
            m.velocity.x =
                (m.velocity.x + dir * m.velocity_input * dt).clamp(-m.velocity_max, m.velocity_max);
        } else {
            m.velocity.x = 0.0;
        }

        // Vertical: jump if grounded, otherwise fall.
        if m.input.contains(PlayerInput::JUMP) && !m.jumping {
            m.velocity.y = m.velocity_jump;
            m.jumping = true;
        }
        m.velocity.y -= STANDARD_GRAVITY * dt;

        let proposed_x = Vec2::new(m.position.x + m.velocity.x * dt, m.position.y);
        if map.blocked(proposed_x, m.width, m.height) {
            m.velocity.x = 0.0;
        } else {
            m.position = proposed_x;
        }

        let proposed_y = Vec2::new(m.position.x, m.position.y + m.velocity.y * dt);
        if map.blocked(proposed_y, m.width, m.height) {
            m.velocity.y = 0.0;
            m.jumping = false;
        } else {
            m.position = proposed_y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_projects_fast_fields_only() {
        let mut m = Moveable::player_default();
        m.position = Vec2::new(3.0, 4.0);
        m.velocity = Vec2::new(1.0, -1.0);
        m.input = PlayerInput::RIGHT;
        let inc = m.increment();
        assert_eq!(inc.position, m.position);
        assert_eq!(inc.velocity, m.velocity);
        assert_eq!(inc.input, PlayerInput::RIGHT);
    }

    #[test]
    fn increment_wire_size_is_fixed() {
        let mut w = FrameWriter::new(64);
        MoveableIncrement::default().encode(&mut w).unwrap();
        assert_eq!(w.len(), 18);
    }

    #[test]
    fn gravity_pulls_falling_entities_down() {
        let mut world = World::new();
        let e = world.spawn();
        let mut m = Moveable::player_default();
        m.position = Vec2::new(0.0, 10.0);
        m.jumping = true;
        world.insert(e, m);

        update_moveables(&mut world, 0.1, &OpenField);
        let m = world.get::<Moveable>(e).unwrap();
        assert!(m.velocity.y < 0.0);
        assert!(m.position.y < 10.0);
    }

    #[test]
    fn blocked_movement_zeroes_velocity() {
        struct Wall;
        impl CollisionMap for Wall {
            fn blocked(&self, _pos: Vec2, _w: f32, _h: f32) -> bool {
                true
            }
        }

        let mut world = World::new();
        let e = world.spawn();
        let mut m = Moveable::player_default();
        m.input = PlayerInput::RIGHT;
        m.position = Vec2::new(1.0, 1.0);
        world.insert(e, m);

        update_moveables(&mut world, 0.1, &Wall);
        let m = world.get::<Moveable>(e).unwrap();
        assert_eq!(m.velocity.x, 0.0);
        assert_eq!(m.position, Vec2::new(1.0, 1.0));
    }
}
