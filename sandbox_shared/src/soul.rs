//! Vitality state.
//!
//! A `Soul` is what separates a living entity from scenery: hit points, a
//! defense value subtracted from incoming damage, and a short timeout
//! granting invulnerability after a hit.

use crate::ecs::World;

/// Seconds of invulnerability after taking damage.
const DAMAGE_TIMEOUT_S: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Soul {
    hp: f32,
    defense: f32,
    damage_timeout: f32,
}

impl Default for Soul {
    fn default() -> Self {
        Self {
            hp: 100.0,
            defense: 1.0,
            damage_timeout: -1.0,
        }
    }
}

impl Soul {
    pub fn new(hp: f32) -> Self {
        Self {
            hp,
            ..Self::default()
        }
    }

    pub fn hp(&self) -> f32 {
        self.hp
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Applies damage unless the timeout is still running.
    ///
    /// Returns whether the damage landed.
    pub fn apply_damage(&mut self, damage: f32) -> bool {
        if self.damage_timeout > 0.0 {
            return false;
        }
        self.hp -= (damage - self.defense).max(0.0);
        self.damage_timeout = DAMAGE_TIMEOUT_S;
        true
    }

    pub fn tick_timeout(&mut self, delta: f32) {
        if self.damage_timeout > 0.0 {
            self.damage_timeout -= delta;
        }
    }
}

/// Ticks the damage timeout of every soul in the registry.
pub fn update_souls(world: &mut World, delta: f64) {
    for (_, soul) in world.iter_mut::<Soul>() {
        soul.tick_timeout(delta as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_respects_timeout() {
        let mut soul = Soul::default();
        assert!(soul.apply_damage(11.0));
        assert_eq!(soul.hp(), 90.0);
        // Second hit inside the timeout is ignored.
        assert!(!soul.apply_damage(11.0));
        assert_eq!(soul.hp(), 90.0);

        soul.tick_timeout(1.0);
        assert!(soul.apply_damage(11.0));
        assert_eq!(soul.hp(), 80.0);
    }

    #[test]
    fn defense_soaks_damage() {
        let mut soul = Soul::default();
        soul.apply_damage(0.5);
        assert_eq!(soul.hp(), 100.0);
    }
}
