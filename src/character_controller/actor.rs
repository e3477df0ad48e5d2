use bevy::math::Vec3;
use bevy::prelude::Component;

use super::config::ControllerConfig;
use super::weapon::{AmmoType, AttackType, Item, SpellRange};

/// What the actor has in its hands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawState {
    #[default]
    Nothing,
    Weapon,
    Spell,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActorKind {
    #[default]
    Npc,
    Creature {
        flies: bool,
    },
    /// Animated world object (doors, containers). No action states.
    Object,
}

impl ActorKind {
    pub fn is_actor(self) -> bool {
        !matches!(self, Self::Object)
    }

    pub fn is_creature(self) -> bool {
        matches!(self, Self::Creature { .. })
    }

    /// Creatures that walk on the ground. Their run clips are sped up
    /// using the walk clip's velocity.
    pub fn is_walking_creature(self) -> bool {
        matches!(self, Self::Creature { flies: false })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicStat {
    pub current: f32,
    pub base: f32,
}

impl DynamicStat {
    pub const fn new(value: f32) -> Self {
        Self {
            current: value,
            base: value,
        }
    }
}

impl Default for DynamicStat {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Mechanics state shared between the controller and damage resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct CreatureStats {
    pub health: DynamicStat,
    pub fatigue: DynamicStat,
    pub magicka: DynamicStat,
    pub acrobatics: f32,
    /// Magnitude of an active jump effect.
    pub jump_bonus: f32,
    pub draw_state: DrawState,
    /// Set by damage resolution or a hard landing, cleared when the clip ends.
    pub knocked_down: bool,
    pub hit_recovery: bool,
    pub block: bool,
    pub paralyzed: bool,
    pub dead: bool,
    /// Index of the death clip picked when the actor died.
    pub death_animation: Option<u8>,
    pub death_animation_finished: bool,
    /// Distance fallen since leaving the ground, in world units.
    pub fall_height: f32,
}

impl Default for CreatureStats {
    fn default() -> Self {
        Self {
            health: DynamicStat::default(),
            fatigue: DynamicStat::default(),
            magicka: DynamicStat::default(),
            acrobatics: 5.0,
            jump_bonus: 0.0,
            draw_state: DrawState::Nothing,
            knocked_down: false,
            hit_recovery: false,
            block: false,
            paralyzed: false,
            dead: false,
            death_animation: None,
            death_animation_finished: false,
            fall_height: 0.0,
        }
    }
}

impl CreatureStats {
    /// Fatigue scaling for skill rolls, `base - mult * (1 - current/max)`.
    pub fn fatigue_term(&self, config: &ControllerConfig) -> f32 {
        let normalised = if self.fatigue.base.floor() == 0.0 {
            1.0
        } else {
            (self.fatigue.current / self.fatigue.base).max(0.0)
        };
        config.fatigue_base - config.fatigue_mult * (1.0 - normalised)
    }

    /// Returns the height fallen and resets it.
    pub fn land(&mut self) -> f32 {
        std::mem::take(&mut self.fall_height)
    }
}

/// What the actor wants to do this tick, filled by input or AI.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorIntent {
    /// x right, y forward, z jump. Each component in [-1, 1].
    pub movement: Vec3,
    /// Rotation requested this tick, z is yaw.
    pub rotation: Vec3,
    pub running: bool,
    pub sneaking: bool,
    /// Attack or cast button held. Cleared by the controller when it cancels.
    pub attacking: bool,
    /// Attack type an AI chose. Players use the heuristics instead.
    pub attack_type: Option<AttackType>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surroundings {
    pub on_ground: bool,
    pub swimming: bool,
    pub flying: bool,
    pub underwater: bool,
    /// Collision with the world is active.
    pub collision: bool,
}

impl Default for Surroundings {
    fn default() -> Self {
        Self {
            on_ground: true,
            swimming: false,
            flying: false,
            underwater: false,
            collision: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpellInfo {
    pub id: String,
    /// Range of the first effect.
    pub range: SpellRange,
    pub cost: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Equipment {
    pub right_hand: Option<Item>,
    pub left_hand: Option<Item>,
    pub ammo: Option<AmmoType>,
    pub selected_spell: Option<SpellInfo>,
    /// Enchanted item readied for casting, used when no spell is selected.
    pub selected_enchantment: Option<SpellInfo>,
}

/// Everything the controller reads about an actor and the few flags it writes back.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct ActorState {
    pub kind: ActorKind,
    pub is_player: bool,
    /// Has a humanoid skeleton with separate upper and lower body.
    pub bipedal: bool,
    pub has_inventory: bool,
    /// Keeps its death pose when loaded.
    pub persistent: bool,
    pub god_mode: bool,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Vertical speed of a jump start.
    pub jump_strength: f32,
    /// Encumbrance over capacity.
    pub encumbrance: f32,
    pub stats: CreatureStats,
    pub intent: ActorIntent,
    pub surroundings: Surroundings,
    pub equipment: Equipment,
}

impl Default for ActorState {
    fn default() -> Self {
        Self {
            kind: ActorKind::Npc,
            is_player: false,
            bipedal: true,
            has_inventory: true,
            persistent: false,
            god_mode: false,
            speed: 100.0,
            jump_strength: 300.0,
            encumbrance: 0.0,
            stats: CreatureStats::default(),
            intent: ActorIntent::default(),
            surroundings: Surroundings::default(),
            equipment: Equipment::default(),
        }
    }
}

impl ActorState {
    pub fn npc() -> Self {
        Self::default()
    }

    pub fn player() -> Self {
        Self {
            is_player: true,
            ..Self::default()
        }
    }

    pub fn creature(flies: bool) -> Self {
        Self {
            kind: ActorKind::Creature { flies },
            bipedal: false,
            has_inventory: false,
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        Self {
            kind: ActorKind::Object,
            bipedal: false,
            has_inventory: false,
            ..Self::default()
        }
    }

    /// God mode only applies to the player.
    pub fn is_god(&self) -> bool {
        self.is_player && self.god_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatigue_term_scales_with_fatigue() {
        let config = ControllerConfig::default();
        let mut stats = CreatureStats::default();
        assert!((stats.fatigue_term(&config) - 1.25).abs() < 1e-6);

        stats.fatigue.current = 0.0;
        assert!((stats.fatigue_term(&config) - 0.75).abs() < 1e-6);

        stats.fatigue.current = -20.0;
        assert!((stats.fatigue_term(&config) - 0.75).abs() < 1e-6, "negative fatigue clamps to zero");

        stats.fatigue = DynamicStat::new(0.0);
        assert!((stats.fatigue_term(&config) - 1.25).abs() < 1e-6, "zero max fatigue counts as full");
    }

    #[test]
    fn land_takes_fall_height() {
        let mut stats = CreatureStats {
            fall_height: 512.0,
            ..CreatureStats::default()
        };
        assert_eq!(stats.land(), 512.0);
        assert_eq!(stats.fall_height, 0.0);
    }
}
