//! Collaborators the controller drives but does not own.
//!
//! The animation clip source, weapon classification and the gameplay side
//! (damage, spells, sound, GUI, projectiles) all live outside this crate. The
//! controller only borrows them for the duration of a call through [`Services`].

use bevy::math::Vec3;
use bevy::prelude::Entity;
use bitflags::bitflags;
use rand::RngCore;

use super::actor::{CreatureStats, SpellInfo};
use super::config::ControllerConfig;
use super::weapon::{AttackType, Item, WeaponType};

/// Loop count meaning "until disabled".
pub const LOOP_FOREVER: u32 = u32::MAX;

bitflags! {
    /// Skeletal regions a clip is allowed to drive.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BlendMask: u8 {
        const LOWER_BODY = 1 << 0;
        const TORSO = 1 << 1;
        const LEFT_ARM = 1 << 2;
        const RIGHT_ARM = 1 << 3;
        const UPPER_BODY = Self::TORSO.bits() | Self::LEFT_ARM.bits() | Self::RIGHT_ARM.bits();
        const ALL = Self::LOWER_BODY.bits() | Self::UPPER_BODY.bits();
    }
}

/// Blend priority, lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Default,
    WeaponLowerBody,
    SneakIdleLowerBody,
    SwimIdle,
    Jump,
    Movement,
    Hit,
    Weapon,
    Block,
    Knockdown,
    Torch,
    Death,
    Persistent,
}

/// Bone groups a priority can be set for independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoneGroup {
    LowerBody = 0,
    Torso = 1,
    LeftArm = 2,
    RightArm = 3,
}

/// Per-bone-group priority of a playing clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimPriority([Priority; 4]);

impl AnimPriority {
    pub const fn uniform(priority: Priority) -> Self {
        Self([priority; 4])
    }

    pub const fn with(mut self, group: BoneGroup, priority: Priority) -> Self {
        self.0[group as usize] = priority;
        self
    }

    pub const fn get(&self, group: BoneGroup) -> Priority {
        self.0[group as usize]
    }
}

impl From<Priority> for AnimPriority {
    fn from(priority: Priority) -> Self {
        Self::uniform(priority)
    }
}

/// Everything the clip source needs to start a group.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayRequest {
    pub group: String,
    pub priority: AnimPriority,
    pub blend_mask: BlendMask,
    /// Remove the clip once it reaches its stop key.
    pub auto_disable: bool,
    pub speed_mult: f32,
    pub start_key: String,
    pub stop_key: String,
    /// Completion fraction of the start→stop segment to begin at.
    pub start_point: f32,
    pub loops: u32,
    /// Loop the whole segment when the group has no "loop start"/"loop stop" keys.
    pub loop_fallback: bool,
}

impl PlayRequest {
    pub fn new(group: impl Into<String>, priority: impl Into<AnimPriority>) -> Self {
        Self {
            group: group.into(),
            priority: priority.into(),
            blend_mask: BlendMask::ALL,
            auto_disable: false,
            speed_mult: 1.0,
            start_key: "start".to_owned(),
            stop_key: "stop".to_owned(),
            start_point: 0.0,
            loops: 0,
            loop_fallback: false,
        }
    }

    pub fn with_mask(mut self, mask: BlendMask) -> Self {
        self.blend_mask = mask;
        self
    }

    pub fn with_keys(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.start_key = start.into();
        self.stop_key = stop.into();
        self
    }

    pub fn with_speed(mut self, speed_mult: f32) -> Self {
        self.speed_mult = speed_mult;
        self
    }

    pub fn starting_at(mut self, start_point: f32) -> Self {
        self.start_point = start_point;
        self
    }

    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    pub fn auto_disable(mut self, auto_disable: bool) -> Self {
        self.auto_disable = auto_disable;
        self
    }

    pub fn with_loop_fallback(mut self, loop_fallback: bool) -> Self {
        self.loop_fallback = loop_fallback;
        self
    }
}

/// Progress of an active group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimInfo {
    /// Completion of the current start→stop segment in [0, 1].
    pub complete: f32,
    pub speed_mult: f32,
    pub loops_remaining: u32,
}

/// A timestamped event authored into a clip, e.g. `"weapononehand: chop hit"`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextKey {
    pub time: f32,
    pub text: String,
}

impl TextKey {
    pub fn new(time: f32, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }
}

/// A text key crossed while advancing `group`. `index` points into
/// [`AnimationSource::text_keys`] for that group.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredTextKey {
    pub group: String,
    pub index: usize,
    pub text: String,
}

/// Result of advancing the clip source by one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationStep {
    /// Root motion accumulated this tick.
    pub moved: Vec3,
    /// Text keys crossed this tick, in playback order.
    pub keys: Vec<FiredTextKey>,
}

/// The animation playback engine of one actor.
pub trait AnimationSource {
    fn has_animation(&self, group: &str) -> bool;
    fn play(&mut self, request: PlayRequest);
    fn disable(&mut self, group: &str);
    /// True while the group is active and has not reached its final stop key.
    fn is_playing(&self, group: &str) -> bool;
    /// `None` when the group is not active.
    fn info(&self, group: &str) -> Option<AnimInfo>;
    fn current_time(&self, group: &str) -> Option<f32>;
    /// Root-motion velocity of the group's movement segment.
    fn velocity(&self, group: &str) -> f32;
    /// Time of a `"<group>: <key>"` text key.
    fn text_key_time(&self, key: &str) -> Option<f32>;
    /// All text keys of the group, sorted by time.
    fn text_keys(&self, group: &str) -> &[TextKey];
    fn adjust_speed_mult(&mut self, group: &str, speed_mult: f32);
    fn set_looping_enabled(&mut self, group: &str, enabled: bool);
    /// Restrict root-motion accumulation per axis (1 accumulates, 0 drops).
    fn set_accumulation(&mut self, axes: Vec3);
    fn run(&mut self, duration: f32) -> AnimationStep;

    fn show_weapons(&mut self, visible: bool);
    fn show_carried_left(&mut self, visible: bool);
    fn use_shield_animations(&self) -> bool;
    fn set_weapon_group(&mut self, group: &str, relative_duration: bool);
    fn attach_arrow(&mut self);
    fn detach_arrow(&mut self);
    fn set_pitch_factor(&mut self, factor: f32);
    fn set_accurate_aiming(&mut self, enabled: bool);
}

/// Maps a right-hand item to its weapon descriptor.
pub trait WeaponClassifier {
    fn classify(&self, item: &Item) -> WeaponType;
}

pub trait HitResolver {
    fn hit(&mut self, actor: Entity, strength: f32, attack: AttackType);
    fn block(&mut self, actor: Entity);
    fn break_invisibility(&mut self, actor: Entity);
    fn use_security_tool(&mut self, actor: Entity, tool: &Item);
}

pub trait SpellResolver {
    /// Checks (and reserves) the magicka or charge needed to cast `spell`.
    fn start_cast(&mut self, actor: Entity, spell: &SpellInfo, stats: &CreatureStats) -> bool;
    fn cast(&mut self, actor: Entity, manual: bool);
    fn play_cast_effects(&mut self, actor: Entity, spell_id: &str, is_enchantment: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundMode {
    Normal,
    /// Not played for the local player (footsteps, landing).
    NoPlayerLocal,
}

pub trait SoundService {
    fn play_3d(&mut self, actor: Entity, sound: &str, volume: f32, pitch: f32, mode: SoundMode);
    /// Resolves a species/material specific sound for a `soundgen` name.
    fn sound_for_gen(&self, actor: Entity, sound_gen: &str) -> Option<String>;
}

pub trait GuiService {
    fn open_loot(&mut self, actor: Entity);
    fn use_death_camera(&mut self);
}

pub trait ProjectileLauncher {
    fn launch(&mut self, actor: Entity, strength: f32);
}

/// Every fire-and-forget gameplay collaborator.
pub trait Gameplay: HitResolver + SpellResolver + SoundService + GuiService + ProjectileLauncher {}

impl<T> Gameplay for T where T: HitResolver + SpellResolver + SoundService + GuiService + ProjectileLauncher {}

/// Borrowed collaborators for one controller call.
pub struct Services<'a> {
    pub animation: &'a mut dyn AnimationSource,
    pub weapons: &'a dyn WeaponClassifier,
    pub gameplay: &'a mut dyn Gameplay,
    pub rng: &'a mut dyn RngCore,
    pub config: &'a ControllerConfig,
}
