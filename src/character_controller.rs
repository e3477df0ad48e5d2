//! Per-actor animation and action state controller.
//!
//! Every tick the controller decides which clips play on an actor and how
//! they blend, shows and hides weapons, sequences attacks and spell casts, and
//! lets death, knockdown and jumps interrupt everything else. Gameplay side
//! effects are reported as [`CharacterEvent`]s.

pub mod actor;
pub mod components;
pub mod config;
pub mod controller;
pub mod input;
pub mod movement;
pub mod persist;
pub mod physics;
pub mod queue;
pub mod services;
pub mod states;
pub mod text_keys;
pub mod weapon;

mod combat;
mod death;
mod hit;

use bevy::ecs::query::Has;
use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use actor::{ActorState, CreatureStats, SpellInfo};
use components::*;
use config::ControllerConfig;
use controller::{CharacterController, KillResult};
use input::{gamepad_input, keyboard_input};
use physics::{apply_character_movement, track_fall_height, update_grounded};
use services::{GuiService, HitResolver, ProjectileLauncher, Services, SoundMode, SoundService, SpellResolver};
use weapon::{AttackType, Item, StandardWeapons};

pub struct CharacterAnimationPlugin;

impl Plugin for CharacterAnimationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControllerConfig>()
            .init_resource::<StandardWeapons>()
            .init_resource::<ControllerRng>()
            .add_event::<CharacterEvent>()
            .add_systems(
                Update,
                (
                    keyboard_input,
                    gamepad_input,
                    update_grounded,
                    track_fall_height,
                    attach_controllers,
                    update_character_animation,
                    apply_character_movement,
                )
                    .chain(),
            );
    }
}

/// Random source for attack types, strengths and clip variants.
#[derive(Resource)]
pub struct ControllerRng(pub StdRng);

impl Default for ControllerRng {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

/// A gameplay side effect decided by an actor's controller.
#[derive(Event, Clone, Debug, PartialEq)]
pub enum CharacterEvent {
    Hit { actor: Entity, strength: f32, attack: AttackType },
    Block { actor: Entity },
    BreakInvisibility { actor: Entity },
    UseSecurityTool { actor: Entity, tool: String },
    Cast { actor: Entity, manual: bool },
    CastEffects { actor: Entity, spell: String, enchantment: bool },
    Sound { actor: Entity, sound: String, volume: f32, pitch: f32, mode: SoundMode },
    OpenLoot { actor: Entity },
    DeathCamera,
    LaunchProjectile { actor: Entity, strength: f32 },
    /// The death clip of the actor started.
    Died { actor: Entity },
}

/// Buffers the side effects of one controller call as [`CharacterEvent`]s.
#[derive(Default)]
pub struct EventSink<'a> {
    pub events: Vec<CharacterEvent>,
    sound_gens: Option<&'a SoundGens>,
}

impl<'a> EventSink<'a> {
    pub fn new(sound_gens: Option<&'a SoundGens>) -> Self {
        Self {
            events: Vec::new(),
            sound_gens,
        }
    }
}

impl HitResolver for EventSink<'_> {
    fn hit(&mut self, actor: Entity, strength: f32, attack: AttackType) {
        self.events.push(CharacterEvent::Hit { actor, strength, attack });
    }

    fn block(&mut self, actor: Entity) {
        self.events.push(CharacterEvent::Block { actor });
    }

    fn break_invisibility(&mut self, actor: Entity) {
        self.events.push(CharacterEvent::BreakInvisibility { actor });
    }

    fn use_security_tool(&mut self, actor: Entity, tool: &Item) {
        self.events.push(CharacterEvent::UseSecurityTool {
            actor,
            tool: tool.id.clone(),
        });
    }
}

impl SpellResolver for EventSink<'_> {
    fn start_cast(&mut self, _actor: Entity, spell: &SpellInfo, stats: &CreatureStats) -> bool {
        stats.magicka.current >= spell.cost
    }

    fn cast(&mut self, actor: Entity, manual: bool) {
        self.events.push(CharacterEvent::Cast { actor, manual });
    }

    fn play_cast_effects(&mut self, actor: Entity, spell_id: &str, is_enchantment: bool) {
        self.events.push(CharacterEvent::CastEffects {
            actor,
            spell: spell_id.to_owned(),
            enchantment: is_enchantment,
        });
    }
}

impl SoundService for EventSink<'_> {
    fn play_3d(&mut self, actor: Entity, sound: &str, volume: f32, pitch: f32, mode: SoundMode) {
        self.events.push(CharacterEvent::Sound {
            actor,
            sound: sound.to_owned(),
            volume,
            pitch,
            mode,
        });
    }

    fn sound_for_gen(&self, _actor: Entity, sound_gen: &str) -> Option<String> {
        self.sound_gens?.get(sound_gen).map(str::to_owned)
    }
}

impl GuiService for EventSink<'_> {
    fn open_loot(&mut self, actor: Entity) {
        self.events.push(CharacterEvent::OpenLoot { actor });
    }

    fn use_death_camera(&mut self) {
        self.events.push(CharacterEvent::DeathCamera);
    }
}

impl ProjectileLauncher for EventSink<'_> {
    fn launch(&mut self, actor: Entity, strength: f32) {
        self.events.push(CharacterEvent::LaunchProjectile { actor, strength });
    }
}

/// Creates the controller of every newly animated actor, restoring its saved
/// animation state if it has one.
fn attach_controllers(
    mut commands: Commands,
    config: Res<ControllerConfig>,
    weapons: Res<StandardWeapons>,
    mut rng: ResMut<ControllerRng>,
    mut events: EventWriter<CharacterEvent>,
    mut actors: Query<
        (
            Entity,
            &mut AnimationDriver,
            &mut ActorState,
            Option<&SavedAnimation>,
            Option<&SoundGens>,
            Has<Player>,
        ),
        Without<CharacterAnimation>,
    >,
) {
    for (entity, mut driver, mut state, saved, sound_gens, is_player) in &mut actors {
        let state = &mut *state;
        state.is_player = is_player;

        let mut sink = EventSink::new(sound_gens);
        let mut services = Services {
            animation: driver.0.as_mut(),
            weapons: &*weapons,
            gameplay: &mut sink,
            rng: &mut rng.0,
            config: &config,
        };
        let controller = CharacterController::new(entity, &mut services, state, saved.map(|saved| &saved.0));
        debug!("attached character controller to {entity:?}");

        events.write_batch(sink.events);
        commands
            .entity(entity)
            .insert(CharacterAnimation::new(controller))
            .remove::<SavedAnimation>();
    }
}

fn update_character_animation(
    time: Res<Time>,
    config: Res<ControllerConfig>,
    weapons: Res<StandardWeapons>,
    mut rng: ResMut<ControllerRng>,
    mut events: EventWriter<CharacterEvent>,
    mut actors: Query<(
        Entity,
        &mut CharacterAnimation,
        &mut AnimationDriver,
        &mut ActorState,
        Option<&SoundGens>,
    )>,
) {
    let duration = time.delta_secs();
    for (entity, mut animation, mut driver, mut state, sound_gens) in &mut actors {
        let animation = &mut *animation;
        let state = &mut *state;

        let mut sink = EventSink::new(sound_gens);
        let mut services = Services {
            animation: driver.0.as_mut(),
            weapons: &*weapons,
            gameplay: &mut sink,
            rng: &mut rng.0,
            config: &config,
        };

        let mut died = false;
        if state.stats.dead {
            died = animation.controller.kill(&mut services, state) == KillResult::DeathAnimStarted;
        }
        animation.movement = animation.controller.update(&mut services, state, duration, false);

        if died {
            sink.events.push(CharacterEvent::Died { actor: entity });
        }
        events.write_batch(sink.events);
    }
}
