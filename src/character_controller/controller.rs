use std::f32::consts::PI;

use bevy::log::{debug, warn};
use bevy::math::{Vec2, Vec3};
use bevy::prelude::Entity;
use rand::{Rng, RngCore};

use super::actor::{ActorKind, ActorState, DrawState};
use super::movement::{MovementContext, classify_movement};
use super::persist::AnimationRecord;
use super::queue::AnimationQueue;
use super::services::{AnimationSource, Services, SoundMode};
use super::states::{
    CharacterStates, DeathState, HitState, IdleState, JumpState, MovementState, Resets, Transition,
    UpperBodyState,
};
use super::weapon::{AttackType, Item, SpellRange, WeaponClass, WeaponType};

/// Names of the clips each sub-machine currently has playing. Empty when none.
#[derive(Clone, Debug, Default)]
pub(super) struct ActiveClips {
    pub(super) idle: String,
    pub(super) movement: String,
    pub(super) jump: String,
    pub(super) hit: String,
    pub(super) weapon: String,
    pub(super) death: String,
}

/// How the actor should move after this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementOutput {
    /// Intended velocity in actor space: x right, y forward, z up.
    pub velocity: Vec3,
    /// Root motion produced by the clips this tick, per second, actor space.
    pub animation_velocity: Vec3,
    /// The movement clip drives the actor; use `animation_velocity`.
    pub animation_controlled: bool,
    /// Rotation to apply this tick.
    pub rotation: Vec3,
}

/// Progress of a death reported by [`CharacterController::kill`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KillResult {
    DeathAnimStarted,
    DeathAnimPlaying,
    DeathAnimJustFinished,
    DeathAnimFinished,
}

/// Per-actor animation and action state controller.
pub struct CharacterController {
    pub(super) actor: Entity,
    pub(super) states: CharacterStates,
    pub(super) clips: ActiveClips,
    pub(super) weapon_type: WeaponType,
    /// Right-hand item the weapon type was classified from.
    pub(super) weapon_item: Option<Item>,
    pub(super) attack_type: AttackType,
    pub(super) cast_range: SpellRange,
    pub(super) attack_strength: f32,
    /// A hit key may still fire for the current attack.
    pub(super) strike_pending: bool,
    pub(super) casting_manual: bool,
    pub(super) can_cast: bool,
    pub(super) time_until_wake: f32,
    pub(super) movement_anim_speed: f32,
    pub(super) adjust_movement_anim_speed: bool,
    pub(super) animation_controlled: bool,
    pub(super) skip_anim: bool,
    pub(super) queue: AnimationQueue,
}

impl CharacterController {
    /// Sets up the controller for an actor that is being spawned or loaded.
    ///
    /// `record` restores scripted animations and the death clip saved by
    /// [`CharacterController::persist`].
    pub fn new(
        actor: Entity,
        services: &mut Services<'_>,
        state: &mut ActorState,
        record: Option<&AnimationRecord>,
    ) -> Self {
        let mut controller = Self {
            actor,
            states: CharacterStates::default(),
            clips: ActiveClips::default(),
            weapon_type: WeaponType::default(),
            weapon_item: None,
            attack_type: AttackType::default(),
            cast_range: SpellRange::default(),
            attack_strength: 0.0,
            strike_pending: false,
            casting_manual: false,
            can_cast: false,
            time_until_wake: 0.0,
            movement_anim_speed: 0.0,
            adjust_movement_anim_speed: false,
            animation_controlled: true,
            skip_anim: false,
            queue: AnimationQueue::default(),
        };

        if let Some(record) = record {
            if record.death_animation.is_some() {
                state.stats.death_animation = record.death_animation;
            }
        }

        if state.kind.is_actor() {
            services.animation.set_accumulation(Vec3::new(1.0, 1.0, 0.0));
            controller.init_actor(services, state);
        } else {
            services.animation.set_accumulation(Vec3::ZERO);
            controller.states.apply(Transition::Idle(IdleState::Idle));
            controller.refresh_current_anims(
                services,
                state,
                IdleState::Idle,
                MovementState::None,
                JumpState::None,
                true,
            );
        }

        let step = services.animation.run(0.0);
        for key in &step.keys {
            controller.handle_text_key(services, key);
        }

        if let Some(record) = record {
            controller.unpersist(services.animation, record);
        }
        controller
    }

    fn init_actor(&mut self, services: &mut Services<'_>, state: &mut ActorState) {
        if state.has_inventory {
            let (weapon_type, item) = active_weapon(services, state);
            if weapon_type.class != WeaponClass::None {
                self.states.apply(Transition::UpperBody(UpperBodyState::WeaponEquipped));
                self.clips.weapon = weapon_type.long_group.clone();
            }
            if !matches!(
                weapon_type.class,
                WeaponClass::None | WeaponClass::Spell | WeaponClass::HandToHand
            ) {
                services.animation.show_weapons(true);
                services
                    .animation
                    .set_weapon_group(&weapon_type.long_group, weapon_type.class == WeaponClass::Ranged);
            }
            services.animation.show_carried_left(weapon_type.carried_left_visible());
            self.weapon_type = weapon_type;
            self.weapon_item = item;
        }

        if !state.stats.dead {
            self.states.apply(Transition::Idle(IdleState::Idle));
            if state.stats.fall_height > 0.0 {
                self.states.apply(Transition::Jump(JumpState::InAir));
            }
            let (idle, movement, jump) = (self.states.idle(), self.states.movement(), self.states.jump());
            self.refresh_current_anims(services, state, idle, movement, jump, true);
        } else if state.stats.death_animation_finished {
            // The clip itself is started on the first update, at its end.
            let death = match state.stats.death_animation.and_then(DeathState::from_index) {
                Some(death) => death,
                None => {
                    warn!(
                        "actor {:?} has invalid death animation index {:?}, picking a new one",
                        self.actor, state.stats.death_animation
                    );
                    let death = self.choose_death_state(services, state);
                    state.stats.death_animation = death.index();
                    death
                }
            };
            self.states.apply(Transition::Death(death));
        } else {
            self.play_random_death(services, state, 1.0);
        }
    }

    /// Advances the controller by `duration` seconds.
    ///
    /// With `animation_only` the actor's intent is not evaluated; clips are
    /// advanced and their text keys dispatched.
    pub fn update(
        &mut self,
        services: &mut Services<'_>,
        state: &mut ActorState,
        duration: f32,
        animation_only: bool,
    ) -> MovementOutput {
        if self.states.hit().is_knocked_out() {
            self.time_until_wake -= duration;
        }

        let mut output = MovementOutput::default();
        if !state.kind.is_actor() {
            if !self.skip_anim {
                self.update_anim_queue(services.animation);
            }
        } else if !state.stats.dead {
            if !animation_only {
                output = self.update_alive(services, state, duration);
            }
        } else if !self.skip_anim
            && self.states.is_dead()
            && self.clips.death.is_empty()
            && !self.is_persistent_anim_playing(services.animation)
        {
            let start_point = if state.stats.death_animation_finished { 1.0 } else { 0.0 };
            self.play_death(services.animation, start_point);
        }

        let persistent = self.is_persistent_anim_playing(services.animation);
        let step = services
            .animation
            .run(if self.skip_anim && !persistent { 0.0 } else { duration });
        for key in &step.keys {
            self.handle_text_key(services, key);
        }

        let mut moved = if duration > 0.0 { step.moved / duration } else { Vec3::ZERO };
        // Root motion must not push against the direction the actor wants to go.
        let wanted = output.velocity;
        if wanted.x != 0.0 && wanted.x.signum() != moved.x.signum() {
            moved.x = wanted.x;
        }
        if wanted.y != 0.0 && wanted.y.signum() != moved.y.signum() {
            moved.y = wanted.y;
        }
        output.animation_velocity = moved;
        output.animation_controlled =
            self.animation_controlled && state.kind.is_actor() && !self.skip_anim && !state.stats.dead;

        self.skip_anim = false;
        output
    }

    fn update_alive(&mut self, services: &mut Services<'_>, state: &mut ActorState, duration: f32) -> MovementOutput {
        let config = services.config;
        let surroundings = state.surroundings;
        let in_water = surroundings.swimming;
        let flying = surroundings.flying;
        let solid = surroundings.collision;
        let incapacitated = state.stats.paralyzed || state.stats.knocked_down;
        let sneak = state.intent.sneaking && !flying;
        let god_mode = state.is_god();

        let rotation = state.intent.rotation;
        let mut velocity = state.intent.movement.clamp_length_max(1.0);
        if self.states.hit() != HitState::None && self.states.jump() == JumpState::None {
            velocity = Vec3::ZERO;
        }

        let moved_in_xy = velocity.x.abs() + velocity.y.abs() > 0.0;
        let running = state.intent.running && !flying && moved_in_xy;

        let jump_strength = state.jump_strength;
        if sneak || in_water || flying || incapacitated || !solid || jump_strength <= 0.0 {
            velocity.z = 0.0;
        }

        let mut movement = MovementState::None;
        let mut idle = IdleState::Special;
        let mut jump = JumpState::None;
        let mut force = false;
        let mut in_jump = true;
        let mut landing_sound = false;

        if !surroundings.on_ground && !flying && !in_water && solid {
            // In the air; lateral control depends on acrobatics.
            force = self.states.jump() != JumpState::InAir;
            jump = JumpState::InAir;
            let factor = (config.jump_move_base + config.jump_move_mult * state.stats.acrobatics / 100.0).min(1.0);
            velocity.x *= factor * state.speed;
            velocity.y *= factor * state.speed;
            velocity.z = 0.0;
        } else if velocity.z > 0.0 && self.states.jump() != JumpState::InAir {
            let lateral = Vec2::new(velocity.x, velocity.y);
            velocity = if lateral == Vec2::ZERO {
                Vec3::new(0.0, 0.0, jump_strength)
            } else {
                let lateral = lateral.normalize() * 0.707;
                Vec3::new(lateral.x, lateral.y, 0.707) * jump_strength
            };

            if !god_mode {
                let cost = config.fatigue_jump_base + state.encumbrance.min(1.0) * config.fatigue_jump_mult;
                state.stats.fatigue.current -= cost;
            }
            debug!("actor {:?} jumps", self.actor);
        } else if self.states.jump() == JumpState::InAir && !in_water && !flying && solid {
            force = true;
            jump = JumpState::Landing;
            velocity.z = 0.0;
            if !self.skip_anim {
                services.animation.disable(&self.clips.idle);
            }
            self.land(services, state);
            landing_sound = true;
        } else {
            if state.kind == ActorKind::Npc
                && self.states.jump() == JumpState::InAir
                && !flying
                && solid
            {
                landing_sound = true;
            }

            jump = if services.animation.is_playing(&self.clips.jump) {
                JumpState::Landing
            } else {
                JumpState::None
            };
            velocity.x *= state.speed;
            velocity.y *= state.speed;
            velocity.z = 0.0;
            in_jump = false;

            let threshold = if state.is_player {
                config.player_turn_threshold
            } else {
                config.npc_turn_threshold
            };
            movement = classify_movement(
                velocity,
                rotation,
                MovementContext {
                    swimming: in_water,
                    sneaking: sneak,
                    running,
                    can_turn: state.bipedal && jump == JumpState::None,
                    turn_threshold: threshold * 60.0 * duration,
                },
            );
        }

        if landing_sound {
            let sound = if surroundings.swimming || surroundings.underwater {
                Some(&config.land_water_sound)
            } else if surroundings.on_ground {
                Some(&config.land_sound)
            } else {
                None
            };
            if let Some(sound) = sound {
                services
                    .gameplay
                    .play_3d(self.actor, sound, 1.0, 1.0, SoundMode::NoPlayerLocal);
            }
        }

        // Players turn in short bursts; keep a started turn clip going for a while.
        if state.is_player && movement == MovementState::None && jump == JumpState::None && self.states.movement().is_turning() {
            let hold = if self.clips.movement.contains("swim") {
                config.player_swim_turn_hold
            } else {
                config.player_turn_hold
            };
            if let Some(info) = services.animation.info(&self.clips.movement) {
                if info.complete < hold {
                    movement = self.states.movement();
                }
            }
        }

        if self.queue.is_empty() || in_water || sneak {
            idle = if movement != MovementState::None && !movement.is_turning() {
                IdleState::None
            } else if in_water {
                IdleState::IdleSwim
            } else if sneak && !in_jump {
                IdleState::IdleSneak
            } else {
                IdleState::Idle
            };
        } else if !self.skip_anim {
            self.update_anim_queue(services.animation);
        }

        if !self.skip_anim {
            let forced = if state.bipedal || state.has_inventory {
                self.update_weapon_state(services, state, &mut idle)
            } else {
                self.update_creature_state(services, state)
            };
            self.refresh_current_anims(services, state, idle, movement, jump, force || forced);
        }

        if in_jump {
            self.animation_controlled = false;
        }

        if !self.skip_anim {
            if self.states.movement().is_turning() {
                if duration > 0.0 {
                    let turn_speed = (rotation.z.abs() / duration / PI).clamp(1.0, config.max_turn_speed_mult);
                    services.animation.adjust_speed_mult(&self.clips.movement, turn_speed);
                }
            } else if self.states.movement() != MovementState::None && self.adjust_movement_anim_speed {
                let speed_mult = state.speed / self.movement_anim_speed;
                services.animation.adjust_speed_mult(&self.clips.movement, speed_mult);
            }
        }

        // A knocked down actor cannot turn.
        let rotation = if state.stats.knocked_down {
            Vec3::new(rotation.x, rotation.y, 0.0)
        } else {
            rotation
        };

        MovementOutput {
            velocity,
            rotation,
            ..MovementOutput::default()
        }
    }

    /// Re-blends every procedural layer. Skipped while a persistent scripted
    /// animation plays.
    pub(super) fn refresh_current_anims(
        &mut self,
        services: &mut Services<'_>,
        state: &mut ActorState,
        mut idle: IdleState,
        movement: MovementState,
        jump: JumpState,
        force: bool,
    ) {
        if self.is_persistent_anim_playing(services.animation) {
            return;
        }

        if state.kind.is_actor() {
            self.refresh_hit_recoil_anims(services, state, &mut idle);
        }

        let weapon_suffix = if state.has_inventory {
            self.weapon_type.short_group.clone()
        } else {
            String::new()
        };

        self.refresh_jump_anims(services.animation, &weapon_suffix, jump, &mut idle, force);
        self.refresh_movement_anims(services.animation, state, &weapon_suffix, movement, &mut idle, force);
        self.refresh_idle_anims(services, state, &weapon_suffix, idle, force);
    }

    /// Applies a transition and stops the clips of every machine it reset.
    pub(super) fn transition(&mut self, animation: &mut dyn AnimationSource, transition: Transition) -> Resets {
        let resets = self.states.apply(transition);
        if resets.idle {
            clear_clip(animation, &mut self.clips.idle);
        }
        if resets.movement {
            clear_clip(animation, &mut self.clips.movement);
        }
        if resets.jump {
            clear_clip(animation, &mut self.clips.jump);
        }
        if resets.hit {
            clear_clip(animation, &mut self.clips.hit);
        }
        if resets.upper_body {
            // The weapon group stays selected, only its clip stops.
            animation.disable(&self.clips.weapon);
        }
        if resets.any() {
            debug!("actor {:?}: {:?} reset {:?}", self.actor, transition, resets);
        }
        resets
    }

    /// Rebuilds every procedural layer, e.g. after the actor's model changed.
    pub fn force_state_update(&mut self, services: &mut Services<'_>, state: &mut ActorState) {
        self.clear_anim_queue(services.animation);

        self.casting_manual = false;
        self.can_cast = false;
        if self.states.upper_body().is_attacking() {
            self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
            state.intent.attacking = false;
        }

        let (idle, movement, jump) = (self.states.idle(), self.states.movement(), self.states.jump());
        self.refresh_current_anims(services, state, idle, movement, jump, true);
        if self.states.is_dead() {
            self.play_death(services.animation, 0.0);
        }

        let step = services.animation.run(0.0);
        for key in &step.keys {
            self.handle_text_key(services, key);
        }
    }

    /// Suppresses clip playback for the next update, e.g. right after a teleport.
    pub fn skip_anim(&mut self) {
        self.skip_anim = true;
    }

    pub fn actor(&self) -> Entity {
        self.actor
    }

    pub fn states(&self) -> &CharacterStates {
        &self.states
    }

    pub fn weapon_type(&self) -> &WeaponType {
        &self.weapon_type
    }

    pub fn current_idle(&self) -> &str {
        &self.clips.idle
    }

    pub fn current_movement(&self) -> &str {
        &self.clips.movement
    }

    pub fn current_jump(&self) -> &str {
        &self.clips.jump
    }

    pub fn current_hit(&self) -> &str {
        &self.clips.hit
    }

    pub fn current_weapon(&self) -> &str {
        &self.clips.weapon
    }

    pub fn current_death(&self) -> &str {
        &self.clips.death
    }

    pub fn is_attack_preparing(&self) -> bool {
        matches!(
            self.states.upper_body(),
            UpperBodyState::StartToMinAttack | UpperBodyState::MinAttackToMaxAttack
        )
    }

    pub fn is_casting_spell(&self) -> bool {
        self.casting_manual || self.states.upper_body() == UpperBodyState::CastingSpell
    }

    pub fn is_knocked_down(&self) -> bool {
        self.states.hit().is_knocked_down()
    }

    pub fn is_knocked_out(&self) -> bool {
        self.states.hit().is_knocked_out()
    }

    pub fn is_recovery(&self) -> bool {
        self.states.hit().is_recovery()
    }

    pub fn is_turning(&self) -> bool {
        self.states.movement().is_turning()
    }

    pub fn is_sneaking(&self) -> bool {
        self.states.idle() == IdleState::IdleSneak || self.states.movement().is_sneaking()
    }

    pub fn is_running(&self) -> bool {
        self.states.movement().is_running()
    }

    /// The off hand is free to hold a shield up.
    pub fn is_ready_to_block(&self) -> bool {
        self.weapon_type.carried_left_visible()
    }

    pub fn ready_to_prepare_attack(&self) -> bool {
        matches!(self.states.hit(), HitState::None | HitState::Block)
            && self.states.upper_body() <= UpperBodyState::WeaponEquipped
    }

    pub fn ready_to_start_attack(&self) -> bool {
        matches!(self.states.hit(), HitState::None | HitState::Block)
            && self.states.upper_body() == UpperBodyState::WeaponEquipped
    }

    /// Strength sampled for the current or last attack, in [0, 1].
    pub fn attack_strength(&self) -> f32 {
        self.attack_strength
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack_type
    }
}

/// Weapon type implied by the draw state and the right hand.
pub(super) fn active_weapon(services: &Services<'_>, state: &ActorState) -> (WeaponType, Option<Item>) {
    let right_hand = state.equipment.right_hand.clone();
    match state.stats.draw_state {
        DrawState::Nothing => (WeaponType::of_class(WeaponClass::None), right_hand),
        DrawState::Spell => (WeaponType::of_class(WeaponClass::Spell), right_hand),
        DrawState::Weapon => match &right_hand {
            Some(item) => (services.weapons.classify(item), right_hand),
            None => (WeaponType::of_class(WeaponClass::HandToHand), None),
        },
    }
}

/// Picks one of `prefix1 ..= prefixN`, where N counts the consecutive groups
/// present (at most `limit`). Returns the group and its number.
pub(super) fn choose_random_group(
    animation: &dyn AnimationSource,
    rng: &mut dyn RngCore,
    prefix: &str,
    limit: u8,
) -> (String, u8) {
    let mut count = 0;
    while count < limit && animation.has_animation(&format!("{prefix}{}", count + 1)) {
        count += 1;
    }
    let index = if count == 0 { 1 } else { rng.gen_range(1..=count) };
    (format!("{prefix}{index}"), index)
}

/// `attack1..3` and `swimattack1..3` played by creatures without weapon clips.
pub(super) fn is_random_attack_group(group: &str) -> bool {
    let Some(number) = group.strip_prefix("swimattack").or_else(|| group.strip_prefix("attack")) else {
        return false;
    };
    matches!(number, "1" | "2" | "3")
}

fn clear_clip(animation: &mut dyn AnimationSource, clip: &mut String) {
    if !clip.is_empty() {
        animation.disable(clip);
        clip.clear();
    }
}
