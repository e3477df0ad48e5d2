use bevy::log::debug;
use bevy::math::Vec3;
use rand::Rng;

use super::actor::ActorState;
use super::config::ControllerConfig;
use super::controller::CharacterController;
use super::services::{
    AnimPriority, AnimationSource, BlendMask, BoneGroup, LOOP_FOREVER, PlayRequest, Priority, Services,
};
use super::states::{HitState, IdleState, JumpState, MovementState, Transition, UpperBodyState};
use super::weapon::{WeaponClass, WeaponType};

/// Inputs to [`classify_movement`] besides the intent vectors.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovementContext {
    pub swimming: bool,
    pub sneaking: bool,
    pub running: bool,
    /// Turn clips are only used by bipedal actors on the ground.
    pub can_turn: bool,
    /// Yaw this tick above which a turn clip plays.
    pub turn_threshold: f32,
}

/// Picks the movement state for an intent. Strafing wins when the sideways
/// component is more than twice the forward one.
pub fn classify_movement(velocity: Vec3, rotation: Vec3, context: MovementContext) -> MovementState {
    use MovementState::*;

    let MovementContext {
        swimming,
        sneaking,
        running,
        ..
    } = context;
    let pick = |swim_run, swim_walk, sneak, run, walk| {
        if swimming {
            if running { swim_run } else { swim_walk }
        } else if sneaking {
            sneak
        } else if running {
            run
        } else {
            walk
        }
    };

    if (velocity.x / 2.0).abs() > velocity.y.abs() {
        if velocity.x > 0.0 {
            pick(SwimRunRight, SwimWalkRight, SneakRight, RunRight, WalkRight)
        } else {
            pick(SwimRunLeft, SwimWalkLeft, SneakLeft, RunLeft, WalkLeft)
        }
    } else if velocity.y != 0.0 {
        if velocity.y > 0.0 {
            pick(SwimRunForward, SwimWalkForward, SneakForward, RunForward, WalkForward)
        } else {
            pick(SwimRunBack, SwimWalkBack, SneakBack, RunBack, WalkBack)
        }
    } else if rotation.z != 0.0 && context.can_turn && !sneaking {
        if rotation.z > context.turn_threshold {
            if swimming { SwimTurnRight } else { TurnRight }
        } else if rotation.z < -context.turn_threshold {
            if swimming { SwimTurnLeft } else { TurnLeft }
        } else {
            None
        }
    } else {
        None
    }
}

/// Damage taken from falling `height` world units.
pub fn fall_damage(config: &ControllerConfig, height: f32, acrobatics: f32, jump_bonus: f32) -> f32 {
    if height < config.fall_damage_distance_min {
        return 0.0;
    }

    let excess = (height - config.fall_damage_distance_min - 1.5 * acrobatics - jump_bonus).max(0.0);
    let acro_factor = config.fall_acro_base + config.fall_acro_mult * (100.0 - acrobatics);
    (config.fall_distance_base + config.fall_distance_mult * excess) * acro_factor
}

impl CharacterController {
    /// Group for `base` plus a generic one- or two-handed suffix, with the
    /// skeletal regions it may drive. Without such a clip the plain `base`
    /// group is used on the lower body only.
    pub(super) fn fallback_short_weapon_group(&self, animation: &dyn AnimationSource, base: &str) -> (String, BlendMask) {
        if !self.weapon_type.class.is_real_weapon() {
            return (base.to_owned(), BlendMask::LOWER_BODY);
        }

        let suffix = if self.weapon_type.class == WeaponClass::Melee2H {
            WeaponClass::Melee2H
        } else {
            WeaponClass::Melee1H
        };
        let group = format!("{base}{}", WeaponType::of_class(suffix).short_group);
        if !animation.has_animation(&group) {
            return (base.to_owned(), BlendMask::LOWER_BODY);
        }

        // Crossbows hold the weapon differently, keep the upper body free.
        let mask = if self.weapon_type.is_crossbow() {
            BlendMask::LOWER_BODY
        } else {
            BlendMask::ALL
        };
        (group, mask)
    }

    pub(super) fn refresh_jump_anims(
        &mut self,
        animation: &mut dyn AnimationSource,
        weapon_suffix: &str,
        jump: JumpState,
        idle: &mut IdleState,
        force: bool,
    ) {
        if !force && jump == self.states.jump() && *idle == IdleState::None {
            return;
        }

        let mut group = String::new();
        let mut mask = BlendMask::ALL;
        if jump != JumpState::None {
            group = "jump".to_owned();
            if !weapon_suffix.is_empty() {
                group.push_str(weapon_suffix);
                if !animation.has_animation(&group) {
                    let (fallback, fallback_mask) = self.fallback_short_weapon_group(animation, "jump");
                    group = fallback;
                    mask = fallback_mask;
                    // The lower-body fallback leaves the arms to the idle clip.
                    if mask == BlendMask::LOWER_BODY && *idle == IdleState::None {
                        *idle = IdleState::Idle;
                    }
                }
            }
        }

        if !force && jump == self.states.jump() {
            return;
        }

        // A forced refresh of the same state resumes the loop rather than the take-off.
        let start_at_loop = jump == self.states.jump();
        self.transition(animation, Transition::Jump(jump));

        if !self.clips.jump.is_empty() {
            animation.disable(&self.clips.jump);
            self.clips.jump.clear();
        }
        if !animation.has_animation(&group) {
            return;
        }

        match jump {
            JumpState::InAir => {
                let start_key = if start_at_loop { "loop start" } else { "start" };
                animation.play(
                    PlayRequest::new(group.clone(), Priority::Jump)
                        .with_mask(mask)
                        .with_keys(start_key, "stop")
                        .with_loops(LOOP_FOREVER),
                );
                self.clips.jump = group;
            }
            JumpState::Landing => {
                animation.play(
                    PlayRequest::new(group.clone(), Priority::Jump)
                        .with_mask(mask)
                        .auto_disable(true)
                        .with_keys("loop stop", "stop"),
                );
                self.clips.jump = group;
            }
            JumpState::None => {}
        }
    }

    pub(super) fn refresh_movement_anims(
        &mut self,
        animation: &mut dyn AnimationSource,
        state: &ActorState,
        weapon_suffix: &str,
        movement: MovementState,
        idle: &mut IdleState,
        force: bool,
    ) {
        if !force && movement == self.states.movement() && *idle == self.states.idle() {
            return;
        }

        let mut reset_idle = movement != MovementState::None && !movement.is_turning();
        let mut mask = BlendMask::ALL;
        let mut group = String::new();

        if let Some(base) = movement.group() {
            group = base.to_owned();
            if !weapon_suffix.is_empty() {
                let swimming = base.contains("swim");
                if !swimming {
                    group = if self.weapon_type.class == WeaponClass::Spell && movement.is_turning() {
                        format!("{weapon_suffix}{base}")
                    } else {
                        format!("{base}{weapon_suffix}")
                    };
                }

                if !animation.has_animation(&group) {
                    group = base.to_owned();
                    if !swimming {
                        let (fallback, fallback_mask) = self.fallback_short_weapon_group(animation, base);
                        group = fallback;
                        mask = fallback_mask;
                    }
                    // Only the legs move, the idle clip keeps the upper body alive.
                    if mask == BlendMask::LOWER_BODY {
                        if *idle == IdleState::None {
                            *idle = IdleState::Idle;
                        }
                        reset_idle = false;
                    }
                }
            }
        }

        if !force && movement == self.states.movement() {
            return;
        }

        self.transition(animation, Transition::Movement(movement));
        if !self.clips.movement.is_empty() {
            animation.disable(&self.clips.movement);
            self.clips.movement.clear();
        }

        if movement == MovementState::None {
            self.animation_controlled = true;
            self.adjust_movement_anim_speed = false;
            return;
        }
        if !animation.has_animation(&group) {
            return;
        }

        if reset_idle {
            if !self.clips.idle.is_empty() {
                animation.disable(&self.clips.idle);
                self.clips.idle.clear();
            }
            self.transition(animation, Transition::Idle(IdleState::None));
        }

        self.animation_controlled = true;
        self.adjust_movement_anim_speed = true;
        self.movement_anim_speed = self.movement_clip_velocity(animation, state, movement, &group);
        if self.movement_anim_speed <= 1.0 {
            // No root motion authored, move at the actor's own speed.
            self.animation_controlled = false;
            self.adjust_movement_anim_speed = false;
            self.movement_anim_speed = 1.0;
        }

        animation.play(
            PlayRequest::new(group.clone(), Priority::Movement)
                .with_mask(mask)
                .with_loops(LOOP_FOREVER)
                .with_loop_fallback(true),
        );
        debug!("actor {:?} moves with {group}", self.actor);
        self.clips.movement = group;
    }

    /// Root-motion speed the movement clip is scaled against.
    ///
    /// Walking creatures measure against their walk clip even while running,
    /// falling back to the clip actually played when the walk clip has no
    /// movement. Running creatures therefore animate faster than their
    /// feet travel, which stock creature assets are authored around.
    fn movement_clip_velocity(
        &self,
        animation: &dyn AnimationSource,
        state: &ActorState,
        movement: MovementState,
        group: &str,
    ) -> f32 {
        if !state.kind.is_walking_creature() {
            return animation.velocity(group);
        }

        let walk_velocity = movement
            .to_walk()
            .group()
            .map_or(0.0, |walk| animation.velocity(walk));
        if walk_velocity > 1.0 {
            walk_velocity
        } else {
            animation.velocity(group)
        }
    }

    pub(super) fn refresh_idle_anims(
        &mut self,
        services: &mut Services<'_>,
        state: &ActorState,
        weapon_suffix: &str,
        mut idle: IdleState,
        force: bool,
    ) {
        let animation = &mut *services.animation;
        let upper_body = self.states.upper_body();
        let movement = self.states.movement();
        let upper_busy = upper_body != UpperBodyState::Nothing && upper_body != UpperBodyState::WeaponEquipped;
        // Without a separate upper body the idle clip would fight the other layers.
        if (upper_busy || (movement != MovementState::None && !movement.is_turning()) || self.states.hit() != HitState::None)
            && !state.bipedal
        {
            idle = IdleState::None;
        }

        if !force
            && idle == self.states.idle()
            && (animation.is_playing(&self.clips.idle) || !self.queue.is_empty())
        {
            return;
        }

        self.transition(animation, Transition::Idle(idle));

        let mut group = String::new();
        let mut priority = AnimPriority::uniform(Priority::Default);
        let mut loops = LOOP_FOREVER;
        match idle {
            IdleState::None | IdleState::Special => {}
            IdleState::IdleSwim if animation.has_animation("idleswim") => {
                group = "idleswim".to_owned();
                priority = AnimPriority::uniform(Priority::SwimIdle);
            }
            IdleState::IdleSneak if animation.has_animation("idlesneak") => {
                group = "idlesneak".to_owned();
                priority = priority.with(BoneGroup::LowerBody, Priority::SneakIdleLowerBody);
            }
            _ => {
                group = "idle".to_owned();
                if !weapon_suffix.is_empty() {
                    group.push_str(weapon_suffix);
                    if !animation.has_animation(&group) {
                        group = self.fallback_short_weapon_group(animation, "idle").0;
                    }
                    // Weapon idles are short, repeat them a few times.
                    loops = 1 + services.rng.gen_range(0..4);
                }
            }
        }

        // Replaying the same group keeps its place.
        let mut start_point = 0.0;
        if !self.clips.idle.is_empty() && self.clips.idle == group {
            if let Some(info) = animation.info(&self.clips.idle) {
                start_point = info.complete;
            }
        }

        if !self.clips.idle.is_empty() {
            animation.disable(&self.clips.idle);
        }
        self.clips.idle = group;
        if !self.clips.idle.is_empty() {
            animation.play(
                PlayRequest::new(self.clips.idle.clone(), priority)
                    .starting_at(start_point)
                    .with_loops(loops)
                    .with_loop_fallback(true),
            );
        }
    }

    /// Touchdown after a fall: fall damage and a possible knockdown.
    pub(super) fn land(&mut self, services: &mut Services<'_>, state: &mut ActorState) {
        let config = services.config;
        let height = state.stats.land();
        let damage = fall_damage(config, height, state.stats.acrobatics, state.stats.jump_bonus);
        if damage <= 0.0 {
            return;
        }

        let fatigue_term = state.stats.fatigue_term(config);
        debug!("actor {:?} fell {height} units for {damage} damage", self.actor);
        if state.is_god() {
            return;
        }
        state.stats.health.current -= damage * (1.0 - 0.25 * fatigue_term);
        if damage > state.stats.acrobatics * fatigue_term {
            state.stats.knocked_down = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_foot() -> MovementContext {
        MovementContext {
            can_turn: true,
            turn_threshold: 0.015,
            ..MovementContext::default()
        }
    }

    #[test]
    fn strafe_needs_twice_the_forward_component() {
        let context = on_foot();
        assert_eq!(
            classify_movement(Vec3::new(1.0, 0.4, 0.0), Vec3::ZERO, context),
            MovementState::WalkRight
        );
        assert_eq!(
            classify_movement(Vec3::new(1.0, 0.6, 0.0), Vec3::ZERO, context),
            MovementState::WalkForward
        );
        assert_eq!(
            classify_movement(Vec3::new(-1.0, 0.0, 0.0), Vec3::ZERO, context),
            MovementState::WalkLeft
        );
    }

    #[test]
    fn variant_priority_is_swim_sneak_run_walk() {
        let forward = Vec3::new(0.0, 1.0, 0.0);
        let swim = MovementContext {
            swimming: true,
            sneaking: true,
            running: true,
            ..on_foot()
        };
        assert_eq!(classify_movement(forward, Vec3::ZERO, swim), MovementState::SwimRunForward);

        let sneak = MovementContext {
            sneaking: true,
            running: true,
            ..on_foot()
        };
        assert_eq!(classify_movement(forward, Vec3::ZERO, sneak), MovementState::SneakForward);

        let run = MovementContext {
            running: true,
            ..on_foot()
        };
        assert_eq!(classify_movement(-forward, Vec3::ZERO, run), MovementState::RunBack);
    }

    #[test]
    fn turning_respects_threshold_and_gates() {
        let context = on_foot();
        assert_eq!(
            classify_movement(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.02), context),
            MovementState::TurnRight
        );
        assert_eq!(
            classify_movement(Vec3::ZERO, Vec3::new(0.0, 0.0, -0.02), context),
            MovementState::TurnLeft
        );
        assert_eq!(
            classify_movement(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.01), context),
            MovementState::None
        );

        let creature = MovementContext {
            can_turn: false,
            ..context
        };
        assert_eq!(
            classify_movement(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.5), creature),
            MovementState::None
        );

        let sneaking = MovementContext {
            sneaking: true,
            ..context
        };
        assert_eq!(
            classify_movement(Vec3::ZERO, Vec3::new(0.0, 0.0, 0.5), sneaking),
            MovementState::None
        );
    }

    #[test]
    fn no_fall_damage_below_minimum() {
        let config = ControllerConfig::default();
        assert_eq!(fall_damage(&config, 399.0, 5.0, 0.0), 0.0);
    }

    #[test]
    fn fall_damage_scales_with_height_and_acrobatics() {
        let config = ControllerConfig::default();
        // x = 1000 - 400 - 75 = 525, a = 0.5 + 0.01 * 50 = 1.0
        let damage = fall_damage(&config, 1000.0, 50.0, 0.0);
        assert!((damage - 0.07 * 525.0).abs() < 1e-3, "damage was {damage}");

        let expert = fall_damage(&config, 1000.0, 100.0, 0.0);
        assert!(expert < damage);

        let jumping = fall_damage(&config, 1000.0, 50.0, 600.0);
        assert_eq!(jumping, 0.0, "a large jump bonus absorbs the whole fall");
    }
}
