use bevy::log::debug;
use rand::Rng;

use super::actor::ActorState;
use super::controller::{CharacterController, choose_random_group};
use super::services::{AnimPriority, BoneGroup, LOOP_FOREVER, PlayRequest, Priority, Services};
use super::states::{HitState, IdleState, Transition};

impl CharacterController {
    /// Starts, finishes or wakes from hit reactions. Runs before the other
    /// layers so a reaction can claim the idle slot.
    pub(super) fn refresh_hit_recoil_anims(
        &mut self,
        services: &mut Services<'_>,
        state: &mut ActorState,
        idle: &mut IdleState,
    ) {
        let stats = &state.stats;
        let swimming = state.surroundings.swimming;
        let knocked_down = stats.knocked_down;
        let recovery = stats.hit_recovery;
        let block = stats.block;
        let fatigue = stats.fatigue;

        if self.states.hit() == HitState::None {
            let animation = &mut *services.animation;
            let mut entered = None;

            if (fatigue.current < 0.0 || fatigue.base == 0.0) && animation.has_animation("knockout") {
                let wake = services.config.knockout_wake_seconds.clone();
                self.time_until_wake = services.rng.gen_range(wake);
                let (hit, group) = if swimming && animation.has_animation("swimknockout") {
                    (HitState::SwimKnockOut, "swimknockout")
                } else {
                    (HitState::KnockOut, "knockout")
                };
                entered = Some((
                    hit,
                    PlayRequest::new(group, Priority::Knockdown).with_loops(LOOP_FOREVER),
                ));
                state.stats.knocked_down = true;
            } else if knocked_down && animation.has_animation("knockdown") {
                let (hit, group) = if swimming && animation.has_animation("swimknockdown") {
                    (HitState::SwimKnockDown, "swimknockdown")
                } else {
                    (HitState::KnockDown, "knockdown")
                };
                entered = Some((hit, PlayRequest::new(group, Priority::Knockdown).auto_disable(true)));
            } else if recovery {
                let (swim_group, _) = choose_random_group(animation, services.rng, "swimhit", u8::MAX);
                let picked = if swimming && animation.has_animation(&swim_group) {
                    Some((HitState::SwimHit, swim_group))
                } else {
                    let (group, _) = choose_random_group(animation, services.rng, "hit", u8::MAX);
                    animation.has_animation(&group).then_some((HitState::Hit, group))
                };
                entered = picked.map(|(hit, group)| (hit, PlayRequest::new(group, Priority::Hit).auto_disable(true)));
            } else if block && animation.has_animation("shield") {
                let priority = AnimPriority::uniform(Priority::Hit)
                    .with(BoneGroup::LeftArm, Priority::Block)
                    .with(BoneGroup::LowerBody, Priority::WeaponLowerBody);
                entered = Some((
                    HitState::Block,
                    PlayRequest::new("shield", priority)
                        .auto_disable(true)
                        .with_keys("block start", "block stop"),
                ));
            }

            match entered {
                Some((hit, request)) => self.enter_hit(services, state, hit, request),
                None => {
                    // Nothing to play for these flags, do not leave them pending.
                    state.stats.hit_recovery = false;
                    state.stats.block = false;
                }
            }
        } else if !services.animation.is_playing(&self.clips.hit) {
            self.clips.hit.clear();
            if knocked_down {
                state.stats.knocked_down = false;
            }
            if recovery {
                state.stats.hit_recovery = false;
            }
            if block {
                state.stats.block = false;
            }
            self.states.apply(Transition::Hit(HitState::None));
            debug!("actor {:?} recovered from hit", self.actor);
        } else if self.states.hit().is_knocked_out() && fatigue.current > 0.0 && self.time_until_wake <= 0.0 {
            let hit = if swimming {
                HitState::SwimKnockDown
            } else {
                HitState::KnockDown
            };
            self.states.apply(Transition::Hit(hit));
            services.animation.disable(&self.clips.hit);
            services.animation.play(
                PlayRequest::new(self.clips.hit.clone(), Priority::Knockdown)
                    .auto_disable(true)
                    .with_keys("loop stop", "stop"),
            );
            debug!("actor {:?} wakes up", self.actor);
        }

        if self.states.hit() != HitState::None {
            *idle = IdleState::None;
        }
    }

    fn enter_hit(&mut self, services: &mut Services<'_>, state: &mut ActorState, hit: HitState, request: PlayRequest) {
        let was_attacking = self.states.upper_body().is_attacking();
        let resets = self.transition(services.animation, Transition::Hit(hit));

        if resets.upper_body {
            // Knocked off balance mid-attack or mid-draw: the attack is lost.
            if was_attacking && self.weapon_type.class.is_real_weapon() {
                services.animation.show_weapons(true);
            }
            state.intent.attacking = false;
        }

        self.clips.hit = request.group.clone();
        services.animation.play(request);
        debug!("actor {:?} enters {:?}", self.actor, hit);
    }
}
