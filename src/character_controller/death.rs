use bevy::log::debug;

use super::actor::ActorState;
use super::controller::{CharacterController, KillResult, choose_random_group};
use super::services::{AnimationSource, PlayRequest, Priority, Services};
use super::states::{DEATH_GROUP_COUNT, DeathState, HitState, Transition};
use super::weapon::WeaponType;

impl CharacterController {
    /// Drives the death of an actor whose health ran out. Call every tick
    /// while the actor is dead.
    pub fn kill(&mut self, services: &mut Services<'_>, state: &mut ActorState) -> KillResult {
        if !self.states.is_dead() {
            self.play_random_death(services, state, 0.0);
            return KillResult::DeathAnimStarted;
        }

        // Still waiting behind a persistent scripted animation.
        if self.clips.death.is_empty() || services.animation.is_playing(&self.clips.death) {
            return KillResult::DeathAnimPlaying;
        }
        if !state.stats.death_animation_finished {
            state.stats.death_animation_finished = true;
            return KillResult::DeathAnimJustFinished;
        }
        KillResult::DeathAnimFinished
    }

    /// Brings a dead actor back. The next update rebuilds every layer.
    pub fn resurrect(&mut self, animation: &mut dyn AnimationSource) {
        if !self.states.is_dead() {
            return;
        }
        if !self.clips.death.is_empty() {
            animation.disable(&self.clips.death);
            self.clips.death.clear();
        }
        self.states.apply(Transition::Resurrect);
        self.weapon_type = WeaponType::default();
        self.weapon_item = None;
        debug!("actor {:?} resurrected", self.actor);
    }

    /// Death variant matching how the actor was when it died.
    pub(super) fn choose_death_state(&self, services: &mut Services<'_>, state: &ActorState) -> DeathState {
        let animation = &*services.animation;
        let hit = self.states.hit();
        if hit == HitState::SwimKnockDown && animation.has_animation("swimdeathknockdown") {
            DeathState::SwimDeathKnockDown
        } else if hit == HitState::SwimKnockOut && animation.has_animation("swimdeathknockout") {
            DeathState::SwimDeathKnockOut
        } else if state.surroundings.swimming && animation.has_animation("swimdeath") {
            DeathState::SwimDeath
        } else if hit == HitState::KnockDown && animation.has_animation("deathknockdown") {
            DeathState::DeathKnockDown
        } else if hit == HitState::KnockOut && animation.has_animation("deathknockout") {
            DeathState::DeathKnockOut
        } else {
            let (_, index) = choose_random_group(animation, services.rng, "death", DEATH_GROUP_COUNT);
            DeathState::Death(index)
        }
    }

    pub(super) fn play_random_death(&mut self, services: &mut Services<'_>, state: &mut ActorState, start_point: f32) {
        if state.is_player {
            // First-person models carry no death clips.
            services.gameplay.use_death_camera();
        }

        let death = self.choose_death_state(services, state);
        state.stats.death_animation = death.index();
        debug!("actor {:?} dies with {:?}", self.actor, death);

        self.transition(services.animation, Transition::Death(death));
        self.clips.weapon.clear();
        // A persistent scripted animation finishes first; the death clip is
        // started by the update after it ends.
        if self.is_persistent_anim_playing(services.animation) {
            return;
        }
        self.play_death(services.animation, start_point);
    }

    /// Plays the clip of the current death state from `start_point`.
    pub(super) fn play_death(&mut self, animation: &mut dyn AnimationSource, start_point: f32) {
        let death = self.states.death();
        let Some(mut group) = death.group() else {
            return;
        };
        // Swim variants of a model without them fall back to the land ones.
        if !animation.has_animation(&group) {
            if let Some(land) = group.strip_prefix("swim").filter(|land| animation.has_animation(land)) {
                group = land.to_owned();
            }
        }

        // Reset again: clips of the other layers could still fire text keys.
        self.transition(animation, Transition::Death(death));
        animation.disable(&self.clips.weapon);
        self.clips.weapon.clear();
        if !self.clips.death.is_empty() {
            animation.disable(&self.clips.death);
        }
        self.animation_controlled = true;

        animation.play(PlayRequest::new(group.clone(), Priority::Death).starting_at(start_point));
        self.clips.death = group;
    }
}
