use std::collections::HashMap;

use avian3d::prelude::Collider;
use avian3d::math::{Quaternion, Scalar, Vector};
use avian3d::prelude::{LockedAxes, RigidBody, ShapeCaster};
use bevy::math::Dir3;
use bevy::prelude::Component;

use super::actor::ActorState;
use super::controller::{CharacterController, MovementOutput};
use super::persist::AnimationRecord;
use super::services::AnimationSource;

/// Marks the actor driven by local input.
#[derive(Component, Default)]
pub struct Player;

/// The clip source animating this actor's skeleton.
#[derive(Component)]
pub struct AnimationDriver(pub Box<dyn AnimationSource + Send + Sync>);

impl AnimationDriver {
    pub fn new(source: impl AnimationSource + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }
}

/// Saved animation state to restore when the controller is attached.
#[derive(Component, Clone, Debug, Default)]
pub struct SavedAnimation(pub AnimationRecord);

/// Species or material specific sounds by `soundgen` name, e.g. `left` → `FootBareLeft`.
#[derive(Component, Clone, Debug, Default)]
pub struct SoundGens(pub HashMap<String, String>);

impl SoundGens {
    pub fn with(mut self, sound_gen: impl Into<String>, sound: impl Into<String>) -> Self {
        self.0.insert(sound_gen.into(), sound.into());
        self
    }

    pub fn get(&self, sound_gen: &str) -> Option<&str> {
        self.0.get(sound_gen).map(String::as_str)
    }
}

/// The controller of an actor and the movement it asked for on the last tick.
#[derive(Component)]
pub struct CharacterAnimation {
    pub controller: CharacterController,
    pub movement: MovementOutput,
}

impl CharacterAnimation {
    pub fn new(controller: CharacterController) -> Self {
        Self {
            controller,
            movement: MovementOutput::default(),
        }
    }

    /// Snapshot for a save game.
    pub fn record(&self, driver: &AnimationDriver, state: &ActorState) -> AnimationRecord {
        self.controller.persist(driver.0.as_ref(), &state.stats)
    }
}

/// A marker component indicating that an entity moves as a physical character.
/// Requires all components needed for grounded detection.
#[derive(Component)]
#[require(RigidBody, Collider, ShapeCaster, LockedAxes, MaxSlopeAngle)]
pub struct CharacterBody;

/// A marker component indicating that an entity is on the ground.
#[derive(Component)]
#[component(storage = "SparseSet")]
pub struct Grounded;

/// The maximum angle a slope can have for a character to stand on it.
#[derive(Component)]
pub struct MaxSlopeAngle(pub Scalar);

impl Default for MaxSlopeAngle {
    fn default() -> Self {
        Self((30.0 as Scalar).to_radians())
    }
}

impl CharacterBody {
    pub fn new(collider: Collider) -> (Self, RigidBody, Collider, ShapeCaster, LockedAxes, MaxSlopeAngle) {
        // Create shape caster as a slightly smaller version of collider
        let mut caster_shape = collider.clone();
        caster_shape.set_scale(Vector::ONE * 0.95, 10);

        (
            CharacterBody,
            RigidBody::Dynamic,
            collider,
            ShapeCaster::new(caster_shape, Vector::ZERO, Quaternion::default(), Dir3::NEG_Y)
                .with_max_distance(0.3)
                .with_max_hits(5),
            LockedAxes::ROTATION_LOCKED,
            MaxSlopeAngle::default(),
        )
    }
}
