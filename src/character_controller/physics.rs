use avian3d::math::Vector;
use avian3d::position::Rotation;
use avian3d::prelude::{LinearVelocity, ShapeHits};
use bevy::math::Vec3;
use bevy::prelude::{Commands, Entity, Query, Res, Time, Transform, With};

use super::actor::ActorState;
use super::components::*;
use super::config::ControllerConfig;

/// Updates the [`Grounded`] status and the actor's ground contact.
pub fn update_grounded(
    mut commands: Commands,
    mut query: Query<(Entity, &ShapeHits, &Rotation, Option<&MaxSlopeAngle>, &mut ActorState), With<CharacterBody>>,
) {
    for (entity, hits, rotation, max_slope_angle, mut state) in &mut query {
        // The character is grounded if the shape caster has a hit with a normal
        // that isn't too steep.
        let is_grounded = hits.iter().any(|hit| {
            if let Some(angle) = max_slope_angle {
                (rotation * -hit.normal2).angle_between(Vector::Y).abs() <= angle.0
            } else {
                true
            }
        });

        state.surroundings.on_ground = is_grounded;
        if is_grounded {
            commands.entity(entity).insert(Grounded);
        } else {
            commands.entity(entity).remove::<Grounded>();
        }
    }
}

/// Accumulates how far an airborne actor has fallen, in game units. The
/// controller consumes it on landing.
pub fn track_fall_height(
    time: Res<Time>,
    config: Res<ControllerConfig>,
    mut query: Query<(&LinearVelocity, &mut ActorState), With<CharacterBody>>,
) {
    let delta_time = time.delta_secs();
    for (velocity, mut state) in &mut query {
        if state.surroundings.on_ground || state.surroundings.swimming || state.surroundings.flying {
            continue;
        }
        if velocity.y < 0.0 {
            state.stats.fall_height += -velocity.y * delta_time * config.world_units_per_meter;
        }
    }
}

/// Writes the movement the controller asked for back into the physics body.
///
/// Controller space is x right, y forward, z up in game units per second.
pub fn apply_character_movement(
    config: Res<ControllerConfig>,
    mut query: Query<(&CharacterAnimation, &mut LinearVelocity, &mut Transform), With<CharacterBody>>,
) {
    for (animation, mut linear_velocity, mut transform) in &mut query {
        let movement = animation.movement;
        let planar = if movement.animation_controlled {
            movement.animation_velocity
        } else {
            movement.velocity
        };

        // Bevy looks down -Z.
        let local = Vec3::new(planar.x, 0.0, -planar.y) / config.world_units_per_meter;
        let world = transform.rotation * local;
        linear_velocity.x = world.x;
        linear_velocity.z = world.z;
        if movement.velocity.z > 0.0 {
            linear_velocity.y = movement.velocity.z / config.world_units_per_meter;
        }

        // Positive yaw turns right.
        transform.rotate_y(-movement.rotation.z);
    }
}
