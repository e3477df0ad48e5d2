use std::ops::RangeInclusive;

use bevy::prelude::Resource;

/// Game settings the controller reads. Defaults match the stock game data.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    // Fall damage
    pub fall_damage_distance_min: f32,
    pub fall_acro_base: f32,
    pub fall_acro_mult: f32,
    pub fall_distance_base: f32,
    pub fall_distance_mult: f32,

    // Fatigue
    pub fatigue_base: f32,
    pub fatigue_mult: f32,
    pub fatigue_jump_base: f32,
    pub fatigue_jump_mult: f32,

    // Air control
    pub jump_move_base: f32,
    pub jump_move_mult: f32,

    // Combat
    pub knockout_wake_seconds: RangeInclusive<f32>,
    pub min_attack_strength: f32, // Floor of randomly rolled attack strength
    pub best_attack: bool, // Player attacks with the highest damage type instead of by direction
    pub use_magic_item_animations: bool, // Enchanted items play the cast clip

    // Turning
    pub player_turn_threshold: f32, // Yaw per 1/60 s before a turn clip plays
    pub npc_turn_threshold: f32,
    pub max_turn_speed_mult: f32,
    pub player_turn_hold: f32, // Completion a player turn clip plays to before it may stop
    pub player_swim_turn_hold: f32,

    // Sounds
    pub swish_sound: String,
    pub land_sound: String,
    pub land_water_sound: String,

    /// Conversion from physics metres to game units for fall height.
    pub world_units_per_meter: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fall_damage_distance_min: 400.0,
            fall_acro_base: 0.5,
            fall_acro_mult: 0.01,
            fall_distance_base: 0.0,
            fall_distance_mult: 0.07,

            fatigue_base: 1.25,
            fatigue_mult: 0.5,
            fatigue_jump_base: 5.0,
            fatigue_jump_mult: 10.0,

            jump_move_base: 0.5,
            jump_move_mult: 0.5,

            knockout_wake_seconds: 1.0..=3.0,
            min_attack_strength: 0.1,
            best_attack: false,
            use_magic_item_animations: false,

            player_turn_threshold: 0.015,
            npc_turn_threshold: 0.001,
            max_turn_speed_mult: 1.5,
            player_turn_hold: 0.4,
            player_swim_turn_hold: 0.8,

            swish_sound: "Weapon Swish".to_owned(),
            land_sound: "DefaultLand".to_owned(),
            land_water_sound: "DefaultLandWater".to_owned(),

            world_units_per_meter: 70.0,
        }
    }
}
