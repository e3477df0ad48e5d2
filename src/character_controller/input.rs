use bevy::input::ButtonInput;
use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::math::Vec3;
use bevy::prelude::{Gamepad, GamepadAxis, GamepadButton, KeyCode, MouseButton, Query, Res, With};

use super::actor::{ActorState, DrawState};
use super::components::Player;

/// Radians of yaw per pixel of mouse motion.
const MOUSE_TURN_SCALE: f32 = 0.003;

/// Fills the player's intent from keyboard and mouse.
pub fn keyboard_input(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mouse_input: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mut player_query: Query<&mut ActorState, With<Player>>,
) {
    let Ok(mut state) = player_query.single_mut() else { return };

    // Basic movement
    let up = keyboard_input.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]);
    let down = keyboard_input.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]);
    let left = keyboard_input.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]);
    let right = keyboard_input.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]);

    let horizontal = right as i8 - left as i8;
    let vertical = up as i8 - down as i8;
    let jump = keyboard_input.just_pressed(KeyCode::Space);

    let intent = &mut state.intent;
    intent.movement = Vec3::new(horizontal as f32, vertical as f32, if jump { 1.0 } else { 0.0 });
    intent.rotation = Vec3::new(0.0, 0.0, mouse_motion.delta.x * MOUSE_TURN_SCALE);
    intent.running = keyboard_input.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    intent.sneaking = keyboard_input.pressed(KeyCode::ControlLeft);
    // Held for the wind-up, released to strike.
    intent.attacking = mouse_input.pressed(MouseButton::Left);

    if keyboard_input.just_pressed(KeyCode::KeyF) {
        toggle_draw_state(&mut state, DrawState::Weapon);
    }
    if keyboard_input.just_pressed(KeyCode::KeyR) {
        toggle_draw_state(&mut state, DrawState::Spell);
    }
}

/// Fills the player's intent from gamepads. Runs after the keyboard so a
/// deflected stick wins.
pub fn gamepad_input(gamepads: Query<&Gamepad>, mut player_query: Query<&mut ActorState, With<Player>>) {
    let Ok(mut state) = player_query.single_mut() else { return };

    for gamepad in gamepads.iter() {
        // Movement with left stick
        if let (Some(x), Some(y)) = (
            gamepad.get(GamepadAxis::LeftStickX),
            gamepad.get(GamepadAxis::LeftStickY),
        ) {
            if x * x + y * y > 0.01 {
                state.intent.movement.x = x;
                state.intent.movement.y = y;
                state.intent.running |= gamepad.pressed(GamepadButton::LeftThumb);
            }
        }
        if let Some(x) = gamepad.get(GamepadAxis::RightStickX) {
            if x.abs() > 0.1 {
                state.intent.rotation.z = x * 0.05;
            }
        }

        // Jump (A/Cross button)
        if gamepad.just_pressed(GamepadButton::South) {
            state.intent.movement.z = 1.0;
        }
        state.intent.attacking |= gamepad.pressed(GamepadButton::RightTrigger2);
        state.intent.sneaking |= gamepad.pressed(GamepadButton::RightThumb);

        if gamepad.just_pressed(GamepadButton::North) {
            toggle_draw_state(&mut state, DrawState::Weapon);
        }
        if gamepad.just_pressed(GamepadButton::West) {
            toggle_draw_state(&mut state, DrawState::Spell);
        }
    }
}

fn toggle_draw_state(state: &mut ActorState, wanted: DrawState) {
    // No drawing or sheathing while swinging.
    if state.intent.attacking {
        return;
    }
    state.stats.draw_state = if state.stats.draw_state == wanted {
        DrawState::Nothing
    } else {
        wanted
    };
}
