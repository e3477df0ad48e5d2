mod common;

use bevy::input::InputPlugin;
use bevy::prelude::*;
use character_anim::*;
use common::*;

fn app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, InputPlugin, CharacterAnimationPlugin));
    app
}

fn character_events(app: &App) -> Vec<CharacterEvent> {
    let events = app.world().resource::<Events<CharacterEvent>>();
    events.get_cursor().read(events).cloned().collect()
}

#[test]
fn controller_is_attached_on_first_update() {
    let mut app = app();
    let clips = MockAnimation::new().with_simple_clip("idle", 2.0);
    let actor = app.world_mut().spawn((ActorState::npc(), AnimationDriver::new(clips))).id();

    app.update();

    let animation = app.world().get::<CharacterAnimation>(actor).unwrap();
    assert_eq!(animation.controller.actor(), actor);
    assert_eq!(animation.controller.current_idle(), "idle");
}

#[test]
fn dying_actor_reports_its_death() {
    let mut app = app();
    let clips = MockAnimation::new().with_simple_clip("death1", 1.0);
    let actor = app.world_mut().spawn((ActorState::npc(), AnimationDriver::new(clips))).id();
    app.update();

    app.world_mut().get_mut::<ActorState>(actor).unwrap().stats.dead = true;
    app.update();

    let events = character_events(&app);
    assert!(events.contains(&CharacterEvent::Died { actor }));
    let animation = app.world().get::<CharacterAnimation>(actor).unwrap();
    assert!(animation.controller.states().is_dead());
    assert_eq!(app.world().get::<ActorState>(actor).unwrap().stats.death_animation, Some(0));
}

#[test]
fn saved_animation_is_consumed() {
    let mut app = app();
    let clips = MockAnimation::new()
        .with_simple_clip("idle", 2.0)
        .with_simple_clip("bowdown", 2.0);
    let record = AnimationRecord {
        scripted: vec![ScriptedAnimation {
            group: "bowdown".to_owned(),
            time: 0.5,
            absolute: false,
            loop_count: 0,
        }],
        death_animation: None,
    };
    let actor = app
        .world_mut()
        .spawn((ActorState::npc(), AnimationDriver::new(clips), SavedAnimation(record)))
        .id();

    app.update();

    assert!(app.world().get::<SavedAnimation>(actor).is_none());
    let world = app.world();
    let animation = world.get::<CharacterAnimation>(actor).unwrap();
    let driver = world.get::<AnimationDriver>(actor).unwrap();
    let state = world.get::<ActorState>(actor).unwrap();
    assert!(animation.controller.is_persistent_anim_playing(driver.0.as_ref()));

    let saved = animation.record(driver, state);
    assert_eq!(saved.scripted.len(), 1);
    assert_eq!(saved.scripted[0].group, "bowdown");
}
