mod common;

use character_anim::*;
use common::*;

fn fighting_creature() -> ActorState {
    let mut state = ActorState::creature(false);
    state.stats.draw_state = DrawState::Weapon;
    state
}

#[test]
fn attack_without_hit_key_strikes_on_start() {
    let clips = MockAnimation::new()
        .with_simple_clip("idle", 2.0)
        .with_simple_clip("attack1", 0.5);
    let mut harness = Harness::new(clips, fighting_creature());

    harness.state.intent.attacking = true;
    harness.update(0.1);

    assert!(!harness.state.intent.attacking, "creature attacks are one press");
    assert_eq!(harness.controller.current_weapon(), "attack1");
    let hits = harness.gameplay.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, AttackType::Chop);
    assert!((0.1..=1.0).contains(&hits[0].0));

    for _ in 0..10 {
        harness.update(0.1);
    }
    assert_eq!(harness.gameplay.hits().len(), 1);
    assert_eq!(harness.states().upper_body(), UpperBodyState::Nothing);
}

fn two_attack_clips() -> MockAnimation {
    MockAnimation::new()
        .with_simple_clip("idle", 2.0)
        .with_clip("attack1", &[(0.0, "start"), (0.3, "hit"), (0.5, "stop")])
        .with_clip("attack2", &[(0.0, "start"), (0.3, "hit"), (0.5, "stop")])
}

#[test]
fn attack_with_hit_key_waits_for_it() {
    let mut seen = Vec::new();
    for seed in 0..20 {
        let mut harness = Harness::seeded(two_attack_clips(), fighting_creature(), seed);
        harness.state.intent.attacking = true;
        harness.update(0.1);
        assert!(harness.gameplay.hits().is_empty(), "no strike before the hit key");
        assert_eq!(harness.states().upper_body(), UpperBodyState::StartToMinAttack);

        harness.update(0.1);
        harness.update(0.15);
        let hits = harness.gameplay.hits();
        assert_eq!(hits.len(), 1);
        let expected = if harness.controller.current_weapon() == "attack1" {
            AttackType::Chop
        } else {
            AttackType::Slash
        };
        assert_eq!(hits[0].1, expected);
        seen.push(harness.controller.current_weapon().to_owned());
    }
    assert!(seen.iter().any(|group| group == "attack1"));
    assert!(seen.iter().any(|group| group == "attack2"));
}

#[test]
fn creature_attack_swishes() {
    let clips = MockAnimation::new().with_simple_clip("attack1", 0.5);
    let mut harness = Harness::new(clips, fighting_creature());
    harness.state.intent.attacking = true;
    harness.update(0.1);
    assert!(
        harness
            .gameplay
            .calls
            .iter()
            .any(|call| matches!(call, Call::Sound { sound, .. } if sound == "Weapon Swish"))
    );
}
