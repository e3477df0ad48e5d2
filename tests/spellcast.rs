mod common;

use character_anim::*;
use common::*;

const TICK: f32 = 0.125;

fn casting_npc() -> ActorState {
    let mut state = ActorState::npc();
    state.stats.draw_state = DrawState::Spell;
    state.equipment.selected_spell = Some(SpellInfo {
        id: "shock touch".to_owned(),
        range: SpellRange::Touch,
        cost: 10.0,
    });
    state
}

fn spellcast_clips() -> MockAnimation {
    MockAnimation::new().with_simple_clip("idle", 2.0).with_clip(
        "spellcast",
        &[
            (0.0, "equip start"),
            (0.0, "equip stop"),
            (0.0, "touch start"),
            (0.3, "touch release"),
            (0.5, "touch stop"),
            (0.6, "target start"),
            (0.8, "target release"),
            (1.0, "target stop"),
        ],
    )
}

#[test]
fn spell_is_cast_on_its_release_key() {
    let mut harness = Harness::new(spellcast_clips(), casting_npc());
    assert_eq!(harness.states().upper_body(), UpperBodyState::WeaponEquipped);

    harness.state.intent.attacking = true;
    harness.update(TICK);
    assert!(!harness.state.intent.attacking, "a cast is one press");
    assert_eq!(harness.states().upper_body(), UpperBodyState::CastingSpell);
    assert!(harness.controller.is_casting_spell());
    assert!(harness.gameplay.calls.contains(&Call::CastEffects("shock touch".to_owned())));
    let cast = harness.animation.last_play("spellcast").unwrap();
    assert_eq!(cast.start_key, "touch start");
    assert!(cast.auto_disable);

    harness.update(TICK);
    assert_eq!(harness.gameplay.casts(), 0);
    harness.update(TICK);
    assert_eq!(harness.gameplay.casts(), 1);
    assert!(harness.gameplay.calls.contains(&Call::Cast { manual: false }));

    harness.update(TICK);
    harness.update(TICK);
    assert_eq!(harness.states().upper_body(), UpperBodyState::WeaponEquipped);
    assert_eq!(harness.gameplay.casts(), 1);
}

#[test]
fn refused_cast_plays_nothing() {
    let mut harness = Harness::new(spellcast_clips(), casting_npc());
    harness.gameplay.refuse_casts = true;

    harness.state.intent.attacking = true;
    harness.update(TICK);

    assert_eq!(harness.states().upper_body(), UpperBodyState::WeaponEquipped);
    assert!(!harness.animation.is_active("spellcast"));
    assert_eq!(harness.gameplay.casts(), 0);
}

#[test]
fn manual_cast_skips_the_magicka_check() {
    let mut harness = Harness::new(spellcast_clips(), casting_npc());
    harness.gameplay.refuse_casts = true;
    harness.controller.cast_manually();

    harness.state.intent.attacking = true;
    for _ in 0..3 {
        harness.update(TICK);
    }
    assert!(harness.gameplay.calls.contains(&Call::Cast { manual: true }));
}
