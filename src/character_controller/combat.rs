//! Weapon drawing, attack sequencing and spell casting on the upper body.
//!
//! An attack walks the weapon group through its authored segments:
//!
//! ```text
//! <type> start      -> <type> min attack    StartToMinAttack
//! <type> min attack -> <type> max attack    MinAttackToMaxAttack (wind-up, held)
//! <type> max attack -> <type> min hit       MaxAttackToMinHit    (release)
//! <type> min hit    -> <type> hit           MinHitToHit
//! <type> * follow start -> * follow stop    FollowStartToFollowStop
//! ```
//!
//! Damage itself is applied from the `hit` text key, see `text_keys`.

use bevy::log::debug;
use rand::Rng;

use super::actor::{ActorState, DrawState};
use super::controller::{CharacterController, active_weapon, choose_random_group, is_random_attack_group};
use super::services::{
    AnimPriority, AnimationSource, BlendMask, BoneGroup, LOOP_FOREVER, PlayRequest, Priority, Services, SoundMode,
};
use super::states::{HitState, IdleState, Transition, UpperBodyState};
use super::weapon::{AttackDamage, AttackType, ItemKind, WeaponClass, WeaponType};

impl CharacterController {
    /// Advances the weapon layer. Returns true when the other layers must be
    /// re-blended because the weapon changed.
    pub(super) fn update_weapon_state(
        &mut self,
        services: &mut Services<'_>,
        state: &mut ActorState,
        idle: &mut IdleState,
    ) -> bool {
        let (weapon_type, weapon_item) = active_weapon(services, state);

        let mut weapon_changed = false;
        let mut up_sound = None;
        let mut down_sound = None;
        if state.has_inventory {
            let previous_is_item = !matches!(
                self.weapon_type.class,
                WeaponClass::HandToHand | WeaponClass::Spell | WeaponClass::None
            );
            if let Some(item) = &weapon_item {
                let next_is_item = !matches!(
                    weapon_type.class,
                    WeaponClass::HandToHand | WeaponClass::Spell | WeaponClass::None
                );
                if self.weapon_type.class != WeaponClass::HandToHand && next_is_item {
                    up_sound = item.up_sound.clone();
                }
                if previous_is_item {
                    down_sound = item.down_sound.clone();
                }
            }
            // Weapon put away into fists: the hand is already empty.
            if weapon_item.is_none()
                && weapon_type.class == WeaponClass::HandToHand
                && self.weapon_type.class != WeaponClass::Spell
            {
                down_sound = self.weapon_item.as_ref().and_then(|item| item.down_sound.clone());
            }
            if self.weapon_item != weapon_item {
                self.weapon_item = weapon_item;
                weapon_changed = true;
            }
        }

        let mut priority = AnimPriority::uniform(Priority::Weapon);
        if state.bipedal {
            priority = priority.with(BoneGroup::LowerBody, Priority::WeaponLowerBody);
        }

        let mut force = false;
        let still_weapon = self.weapon_type.class.swaps_in_place() && weapon_type.class.swaps_in_place();

        // Weapon taken away mid-attack, e.g. disarmed: drop the attack right away.
        if still_weapon && self.weapon_type != weapon_type && self.states.upper_body().is_attacking() {
            force = true;
            self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
            state.intent.attacking = false;
            services.animation.disable(&self.clips.weapon);
            services.animation.show_weapons(true);
        }

        let hit = self.states.hit();
        if !hit.is_knocked_out() && !hit.is_knocked_down() && !hit.is_recovery() {
            if weapon_type != self.weapon_type
                && self.states.upper_body() != UpperBodyState::Unequipping
                && !still_weapon
            {
                if !weapon_changed {
                    self.play_unequip(services.animation, &weapon_type, priority);
                }
                if let Some(sound) = down_sound.as_deref() {
                    services.gameplay.play_3d(self.actor, sound, 1.0, 1.0, SoundMode::Normal);
                }
            }

            let equip_done = services
                .animation
                .info(&self.clips.weapon)
                .is_none_or(|info| info.complete >= 1.0);
            if equip_done {
                if weapon_type != self.weapon_type {
                    force = true;
                    self.play_equip(services.animation, &weapon_type, priority, still_weapon);
                    if !still_weapon {
                        if let Some(sound) = up_sound.as_deref() {
                            services.gameplay.play_3d(self.actor, sound, 1.0, 1.0, SoundMode::Normal);
                        }
                    }
                    debug!("actor {:?} switches to {:?}", self.actor, weapon_type.class);
                    self.clips.weapon = weapon_type.long_group.clone();
                    self.weapon_type = weapon_type;
                }

                if self.states.upper_body() == UpperBodyState::Unequipping {
                    self.transition(services.animation, Transition::UpperBody(UpperBodyState::Nothing));
                    services.animation.disable(&self.clips.weapon);
                    self.weapon_type = WeaponType::of_class(WeaponClass::None);
                    self.clips.weapon.clear();
                }
            }
        }

        // Without matching ammunition a ranged attack cannot continue.
        let mut ammunition = true;
        let mut weapon_speed = 1.0;
        let mut held_weapon = None;
        if state.has_inventory {
            if let Some(item) = state
                .equipment
                .right_hand
                .as_ref()
                .filter(|item| item.is_weapon() && state.stats.draw_state == DrawState::Weapon)
            {
                weapon_speed = item.speed;
                let classified = services.weapons.classify(item);
                if classified.ammo.is_some() && classified.ammo != state.equipment.ammo {
                    ammunition = false;
                }
                held_weapon = Some(item.damage);
            }
            if !ammunition && self.states.upper_body().is_attacking() {
                services.animation.disable(&self.clips.weapon);
                self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
            }
        }

        if self.is_persistent_anim_playing(services.animation) {
            return force;
        }

        let weapon_class = self.weapon_type.class;
        let random_group = is_random_attack_group(&self.clips.weapon);

        if state.intent.attacking {
            let mut reset_idle = ammunition;
            if self.states.upper_body() == UpperBodyState::WeaponEquipped
                && matches!(self.states.hit(), HitState::None | HitState::Block)
            {
                services.gameplay.break_invisibility(self.actor);
                self.attack_strength = 0.0;
                self.strike_pending = true;

                if state.kind.is_creature()
                    && !state.bipedal
                    && (!services.animation.has_animation(&self.clips.weapon) || random_group)
                {
                    self.clips.weapon = self.choose_random_attack_group(services, state);
                }
                let random_group = is_random_attack_group(&self.clips.weapon);

                match weapon_class {
                    WeaponClass::Spell => {
                        // Casting is one press, not a held button.
                        state.intent.attacking = false;
                        reset_idle = self.start_spell_cast(services, state, priority);
                    }
                    WeaponClass::PickProbe => {
                        if let Some(tool) = state.equipment.right_hand.as_ref() {
                            services.gameplay.use_security_tool(self.actor, tool);
                        }
                        services.animation.play(
                            PlayRequest::new(self.clips.weapon.clone(), priority)
                                .auto_disable(true),
                        );
                        self.transition(
                            services.animation,
                            Transition::UpperBody(UpperBodyState::FollowStartToFollowStop),
                        );
                    }
                    _ if ammunition => {
                        let (start, stop) = if weapon_class.is_ranged() {
                            self.attack_type = AttackType::Shoot;
                            (self.attack_key("start"), self.attack_key("min attack"))
                        } else if random_group {
                            ("start".to_owned(), "stop".to_owned())
                        } else {
                            self.attack_type = self.choose_attack_type(services, state, held_weapon);
                            (self.attack_key("start"), self.attack_key("min attack"))
                        };

                        services.animation.play(
                            PlayRequest::new(self.clips.weapon.clone(), priority)
                                .with_speed(weapon_speed)
                                .with_keys(start, stop),
                        );
                        if services.animation.current_time(&self.clips.weapon).is_some() {
                            self.transition(
                                services.animation,
                                Transition::UpperBody(UpperBodyState::StartToMinAttack),
                            );
                            if random_group {
                                self.transition(
                                    services.animation,
                                    Transition::UpperBody(UpperBodyState::MaxAttackToMinHit),
                                );
                                self.attack_strength = self.random_attack_strength(services);
                                self.play_swish(services, 0.0);
                            }
                            debug!("actor {:?} starts {:?} attack", self.actor, self.attack_type);
                        }
                    }
                    _ => {}
                }
            }

            // Swimming and sneaking idles cover the legs, keep them.
            let keeps_idle = |idle: IdleState| matches!(idle, IdleState::IdleSneak | IdleState::IdleSwim);
            if reset_idle && !keeps_idle(*idle) && !keeps_idle(self.states.idle()) {
                if !self.clips.idle.is_empty() {
                    services.animation.disable(&self.clips.idle);
                    self.clips.idle.clear();
                }
                self.transition(services.animation, Transition::Idle(IdleState::None));
                *idle = IdleState::None;
            }
        }

        let info = services.animation.info(&self.clips.weapon);
        let anim_playing = info.is_some();
        let mut complete = info.map_or(0.0, |info| info.complete);
        let knocked_down = self.states.hit().is_knocked_down();

        if self.states.upper_body() == UpperBodyState::MinAttackToMaxAttack && !knocked_down {
            let released = !state.intent.attacking || (!state.is_player && complete >= 1.0);
            if released {
                self.release_attack(services, state.is_player, priority, weapon_speed, complete);
                complete = 0.0;
            } else {
                self.attack_strength = complete;
            }
        } else if !state.intent.attacking && knocked_down {
            if self.states.upper_body().is_attacking() {
                self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
                if self.weapon_type.class.is_real_weapon() {
                    services.animation.show_weapons(true);
                }
            }
            services.animation.disable(&self.clips.weapon);
        }

        services
            .animation
            .set_pitch_factor(self.pitch_factor(weapon_class, complete, anim_playing));

        let upper_body = self.states.upper_body();
        if !anim_playing {
            match upper_body {
                UpperBodyState::Equipping | UpperBodyState::FollowStartToFollowStop | UpperBodyState::CastingSpell => {
                    if ammunition && self.weapon_type.is_crossbow() {
                        services.animation.attach_arrow();
                    }
                    self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
                }
                UpperBodyState::Unequipping => {
                    self.transition(services.animation, Transition::UpperBody(UpperBodyState::Nothing));
                }
                _ => {}
            }
        } else if complete >= 1.0 && !is_random_attack_group(&self.clips.weapon) {
            self.advance_attack_segment(services, state, priority, weapon_speed);
        } else if complete >= 1.0 {
            services.animation.disable(&self.clips.weapon);
            self.transition(services.animation, Transition::UpperBody(UpperBodyState::WeaponEquipped));
        }

        if state.has_inventory {
            let torch = state
                .equipment
                .left_hand
                .as_ref()
                .is_some_and(|item| item.kind == ItemKind::Light);
            if torch && self.weapon_type.carried_left_visible() {
                if !services.animation.is_playing("torch") {
                    services.animation.play(
                        PlayRequest::new("torch", Priority::Torch)
                            .with_mask(BlendMask::LEFT_ARM)
                            .with_loops(LOOP_FOREVER)
                            .with_loop_fallback(true),
                    );
                }
            } else if services.animation.is_playing("torch") {
                services.animation.disable("torch");
            }
        }

        services
            .animation
            .set_accurate_aiming(self.states.upper_body().is_attacking());
        force
    }

    fn play_unequip(&mut self, animation: &mut dyn AnimationSource, next: &WeaponType, priority: AnimPriority) {
        let group = self.weapon_type.long_group.clone();
        let mut mask = BlendMask::ALL;
        let shield = animation.use_shield_animations();
        let previous = self.weapon_type.class;
        if shield
            && !matches!(previous, WeaponClass::HandToHand | WeaponClass::Spell)
            && !(previous == WeaponClass::None && next.class == WeaponClass::Spell)
        {
            mask = BlendMask::ALL.difference(BlendMask::LEFT_ARM);
            animation.play(
                PlayRequest::new("shield", Priority::Block)
                    .with_mask(BlendMask::LEFT_ARM)
                    .auto_disable(true)
                    .with_keys("unequip start", "unequip stop"),
            );
        } else if previous == WeaponClass::HandToHand {
            animation.show_carried_left(false);
        }

        if !group.is_empty() {
            animation.play(
                PlayRequest::new(group.clone(), priority)
                    .with_mask(mask)
                    .with_keys("unequip start", "unequip stop"),
            );
        }
        self.transition(animation, Transition::UpperBody(UpperBodyState::Unequipping));
        animation.detach_arrow();

        // Hide by hand when the clip has no detach key to do it.
        if animation.text_key_time(&format!("{group}: unequip detach")).is_none() {
            animation.show_weapons(false);
        }
    }

    fn play_equip(&mut self, animation: &mut dyn AnimationSource, next: &WeaponType, priority: AnimPriority, still_weapon: bool) {
        let shield = animation.use_shield_animations();
        if !shield {
            animation.show_carried_left(next.carried_left_visible());
        }

        let group = next.long_group.clone();
        animation.set_weapon_group(&group, next.class == WeaponClass::Ranged);
        if still_weapon {
            return;
        }

        animation.disable(&self.clips.weapon);
        if next.class == WeaponClass::None {
            return;
        }

        animation.show_weapons(false);
        let mut mask = BlendMask::ALL;
        if shield && next.class != WeaponClass::Spell {
            mask = BlendMask::ALL.difference(BlendMask::LEFT_ARM);
            animation.play(
                PlayRequest::new("shield", Priority::Block)
                    .with_mask(BlendMask::LEFT_ARM)
                    .auto_disable(true)
                    .with_keys("equip start", "equip stop"),
            );
        }

        animation.play(
            PlayRequest::new(group.clone(), priority)
                .with_mask(mask)
                .auto_disable(true)
                .with_keys("equip start", "equip stop"),
        );
        self.transition(animation, Transition::UpperBody(UpperBodyState::Equipping));

        if next.class != WeaponClass::Spell && animation.text_key_time(&format!("{group}: equip attach")).is_none() {
            animation.show_weapons(true);
        }
    }

    /// Readies the selected spell or enchantment. Returns whether the idle
    /// clip should be dropped for the cast.
    fn start_spell_cast(&mut self, services: &mut Services<'_>, state: &ActorState, priority: AnimPriority) -> bool {
        let (spell, magic_item) = match (&state.equipment.selected_spell, &state.equipment.selected_enchantment) {
            (Some(spell), _) => (spell, false),
            (None, Some(enchantment)) => (enchantment, true),
            (None, None) => return false,
        };

        if magic_item && !services.config.use_magic_item_animations {
            services.gameplay.cast(self.actor, self.casting_manual);
            self.casting_manual = false;
            return false;
        }

        let can_cast = self.casting_manual
            || state.is_god()
            || services.gameplay.start_cast(self.actor, spell, &state.stats);
        if !can_cast {
            return false;
        }
        self.can_cast = true;

        services.gameplay.play_cast_effects(self.actor, &spell.id, magic_item);
        let (start, stop) = if is_random_attack_group(&self.clips.weapon) {
            // No release key to wait for.
            services.gameplay.cast(self.actor, self.casting_manual);
            self.casting_manual = false;
            ("start".to_owned(), "stop".to_owned())
        } else {
            self.cast_range = spell.range;
            let range = spell.range.as_str();
            (format!("{range} start"), format!("{range} stop"))
        };

        services.animation.play(
            PlayRequest::new(self.clips.weapon.clone(), priority)
                .auto_disable(true)
                .with_keys(start, stop),
        );
        self.transition(services.animation, Transition::UpperBody(UpperBodyState::CastingSpell));
        debug!("actor {:?} casts {}", self.actor, spell.id);
        true
    }

    fn choose_attack_type(
        &self,
        services: &mut Services<'_>,
        state: &ActorState,
        held_weapon: Option<AttackDamage>,
    ) -> AttackType {
        if !state.is_player {
            return state.intent.attack_type.unwrap_or(self.attack_type);
        }
        if !services.config.best_attack {
            return AttackType::from_movement(state.intent.movement);
        }
        match held_weapon {
            Some(damage) => AttackType::best_for(&damage),
            // Fists have no best attack.
            None => AttackType::random(services.rng),
        }
    }

    fn release_attack(
        &mut self,
        services: &mut Services<'_>,
        is_player: bool,
        priority: AnimPriority,
        weapon_speed: f32,
        complete: f32,
    ) {
        // Only a player's held wind-up sets the strength.
        let strength = if is_player && self.has_wind_up(services.animation) {
            complete
        } else {
            self.random_attack_strength(services)
        };
        if !self.weapon_type.class.is_ranged() {
            self.play_swish(services, strength);
        }
        self.attack_strength = strength;

        services.animation.disable(&self.clips.weapon);
        services.animation.play(
            PlayRequest::new(self.clips.weapon.clone(), priority)
                .with_speed(weapon_speed)
                .with_keys(self.attack_key("max attack"), self.attack_key("min hit"))
                .starting_at(1.0 - complete),
        );
        self.transition(services.animation, Transition::UpperBody(UpperBodyState::MaxAttackToMinHit));
        debug!("actor {:?} releases attack at strength {strength}", self.actor);
    }

    /// Moves to the next authored segment once the current one completed.
    fn advance_attack_segment(
        &mut self,
        services: &mut Services<'_>,
        state: &ActorState,
        priority: AnimPriority,
        weapon_speed: f32,
    ) {
        let shoot = self.attack_type == AttackType::Shoot;
        let mut segment = None;
        match self.states.upper_body() {
            UpperBodyState::MinAttackToMaxAttack => {
                // Hold the fully drawn pose.
                if !services.animation.is_playing(&self.clips.weapon) {
                    services.animation.play(
                        PlayRequest::new(self.clips.weapon.clone(), priority)
                            .with_speed(0.0)
                            .with_keys(self.attack_key("min attack"), self.attack_key("max attack"))
                            .starting_at(0.999),
                    );
                }
            }
            UpperBodyState::StartToMinAttack if state.intent.attacking || !self.has_wind_up(services.animation) => {
                segment = Some((
                    UpperBodyState::MinAttackToMaxAttack,
                    self.attack_key("min attack"),
                    self.attack_key("max attack"),
                ));
            }
            UpperBodyState::StartToMinAttack | UpperBodyState::MaxAttackToMinHit => {
                // Button let go before the wind-up started: a weak swing.
                if self.states.upper_body() == UpperBodyState::StartToMinAttack && !self.weapon_type.class.is_ranged() {
                    self.play_swish(services, 0.0);
                }
                let stop = if shoot { "release" } else { "hit" };
                segment = Some((UpperBodyState::MinHitToHit, self.attack_key("min hit"), self.attack_key(stop)));
            }
            UpperBodyState::MinHitToHit => {
                let size = if shoot {
                    ""
                } else if self.attack_strength < 0.5 {
                    "small "
                } else if self.attack_strength < 1.0 {
                    "medium "
                } else {
                    "large "
                };
                segment = Some((
                    UpperBodyState::FollowStartToFollowStop,
                    self.attack_key(&format!("{size}follow start")),
                    self.attack_key(&format!("{size}follow stop")),
                ));
            }
            _ => {}
        }

        let Some((next, start, stop)) = segment else {
            return;
        };
        self.transition(services.animation, Transition::UpperBody(next));
        // Follow-through only on the upper body, it reads badly blended with walking.
        let follow = next == UpperBodyState::FollowStartToFollowStop;
        let mask = if follow { BlendMask::UPPER_BODY } else { BlendMask::ALL };
        services.animation.disable(&self.clips.weapon);
        services.animation.play(
            PlayRequest::new(self.clips.weapon.clone(), priority)
                .with_mask(mask)
                .auto_disable(follow)
                .with_speed(weapon_speed)
                .with_keys(start, stop),
        );
    }

    fn pitch_factor(&self, weapon_class: WeaponClass, complete: f32, anim_playing: bool) -> f32 {
        if !weapon_class.is_ranged() {
            return 0.0;
        }
        match self.states.upper_body() {
            UpperBodyState::StartToMinAttack => complete,
            UpperBodyState::MinAttackToMaxAttack | UpperBodyState::MaxAttackToMinHit | UpperBodyState::MinHitToHit => 1.0,
            UpperBodyState::FollowStartToFollowStop if anim_playing => {
                if self.weapon_type.is_crossbow() {
                    (1.0 - complete * 10.0).max(0.0)
                } else {
                    1.0 - complete
                }
            }
            _ => 0.0,
        }
    }

    /// Simplified weapon layer of creatures without hands or inventory: one
    /// random attack clip per press.
    pub(super) fn update_creature_state(&mut self, services: &mut Services<'_>, state: &mut ActorState) -> bool {
        let class = match state.stats.draw_state {
            DrawState::Weapon => WeaponClass::HandToHand,
            DrawState::Spell => WeaponClass::Spell,
            DrawState::Nothing => WeaponClass::None,
        };
        if class != self.weapon_type.class {
            self.weapon_type = WeaponType::of_class(class);
            if services.animation.is_playing(&self.clips.weapon) {
                services.animation.disable(&self.clips.weapon);
            }
        }

        if state.intent.attacking {
            if self.states.upper_body() == UpperBodyState::Nothing && self.states.hit() == HitState::None {
                services.gameplay.break_invisibility(self.actor);
                let mut start = "start".to_owned();
                let mut stop = "stop".to_owned();
                let has_spellcast = services.animation.has_animation("spellcast");

                if class == WeaponClass::Spell {
                    self.clips.weapon.clear();
                    if let Some(spell) = state.equipment.selected_spell.as_ref() {
                        let can_cast =
                            self.casting_manual || services.gameplay.start_cast(self.actor, spell, &state.stats);
                        if can_cast {
                            services.gameplay.play_cast_effects(self.actor, &spell.id, false);
                            if has_spellcast {
                                self.can_cast = true;
                                self.cast_range = spell.range;
                                start = format!("{} start", spell.range.as_str());
                                stop = format!("{} stop", spell.range.as_str());
                                self.clips.weapon = "spellcast".to_owned();
                            } else {
                                services.gameplay.cast(self.actor, self.casting_manual);
                                self.casting_manual = false;
                            }
                        }
                    }
                }
                // Not every creature has a dedicated cast clip.
                if class != WeaponClass::Spell || !has_spellcast {
                    self.clips.weapon = self.choose_random_attack_group(services, state);
                }

                if !self.clips.weapon.is_empty() {
                    services.animation.play(
                        PlayRequest::new(self.clips.weapon.clone(), Priority::Weapon)
                            .auto_disable(true)
                            .with_keys(start, stop),
                    );
                    self.transition(services.animation, Transition::UpperBody(UpperBodyState::StartToMinAttack));
                    self.attack_strength = self.random_attack_strength(services);
                    self.strike_pending = true;
                    if class == WeaponClass::HandToHand {
                        self.play_swish(services, 0.0);
                    }
                }
            }
            state.intent.attacking = false;
        }

        if services.animation.info(&self.clips.weapon).is_none() {
            self.transition(services.animation, Transition::UpperBody(UpperBodyState::Nothing));
        }
        false
    }

    fn choose_random_attack_group(&self, services: &mut Services<'_>, state: &ActorState) -> String {
        if state.surroundings.swimming {
            let (group, _) = choose_random_group(services.animation, services.rng, "swimattack", 3);
            if services.animation.has_animation(&group) {
                return group;
            }
        }
        choose_random_group(services.animation, services.rng, "attack", 3).0
    }

    /// The clip authors a real wind-up between `min attack` and `max attack`.
    pub(super) fn has_wind_up(&self, animation: &dyn AnimationSource) -> bool {
        let weapon = &self.clips.weapon;
        let min = animation.text_key_time(&format!("{weapon}: {}", self.attack_key("min attack")));
        let max = animation.text_key_time(&format!("{weapon}: {}", self.attack_key("max attack")));
        min != max
    }

    fn random_attack_strength(&self, services: &mut Services<'_>) -> f32 {
        (services.config.min_attack_strength + services.rng.gen_range(0.0..=1.0)).min(1.0)
    }

    fn play_swish(&self, services: &mut Services<'_>, strength: f32) {
        let pitch = if strength < 0.5 {
            0.8
        } else if strength < 1.0 {
            1.0
        } else {
            1.2
        };
        services
            .gameplay
            .play_3d(self.actor, &services.config.swish_sound, 1.0, pitch, SoundMode::Normal);
    }

    fn attack_key(&self, suffix: &str) -> String {
        format!("{} {suffix}", self.attack_type.as_str())
    }
}
