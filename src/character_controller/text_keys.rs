//! Text keys authored into clips, parsed once into [`TextKeyEvent`] and turned
//! into gameplay side effects.

use bevy::log::debug;

use super::controller::{CharacterController, is_random_attack_group};
use super::services::{FiredTextKey, Services, SoundMode};
use super::weapon::{AttackType, SpellRange};

/// What a key on a group asks for, with the `<group>: ` prefix removed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
    EquipAttach,
    UnequipDetach,
    /// `chop hit`, `slash hit`, `thrust hit` or a bare `hit`.
    Hit(Option<AttackType>),
    Start,
    Stop,
    ShootAttach,
    ShootRelease,
    ShootFollowAttach,
    /// `self release`, `touch release` or `target release`.
    Release(SpellRange),
    BlockHit,
    Loot,
    Other,
}

impl KeyAction {
    pub fn parse(key: &str) -> Self {
        match key {
            "equip attach" => Self::EquipAttach,
            "unequip detach" => Self::UnequipDetach,
            "hit" => Self::Hit(None),
            "start" => Self::Start,
            "stop" => Self::Stop,
            "shoot attach" => Self::ShootAttach,
            "shoot release" => Self::ShootRelease,
            "shoot follow attach" => Self::ShootFollowAttach,
            "block hit" => Self::BlockHit,
            "loot" => Self::Loot,
            _ => {
                if let Some(attack) = key.strip_suffix(" hit").and_then(AttackType::parse) {
                    if attack != AttackType::Shoot {
                        return Self::Hit(Some(attack));
                    }
                }
                match key.strip_suffix(" release").and_then(SpellRange::parse) {
                    Some(range) => Self::Release(range),
                    None => Self::Other,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextKeyEvent<'a> {
    Sound(&'a str),
    SoundGen { name: &'a str, volume: f32, pitch: f32 },
    Action(KeyAction),
    /// Belongs to another group sharing the timeline.
    Foreign,
}

impl<'a> TextKeyEvent<'a> {
    /// Parses `text` as crossed while playing `group`.
    pub fn parse(group: &str, text: &'a str) -> Self {
        if let Some(sound) = text.strip_prefix("sound: ") {
            return Self::Sound(sound);
        }
        if let Some(rest) = text.strip_prefix("soundgen: ") {
            let mut tokens = rest.split(' ');
            let name = tokens.next().unwrap_or_default();
            let volume = tokens.next().and_then(|v| v.parse().ok()).unwrap_or(1.0);
            let pitch = tokens.next().and_then(|p| p.parse().ok()).unwrap_or(1.0);
            return Self::SoundGen { name, volume, pitch };
        }
        match text.strip_prefix(group).and_then(|rest| rest.strip_prefix(": ")) {
            Some(key) => Self::Action(KeyAction::parse(key)),
            None => Self::Foreign,
        }
    }
}

/// Damage type implied by a creature attack group when its key names none.
fn attack_of_group(group: &str) -> Option<AttackType> {
    match group.strip_prefix("swim").unwrap_or(group) {
        "attack1" => Some(AttackType::Chop),
        "attack2" => Some(AttackType::Slash),
        "attack3" => Some(AttackType::Thrust),
        _ => None,
    }
}

impl CharacterController {
    pub(super) fn handle_text_key(&mut self, services: &mut Services<'_>, key: &FiredTextKey) {
        let group = key.group.as_str();
        let action = match TextKeyEvent::parse(group, &key.text) {
            TextKeyEvent::Sound(sound) => {
                services.gameplay.play_3d(self.actor, sound, 1.0, 1.0, SoundMode::Normal);
                return;
            }
            TextKeyEvent::SoundGen { name, volume, pitch } => {
                if let Some(sound) = services.gameplay.sound_for_gen(self.actor, name) {
                    let mode = if matches!(name, "left" | "right") {
                        SoundMode::NoPlayerLocal
                    } else {
                        SoundMode::Normal
                    };
                    services.gameplay.play_3d(self.actor, &sound, volume, pitch, mode);
                }
                return;
            }
            TextKeyEvent::Foreign => return,
            TextKeyEvent::Action(action) => action,
        };

        let animation = &mut *services.animation;
        match action {
            KeyAction::EquipAttach if group == "shield" => animation.show_carried_left(true),
            KeyAction::UnequipDetach if group == "shield" => animation.show_carried_left(false),
            KeyAction::EquipAttach => animation.show_weapons(true),
            KeyAction::UnequipDetach => animation.show_weapons(false),
            KeyAction::Hit(attack) => {
                let attack = attack.or_else(|| attack_of_group(group)).unwrap_or(self.attack_type);
                self.strike(services, attack);
            }
            KeyAction::Start if is_random_attack_group(group) => {
                // Clips without a hit key strike on their start key.
                let hit_key = format!("{group}: hit");
                let stop_key = format!("{group}: stop");
                let has_hit_key = animation
                    .text_keys(group)
                    .iter()
                    .skip(key.index)
                    .map(|text_key| text_key.text.as_str())
                    .take_while(|text| *text != stop_key)
                    .any(|text| text == hit_key);
                if !has_hit_key {
                    if let Some(attack) = attack_of_group(group) {
                        self.strike(services, attack);
                    }
                }
            }
            KeyAction::ShootAttach | KeyAction::ShootFollowAttach => animation.attach_arrow(),
            KeyAction::ShootRelease => {
                animation.detach_arrow();
                services.gameplay.launch(self.actor, self.attack_strength);
            }
            KeyAction::Release(range) if group == "spellcast" && range == self.cast_range => {
                if self.can_cast {
                    services.gameplay.cast(self.actor, self.casting_manual);
                    debug!("actor {:?} releases {} spell", self.actor, range.as_str());
                }
                self.casting_manual = false;
                self.can_cast = false;
            }
            KeyAction::BlockHit if group == "shield" => services.gameplay.block(self.actor),
            KeyAction::Loot if group == "containeropen" => services.gameplay.open_loot(self.actor),
            _ => {}
        }
    }

    /// Resolves the pending strike of the current attack. Later hit keys of
    /// the same attack, e.g. on follow clips, do nothing.
    fn strike(&mut self, services: &mut Services<'_>, attack: AttackType) {
        if !self.strike_pending {
            return;
        }
        self.strike_pending = false;
        services.gameplay.hit(self.actor, self.attack_strength, attack);
        debug!(
            "actor {:?} hits with {:?} at strength {}",
            self.actor, attack, self.attack_strength
        );
    }

    /// Makes the next cast bypass the magicka check, e.g. for a scripted cast.
    pub fn cast_manually(&mut self) {
        self.casting_manual = true;
    }
}
