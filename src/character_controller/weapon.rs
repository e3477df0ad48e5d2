use bevy::math::Vec3;
use bevy::prelude::Resource;
use rand::{Rng, RngCore};

use super::services::WeaponClassifier;

/// Broad weapon families. Each maps to a fixed pair of clip groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WeaponClass {
    #[default]
    None,
    HandToHand,
    Melee1H,
    Melee2H,
    Ranged,
    Thrown,
    Spell,
    PickProbe,
}

impl WeaponClass {
    /// An actual item held in the right hand rather than fists, a spell or nothing.
    pub fn is_real_weapon(self) -> bool {
        !matches!(self, Self::None | Self::HandToHand | Self::Spell)
    }

    pub fn is_ranged(self) -> bool {
        matches!(self, Self::Ranged | Self::Thrown)
    }

    /// Classes that swap into each other without an unequip/equip pass.
    pub fn swaps_in_place(self) -> bool {
        matches!(self, Self::Melee1H | Self::Melee2H | Self::Ranged)
    }

    /// (short group suffix, long group) for this class.
    fn groups(self) -> (&'static str, &'static str) {
        match self {
            Self::None => ("", ""),
            Self::HandToHand => ("hh", "handtohand"),
            Self::Melee1H => ("1h", "weapononehand"),
            Self::Melee2H => ("2c", "weapontwohand"),
            Self::Ranged => ("bow", "bowandarrow"),
            Self::Thrown => ("1t", "throwweapon"),
            Self::Spell => ("spell", "spellcast"),
            Self::PickProbe => ("1h", "pickprobe"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AmmoType {
    Arrow,
    Bolt,
}

/// Clip groups and flags of the weapon an actor holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeaponType {
    pub class: WeaponClass,
    /// Suffix appended to movement, idle and jump groups, e.g. `"1h"`.
    pub short_group: String,
    /// Group holding the equip/attack/unequip clips, e.g. `"weapononehand"`.
    pub long_group: String,
    pub ammo: Option<AmmoType>,
    pub two_handed: bool,
}

impl WeaponType {
    pub fn of_class(class: WeaponClass) -> Self {
        let (short, long) = class.groups();
        Self {
            class,
            short_group: short.to_owned(),
            long_group: long.to_owned(),
            ammo: (class == WeaponClass::Ranged).then_some(AmmoType::Arrow),
            two_handed: matches!(class, WeaponClass::Melee2H | WeaponClass::Ranged),
        }
    }

    pub fn crossbow() -> Self {
        Self {
            class: WeaponClass::Ranged,
            short_group: "crossbow".to_owned(),
            long_group: "crossbow".to_owned(),
            ammo: Some(AmmoType::Bolt),
            two_handed: true,
        }
    }

    /// Spears and other two-handed weapons held wide.
    pub fn two_wide() -> Self {
        Self {
            class: WeaponClass::Melee2H,
            short_group: "2w".to_owned(),
            long_group: "weapontwowide".to_owned(),
            ammo: None,
            two_handed: true,
        }
    }

    pub fn is_crossbow(&self) -> bool {
        self.class == WeaponClass::Ranged && self.ammo == Some(AmmoType::Bolt)
    }

    /// Shields and torches stay hidden while both hands are busy.
    pub fn carried_left_visible(&self) -> bool {
        !(self.class == WeaponClass::Spell || self.class.is_ranged() || self.two_handed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttackType {
    #[default]
    Chop,
    Slash,
    Thrust,
    Shoot,
}

impl AttackType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chop => "chop",
            Self::Slash => "slash",
            Self::Thrust => "thrust",
            Self::Shoot => "shoot",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "chop" => Some(Self::Chop),
            "slash" => Some(Self::Slash),
            "thrust" => Some(Self::Thrust),
            "shoot" => Some(Self::Shoot),
            _ => None,
        }
    }

    /// Melee attack chosen from the direction the player is pushing.
    pub fn from_movement(movement: Vec3) -> Self {
        if movement.y != 0.0 && movement.x == 0.0 {
            Self::Thrust
        } else if movement.x != 0.0 && movement.y == 0.0 {
            Self::Slash
        } else {
            Self::Chop
        }
    }

    /// Melee attack with the highest average damage. Ties prefer thrust, then slash.
    pub fn best_for(damage: &AttackDamage) -> Self {
        let chop = damage.chop.average();
        let slash = damage.slash.average();
        let thrust = damage.thrust.average();

        if chop == slash && slash == thrust {
            Self::Slash
        } else if thrust >= chop && thrust >= slash {
            Self::Thrust
        } else if slash >= chop && slash >= thrust {
            Self::Slash
        } else {
            Self::Chop
        }
    }

    pub fn random(rng: &mut dyn RngCore) -> Self {
        let roll: f32 = rng.gen_range(0.0..1.0);
        if roll >= 2.0 / 3.0 {
            Self::Thrust
        } else if roll >= 1.0 / 3.0 {
            Self::Slash
        } else {
            Self::Chop
        }
    }
}

/// Area a spell's first effect targets. Names the cast clip segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpellRange {
    #[default]
    OnSelf,
    Touch,
    Target,
}

impl SpellRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnSelf => "self",
            Self::Touch => "touch",
            Self::Target => "target",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "self" => Some(Self::OnSelf),
            "touch" => Some(Self::Touch),
            "target" => Some(Self::Target),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageRange {
    pub min: f32,
    pub max: f32,
}

impl DamageRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn average(self) -> f32 {
        (self.min + self.max) / 2.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttackDamage {
    pub chop: DamageRange,
    pub slash: DamageRange,
    pub thrust: DamageRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    Weapon(WeaponType),
    Lockpick,
    Probe,
    Light,
    Shield,
    Other,
}

/// An inventory item as far as animation cares about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub id: String,
    pub kind: ItemKind,
    /// Weapon speed stat, scales attack clip playback.
    pub speed: f32,
    pub damage: AttackDamage,
    pub up_sound: Option<String>,
    pub down_sound: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
            speed: 1.0,
            damage: AttackDamage::default(),
            up_sound: None,
            down_sound: None,
        }
    }

    pub fn weapon(id: impl Into<String>, weapon: WeaponType) -> Self {
        Self::new(id, ItemKind::Weapon(weapon))
    }

    pub fn with_sounds(mut self, up: impl Into<String>, down: impl Into<String>) -> Self {
        self.up_sound = Some(up.into());
        self.down_sound = Some(down.into());
        self
    }

    pub fn is_weapon(&self) -> bool {
        matches!(self.kind, ItemKind::Weapon(_))
    }
}

/// Classifier reading the descriptor straight off the item. Lockpicks and
/// probes use the pick/probe groups; anything else held counts as fists.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct StandardWeapons;

impl WeaponClassifier for StandardWeapons {
    fn classify(&self, item: &Item) -> WeaponType {
        match &item.kind {
            ItemKind::Weapon(weapon) => weapon.clone(),
            ItemKind::Lockpick | ItemKind::Probe => WeaponType::of_class(WeaponClass::PickProbe),
            _ => WeaponType::of_class(WeaponClass::HandToHand),
        }
    }
}
