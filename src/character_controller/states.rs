//! The concurrently active sub-states of a character and the rules that
//! keep them consistent with each other.
//!
//! Every change goes through [`CharacterStates::apply`], which reports the
//! other machines it forced back to neutral so the caller can stop their clips.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdleState {
    #[default]
    None,
    /// A scripted animation owns the idle slot.
    Special,
    Idle,
    IdleSwim,
    IdleSneak,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MovementState {
    #[default]
    None,
    WalkForward,
    WalkBack,
    WalkLeft,
    WalkRight,
    RunForward,
    RunBack,
    RunLeft,
    RunRight,
    SneakForward,
    SneakBack,
    SneakLeft,
    SneakRight,
    SwimWalkForward,
    SwimWalkBack,
    SwimWalkLeft,
    SwimWalkRight,
    SwimRunForward,
    SwimRunBack,
    SwimRunLeft,
    SwimRunRight,
    TurnLeft,
    TurnRight,
    SwimTurnLeft,
    SwimTurnRight,
}

impl MovementState {
    /// Base clip group, without any weapon suffix.
    pub fn group(self) -> Option<&'static str> {
        use MovementState::*;
        Some(match self {
            None => return Option::None,
            WalkForward => "walkforward",
            WalkBack => "walkback",
            WalkLeft => "walkleft",
            WalkRight => "walkright",
            RunForward => "runforward",
            RunBack => "runback",
            RunLeft => "runleft",
            RunRight => "runright",
            SneakForward => "sneakforward",
            SneakBack => "sneakback",
            SneakLeft => "sneakleft",
            SneakRight => "sneakright",
            SwimWalkForward => "swimwalkforward",
            SwimWalkBack => "swimwalkback",
            SwimWalkLeft => "swimwalkleft",
            SwimWalkRight => "swimwalkright",
            SwimRunForward => "swimrunforward",
            SwimRunBack => "swimrunback",
            SwimRunLeft => "swimrunleft",
            SwimRunRight => "swimrunright",
            TurnLeft => "turnleft",
            TurnRight => "turnright",
            SwimTurnLeft => "swimturnleft",
            SwimTurnRight => "swimturnright",
        })
    }

    pub fn is_turning(self) -> bool {
        use MovementState::*;
        matches!(self, TurnLeft | TurnRight | SwimTurnLeft | SwimTurnRight)
    }

    pub fn is_running(self) -> bool {
        use MovementState::*;
        matches!(
            self,
            RunForward | RunBack | RunLeft | RunRight | SwimRunForward | SwimRunBack | SwimRunLeft | SwimRunRight
        )
    }

    pub fn is_sneaking(self) -> bool {
        use MovementState::*;
        matches!(self, SneakForward | SneakBack | SneakLeft | SneakRight)
    }

    /// The walking counterpart of a running state. Other states map to themselves.
    pub fn to_walk(self) -> Self {
        use MovementState::*;
        match self {
            RunForward => WalkForward,
            RunBack => WalkBack,
            RunLeft => WalkLeft,
            RunRight => WalkRight,
            SwimRunForward => SwimWalkForward,
            SwimRunBack => SwimWalkBack,
            SwimRunLeft => SwimWalkLeft,
            SwimRunRight => SwimWalkRight,
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JumpState {
    #[default]
    None,
    InAir,
    Landing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HitState {
    #[default]
    None,
    Hit,
    SwimHit,
    KnockDown,
    SwimKnockDown,
    KnockOut,
    SwimKnockOut,
    Block,
}

impl HitState {
    pub fn is_knocked_down(self) -> bool {
        matches!(self, Self::KnockDown | Self::SwimKnockDown)
    }

    pub fn is_knocked_out(self) -> bool {
        matches!(self, Self::KnockOut | Self::SwimKnockOut)
    }

    pub fn is_recovery(self) -> bool {
        matches!(self, Self::Hit | Self::SwimHit)
    }
}

/// Weapon and cast sequencing. Ordered: everything past `WeaponEquipped` is an
/// attack or cast in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpperBodyState {
    #[default]
    Nothing,
    Equipping,
    Unequipping,
    WeaponEquipped,
    StartToMinAttack,
    MinAttackToMaxAttack,
    MaxAttackToMinHit,
    MinHitToHit,
    FollowStartToFollowStop,
    CastingSpell,
}

impl UpperBodyState {
    pub fn is_attacking(self) -> bool {
        self > Self::WeaponEquipped
    }

    pub fn is_changing_weapon(self) -> bool {
        matches!(self, Self::Equipping | Self::Unequipping)
    }
}

/// Number of `death<N>` groups an actor may have.
pub const DEATH_GROUP_COUNT: u8 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeathState {
    #[default]
    None,
    /// `death1` ..= `death5`.
    Death(u8),
    SwimDeath,
    SwimDeathKnockDown,
    SwimDeathKnockOut,
    DeathKnockDown,
    DeathKnockOut,
}

impl DeathState {
    pub fn group(self) -> Option<String> {
        Some(match self {
            Self::None => return None,
            Self::Death(n) => format!("death{n}"),
            Self::SwimDeath => "swimdeath".to_owned(),
            Self::SwimDeathKnockDown => "swimdeathknockdown".to_owned(),
            Self::SwimDeathKnockOut => "swimdeathknockout".to_owned(),
            Self::DeathKnockDown => "deathknockdown".to_owned(),
            Self::DeathKnockOut => "deathknockout".to_owned(),
        })
    }

    /// Index stored on the actor's stats: `death1..5` are 0..=4, then the
    /// swim and knockdown variants.
    pub fn index(self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::Death(n) => Some(n.saturating_sub(1)),
            Self::SwimDeath => Some(5),
            Self::SwimDeathKnockDown => Some(6),
            Self::SwimDeathKnockOut => Some(7),
            Self::DeathKnockDown => Some(8),
            Self::DeathKnockOut => Some(9),
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0..=4 => Some(Self::Death(index + 1)),
            5 => Some(Self::SwimDeath),
            6 => Some(Self::SwimDeathKnockDown),
            7 => Some(Self::SwimDeathKnockOut),
            8 => Some(Self::DeathKnockDown),
            9 => Some(Self::DeathKnockOut),
            _ => None,
        }
    }
}

/// A requested change of one sub-machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Idle(IdleState),
    Movement(MovementState),
    Jump(JumpState),
    Hit(HitState),
    UpperBody(UpperBodyState),
    Death(DeathState),
    Resurrect,
}

/// Machines a transition forced back to neutral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resets {
    pub idle: bool,
    pub movement: bool,
    pub jump: bool,
    pub hit: bool,
    pub upper_body: bool,
}

impl Resets {
    const ALL: Self = Self {
        idle: true,
        movement: true,
        jump: true,
        hit: true,
        upper_body: true,
    };

    pub fn any(self) -> bool {
        self.idle || self.movement || self.jump || self.hit || self.upper_body
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CharacterStates {
    idle: IdleState,
    movement: MovementState,
    jump: JumpState,
    hit: HitState,
    upper_body: UpperBodyState,
    death: DeathState,
}

impl CharacterStates {
    pub fn idle(&self) -> IdleState {
        self.idle
    }

    pub fn movement(&self) -> MovementState {
        self.movement
    }

    pub fn jump(&self) -> JumpState {
        self.jump
    }

    pub fn hit(&self) -> HitState {
        self.hit
    }

    pub fn upper_body(&self) -> UpperBodyState {
        self.upper_body
    }

    pub fn death(&self) -> DeathState {
        self.death
    }

    pub fn is_dead(&self) -> bool {
        self.death != DeathState::None
    }

    /// Applies `transition` and returns the machines it reset.
    ///
    /// While dead only another death variant or resurrection is accepted;
    /// anything else is ignored.
    pub fn apply(&mut self, transition: Transition) -> Resets {
        if self.is_dead() && !matches!(transition, Transition::Death(_) | Transition::Resurrect) {
            return Resets::default();
        }

        match transition {
            Transition::Idle(state) => self.idle = state,
            Transition::Movement(state) => self.movement = state,
            Transition::Jump(state) => self.jump = state,
            Transition::UpperBody(state) => self.upper_body = state,
            Transition::Hit(state) => return self.enter_hit(state),
            Transition::Death(DeathState::None) | Transition::Resurrect => self.death = DeathState::None,
            Transition::Death(state) => {
                *self = Self {
                    death: state,
                    ..Self::default()
                };
                return Resets::ALL;
            }
        }
        Resets::default()
    }

    fn enter_hit(&mut self, state: HitState) -> Resets {
        self.hit = state;
        let mut resets = Resets::default();
        if state == HitState::None {
            return resets;
        }

        if self.idle != IdleState::None {
            self.idle = IdleState::None;
            resets.idle = true;
        }

        if state.is_knocked_down() || state.is_knocked_out() {
            if self.upper_body.is_attacking() {
                self.upper_body = UpperBodyState::WeaponEquipped;
                resets.upper_body = true;
            } else if self.upper_body.is_changing_weapon() {
                self.upper_body = UpperBodyState::Nothing;
                resets.upper_body = true;
            }
        }
        resets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attacking() -> CharacterStates {
        let mut states = CharacterStates::default();
        states.apply(Transition::Idle(IdleState::Idle));
        states.apply(Transition::UpperBody(UpperBodyState::MinAttackToMaxAttack));
        states
    }

    #[test]
    fn plain_hit_keeps_the_attack() {
        let mut states = attacking();
        let resets = states.apply(Transition::Hit(HitState::Hit));
        assert!(resets.idle);
        assert!(!resets.upper_body);
        assert_eq!(states.idle(), IdleState::None);
        assert_eq!(states.upper_body(), UpperBodyState::MinAttackToMaxAttack);
    }

    #[test]
    fn knockdown_collapses_attack_to_equipped() {
        let mut states = attacking();
        let resets = states.apply(Transition::Hit(HitState::KnockDown));
        assert!(resets.upper_body);
        assert_eq!(states.upper_body(), UpperBodyState::WeaponEquipped);
    }

    #[test]
    fn knockout_drops_half_finished_equip() {
        let mut states = CharacterStates::default();
        states.apply(Transition::UpperBody(UpperBodyState::Equipping));
        let resets = states.apply(Transition::Hit(HitState::SwimKnockOut));
        assert!(resets.upper_body);
        assert!(!resets.idle, "idle was already neutral");
        assert_eq!(states.upper_body(), UpperBodyState::Nothing);
    }

    #[test]
    fn death_resets_everything_and_absorbs() {
        let mut states = attacking();
        states.apply(Transition::Movement(MovementState::RunForward));
        states.apply(Transition::Jump(JumpState::InAir));

        let resets = states.apply(Transition::Death(DeathState::Death(2)));
        assert_eq!(resets, Resets::ALL);
        assert_eq!(states.movement(), MovementState::None);
        assert_eq!(states.jump(), JumpState::None);
        assert_eq!(states.upper_body(), UpperBodyState::Nothing);

        for transition in [
            Transition::Movement(MovementState::WalkForward),
            Transition::Jump(JumpState::InAir),
            Transition::Hit(HitState::KnockDown),
            Transition::Idle(IdleState::Idle),
            Transition::UpperBody(UpperBodyState::WeaponEquipped),
        ] {
            assert!(!states.apply(transition).any());
        }
        assert_eq!(states.movement(), MovementState::None);
        assert_eq!(states.hit(), HitState::None);
        assert_eq!(states.death(), DeathState::Death(2));

        states.apply(Transition::Resurrect);
        states.apply(Transition::Movement(MovementState::WalkForward));
        assert_eq!(states.movement(), MovementState::WalkForward);
    }

    #[test]
    fn death_index_round_trips() {
        for index in 0..10 {
            let state = DeathState::from_index(index);
            assert!(state.is_some(), "index {index} should map to a death state");
            assert_eq!(state.and_then(DeathState::index), Some(index));
        }
        assert_eq!(DeathState::from_index(10), None);
        assert_eq!(DeathState::Death(3).group().as_deref(), Some("death3"));
    }

    #[test]
    fn run_states_walk_counterpart() {
        assert_eq!(MovementState::RunLeft.to_walk(), MovementState::WalkLeft);
        assert_eq!(MovementState::SwimRunBack.to_walk(), MovementState::SwimWalkBack);
        assert_eq!(MovementState::TurnLeft.to_walk(), MovementState::TurnLeft);
    }
}
