pub mod character_controller;

pub use character_controller::actor::{
    ActorIntent, ActorKind, ActorState, CreatureStats, DrawState, DynamicStat, Equipment, SpellInfo, Surroundings,
};
pub use character_controller::components::{
    AnimationDriver, CharacterAnimation, CharacterBody, Grounded, MaxSlopeAngle, Player, SavedAnimation, SoundGens,
};
pub use character_controller::config::ControllerConfig;
pub use character_controller::controller::{CharacterController, KillResult, MovementOutput};
pub use character_controller::persist::{AnimationRecord, PersistError, ScriptedAnimation};
pub use character_controller::queue::{AnimationQueue, PlayMode, QueuedAnimation};
pub use character_controller::services::{
    AnimInfo, AnimPriority, AnimationSource, AnimationStep, BlendMask, BoneGroup, FiredTextKey, Gameplay, GuiService,
    HitResolver, LOOP_FOREVER, PlayRequest, Priority, ProjectileLauncher, Services, SoundMode, SoundService,
    SpellResolver, TextKey, WeaponClassifier,
};
pub use character_controller::states::{
    CharacterStates, DeathState, HitState, IdleState, JumpState, MovementState, Resets, Transition, UpperBodyState,
};
pub use character_controller::weapon::{
    AmmoType, AttackDamage, AttackType, DamageRange, Item, ItemKind, SpellRange, StandardWeapons, WeaponClass,
    WeaponType,
};
pub use character_controller::{CharacterAnimationPlugin, CharacterEvent, ControllerRng, EventSink};
