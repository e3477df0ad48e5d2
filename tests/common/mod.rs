#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use bevy::math::Vec3;
use bevy::prelude::Entity;
use character_anim::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// A clip: text keys sorted by time and the root-motion speed of its
/// movement segment.
#[derive(Clone, Debug, Default)]
pub struct Clip {
    pub keys: Vec<TextKey>,
    pub velocity: f32,
}

#[derive(Clone, Debug)]
struct ActiveClip {
    request: PlayRequest,
    time: f32,
    start: f32,
    stop: f32,
    loop_start: f32,
    loop_stop: f32,
    next_key: usize,
    loops_remaining: u32,
    looping_enabled: bool,
    speed_mult: f32,
    playing: bool,
}

impl ActiveClip {
    fn complete(&self) -> f32 {
        if self.stop > self.start {
            ((self.time - self.start) / (self.stop - self.start)).clamp(0.0, 1.0)
        } else if self.playing {
            0.0
        } else {
            1.0
        }
    }
}

/// Keyframe-free clip player: advances time per group, loops, and reports the
/// text keys it crosses.
#[derive(Default)]
pub struct MockAnimation {
    clips: HashMap<String, Clip>,
    active: BTreeMap<String, ActiveClip>,
    pub plays: Vec<PlayRequest>,
    pub disabled: Vec<String>,
    pub weapons_visible: bool,
    pub carried_left_visible: bool,
    pub shield_animations: bool,
    pub arrow_attached: bool,
    pub pitch_factor: f32,
    pub accurate_aiming: bool,
}

impl MockAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group. Keys are `(time, key)` with the `<group>: ` prefix left
    /// off; `sound:` and `soundgen:` keys are stored as written.
    pub fn with_clip(mut self, group: &str, keys: &[(f32, &str)]) -> Self {
        let mut keys: Vec<TextKey> = keys
            .iter()
            .map(|(time, key)| {
                if key.starts_with("sound: ") || key.starts_with("soundgen: ") {
                    TextKey::new(*time, *key)
                } else {
                    TextKey::new(*time, format!("{group}: {key}"))
                }
            })
            .collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.clips.insert(group.to_owned(), Clip { keys, velocity: 0.0 });
        self
    }

    /// Adds a `start`..`stop` group of `length` seconds.
    pub fn with_simple_clip(self, group: &str, length: f32) -> Self {
        self.with_clip(group, &[(0.0, "start"), (length, "stop")])
    }

    pub fn with_velocity(mut self, group: &str, velocity: f32) -> Self {
        if let Some(clip) = self.clips.get_mut(group) {
            clip.velocity = velocity;
        }
        self
    }

    pub fn is_active(&self, group: &str) -> bool {
        self.active.contains_key(group)
    }

    pub fn speed_mult(&self, group: &str) -> Option<f32> {
        self.active.get(group).map(|clip| clip.speed_mult)
    }

    pub fn last_play(&self, group: &str) -> Option<&PlayRequest> {
        self.plays.iter().rev().find(|request| request.group == group)
    }

    pub fn play_count(&self, group: &str) -> usize {
        self.plays.iter().filter(|request| request.group == group).count()
    }

    /// Index and time of the first `key` of `group` at or after `from`.
    fn find_key(&self, group: &str, key: &str, from: f32) -> Option<(usize, f32)> {
        let text = format!("{group}: {key}");
        self.clips
            .get(group)?
            .keys
            .iter()
            .enumerate()
            .find(|(_, text_key)| text_key.text == text && text_key.time >= from)
            .map(|(index, text_key)| (index, text_key.time))
    }

    fn key_time(&self, group: &str, key: &str, from: f32) -> Option<f32> {
        self.find_key(group, key, from).map(|(_, time)| time)
    }

    fn first_key_at(&self, group: &str, time: f32) -> usize {
        self.text_keys(group)
            .iter()
            .position(|key| key.time >= time)
            .unwrap_or(self.text_keys(group).len())
    }
}

impl AnimationSource for MockAnimation {
    fn has_animation(&self, group: &str) -> bool {
        self.clips.contains_key(group)
    }

    fn play(&mut self, request: PlayRequest) {
        self.plays.push(request.clone());
        let group = request.group.clone();
        let Some((start_index, start)) = self.find_key(&group, &request.start_key, f32::MIN) else {
            return;
        };
        let Some(stop) = self.key_time(&group, &request.stop_key, start) else {
            return;
        };
        let loop_start = self
            .key_time(&group, "loop start", start)
            .filter(|time| *time <= stop)
            .unwrap_or(start);
        let loop_stop = self
            .key_time(&group, "loop stop", loop_start)
            .filter(|time| *time <= stop)
            .unwrap_or(stop);

        let time = start + (stop - start) * request.start_point;
        // Keys sharing the start time but listed before the start key stay quiet.
        let next_key = self.first_key_at(&group, time).max(start_index);
        self.active.insert(
            group,
            ActiveClip {
                time,
                start,
                stop,
                loop_start,
                loop_stop,
                next_key,
                loops_remaining: request.loops,
                looping_enabled: true,
                speed_mult: request.speed_mult,
                playing: true,
                request,
            },
        );
    }

    fn disable(&mut self, group: &str) {
        if self.active.remove(group).is_some() {
            self.disabled.push(group.to_owned());
        }
    }

    fn is_playing(&self, group: &str) -> bool {
        self.active.get(group).is_some_and(|clip| clip.playing)
    }

    fn info(&self, group: &str) -> Option<AnimInfo> {
        self.active.get(group).map(|clip| AnimInfo {
            complete: clip.complete(),
            speed_mult: clip.speed_mult,
            loops_remaining: clip.loops_remaining,
        })
    }

    fn current_time(&self, group: &str) -> Option<f32> {
        self.active.get(group).map(|clip| clip.time)
    }

    fn velocity(&self, group: &str) -> f32 {
        self.clips.get(group).map_or(0.0, |clip| clip.velocity)
    }

    fn text_key_time(&self, key: &str) -> Option<f32> {
        let (group, _) = key.split_once(": ")?;
        self.clips
            .get(group)?
            .keys
            .iter()
            .find(|text_key| text_key.text == key)
            .map(|text_key| text_key.time)
    }

    fn text_keys(&self, group: &str) -> &[TextKey] {
        self.clips.get(group).map_or(&[][..], |clip| clip.keys.as_slice())
    }

    fn adjust_speed_mult(&mut self, group: &str, speed_mult: f32) {
        if let Some(clip) = self.active.get_mut(group) {
            clip.speed_mult = speed_mult;
        }
    }

    fn set_looping_enabled(&mut self, group: &str, enabled: bool) {
        if let Some(clip) = self.active.get_mut(group) {
            clip.looping_enabled = enabled;
        }
    }

    fn set_accumulation(&mut self, _axes: Vec3) {}

    fn run(&mut self, duration: f32) -> AnimationStep {
        let mut step = AnimationStep::default();
        let mut finished = Vec::new();

        for (group, clip) in self.active.iter_mut() {
            if !clip.playing {
                continue;
            }
            let keys = self.clips.get(group).map_or(&[][..], |c| c.keys.as_slice());
            let mut remaining = duration * clip.speed_mult;
            loop {
                let can_loop = clip.loops_remaining > 0 && clip.looping_enabled && clip.loop_stop > clip.loop_start;
                let target = if can_loop { clip.loop_stop } else { clip.stop };
                let reached = clip.time + remaining >= target;
                if reached {
                    remaining -= target - clip.time;
                    clip.time = target;
                } else {
                    clip.time += remaining;
                }

                while clip.next_key < keys.len() && keys[clip.next_key].time <= clip.time {
                    step.keys.push(FiredTextKey {
                        group: group.clone(),
                        index: clip.next_key,
                        text: keys[clip.next_key].text.clone(),
                    });
                    clip.next_key += 1;
                }

                if !reached {
                    break;
                }
                if can_loop {
                    if clip.loops_remaining != LOOP_FOREVER {
                        clip.loops_remaining -= 1;
                    }
                    clip.time = clip.loop_start;
                    clip.next_key = keys
                        .iter()
                        .position(|key| key.time >= clip.loop_start)
                        .unwrap_or(keys.len());
                    continue;
                }
                clip.playing = false;
                if clip.request.auto_disable {
                    finished.push(group.clone());
                }
                break;
            }
        }

        for group in finished {
            self.active.remove(&group);
        }
        step
    }

    fn show_weapons(&mut self, visible: bool) {
        self.weapons_visible = visible;
    }

    fn show_carried_left(&mut self, visible: bool) {
        self.carried_left_visible = visible;
    }

    fn use_shield_animations(&self) -> bool {
        self.shield_animations
    }

    fn set_weapon_group(&mut self, _group: &str, _relative_duration: bool) {}

    fn attach_arrow(&mut self) {
        self.arrow_attached = true;
    }

    fn detach_arrow(&mut self) {
        self.arrow_attached = false;
    }

    fn set_pitch_factor(&mut self, factor: f32) {
        self.pitch_factor = factor;
    }

    fn set_accurate_aiming(&mut self, enabled: bool) {
        self.accurate_aiming = enabled;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Hit { strength: f32, attack: AttackType },
    Block,
    BreakInvisibility,
    SecurityTool(String),
    Cast { manual: bool },
    CastEffects(String),
    Sound { sound: String, pitch: f32, mode: SoundMode },
    OpenLoot,
    DeathCamera,
    Launch(f32),
}

/// Gameplay collaborator logging every call.
#[derive(Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    /// Answer of `start_cast`.
    pub refuse_casts: bool,
}

impl Recorder {
    pub fn hits(&self) -> Vec<(f32, AttackType)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Hit { strength, attack } => Some((*strength, *attack)),
                _ => None,
            })
            .collect()
    }

    /// How often `sound` was played.
    pub fn sound_count(&self, sound: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Sound { sound: played, .. } if played == sound))
            .count()
    }

    pub fn casts(&self) -> usize {
        self.calls.iter().filter(|call| matches!(call, Call::Cast { .. })).count()
    }
}

impl HitResolver for Recorder {
    fn hit(&mut self, _actor: Entity, strength: f32, attack: AttackType) {
        self.calls.push(Call::Hit { strength, attack });
    }

    fn block(&mut self, _actor: Entity) {
        self.calls.push(Call::Block);
    }

    fn break_invisibility(&mut self, _actor: Entity) {
        self.calls.push(Call::BreakInvisibility);
    }

    fn use_security_tool(&mut self, _actor: Entity, tool: &Item) {
        self.calls.push(Call::SecurityTool(tool.id.clone()));
    }
}

impl SpellResolver for Recorder {
    fn start_cast(&mut self, _actor: Entity, _spell: &SpellInfo, _stats: &CreatureStats) -> bool {
        !self.refuse_casts
    }

    fn cast(&mut self, _actor: Entity, manual: bool) {
        self.calls.push(Call::Cast { manual });
    }

    fn play_cast_effects(&mut self, _actor: Entity, spell_id: &str, _is_enchantment: bool) {
        self.calls.push(Call::CastEffects(spell_id.to_owned()));
    }
}

impl SoundService for Recorder {
    fn play_3d(&mut self, _actor: Entity, sound: &str, _volume: f32, pitch: f32, mode: SoundMode) {
        self.calls.push(Call::Sound {
            sound: sound.to_owned(),
            pitch,
            mode,
        });
    }

    fn sound_for_gen(&self, _actor: Entity, sound_gen: &str) -> Option<String> {
        Some(format!("gen {sound_gen}"))
    }
}

impl GuiService for Recorder {
    fn open_loot(&mut self, _actor: Entity) {
        self.calls.push(Call::OpenLoot);
    }

    fn use_death_camera(&mut self) {
        self.calls.push(Call::DeathCamera);
    }
}

impl ProjectileLauncher for Recorder {
    fn launch(&mut self, _actor: Entity, strength: f32) {
        self.calls.push(Call::Launch(strength));
    }
}

/// A controller with all of its collaborators.
pub struct Harness {
    pub animation: MockAnimation,
    pub gameplay: Recorder,
    pub rng: StdRng,
    pub config: ControllerConfig,
    pub weapons: StandardWeapons,
    pub state: ActorState,
    pub controller: CharacterController,
}

impl Harness {
    pub fn new(animation: MockAnimation, state: ActorState) -> Self {
        Self::with_record(animation, state, None, 0)
    }

    pub fn seeded(animation: MockAnimation, state: ActorState, seed: u64) -> Self {
        Self::with_record(animation, state, None, seed)
    }

    pub fn with_record(
        mut animation: MockAnimation,
        mut state: ActorState,
        record: Option<&AnimationRecord>,
        seed: u64,
    ) -> Self {
        let mut gameplay = Recorder::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let config = ControllerConfig::default();
        let weapons = StandardWeapons;
        let controller = {
            let mut services = Services {
                animation: &mut animation,
                weapons: &weapons,
                gameplay: &mut gameplay,
                rng: &mut rng,
                config: &config,
            };
            CharacterController::new(Entity::from_raw(1), &mut services, &mut state, record)
        };
        Self {
            animation,
            gameplay,
            rng,
            config,
            weapons,
            state,
            controller,
        }
    }

    pub fn update(&mut self, duration: f32) -> MovementOutput {
        let mut services = Services {
            animation: &mut self.animation,
            weapons: &self.weapons,
            gameplay: &mut self.gameplay,
            rng: &mut self.rng,
            config: &self.config,
        };
        self.controller.update(&mut services, &mut self.state, duration, false)
    }

    pub fn kill(&mut self) -> KillResult {
        let mut services = Services {
            animation: &mut self.animation,
            weapons: &self.weapons,
            gameplay: &mut self.gameplay,
            rng: &mut self.rng,
            config: &self.config,
        };
        self.controller.kill(&mut services, &mut self.state)
    }

    pub fn force_state_update(&mut self) {
        let mut services = Services {
            animation: &mut self.animation,
            weapons: &self.weapons,
            gameplay: &mut self.gameplay,
            rng: &mut self.rng,
            config: &self.config,
        };
        self.controller.force_state_update(&mut services, &mut self.state);
    }

    pub fn play_group(&mut self, group: &str, mode: PlayMode, count: u32, persist: bool) -> bool {
        self.controller.play_group(&mut self.animation, group, mode, count, persist)
    }

    pub fn states(&self) -> CharacterStates {
        *self.controller.states()
    }
}

pub fn one_handed_sword() -> Item {
    Item::weapon("iron saber", WeaponType::of_class(WeaponClass::Melee1H))
}

/// An NPC holding a drawn one-handed weapon.
pub fn armed_npc() -> ActorState {
    let mut state = ActorState::npc();
    state.equipment.right_hand = Some(one_handed_sword());
    state.stats.draw_state = DrawState::Weapon;
    state
}

pub fn armed_player() -> ActorState {
    ActorState {
        is_player: true,
        ..armed_npc()
    }
}

/// One-handed chop with a wind-up between 0.0 and 0.4 seconds.
pub fn one_handed_attack_clips() -> MockAnimation {
    MockAnimation::new()
        .with_simple_clip("idle", 2.0)
        .with_clip(
            "weapononehand",
            &[
                (0.0, "equip start"),
                (0.2, "equip stop"),
                (0.0, "chop start"),
                (0.0, "chop min attack"),
                (0.4, "chop max attack"),
                (0.5, "chop min hit"),
                (0.6, "chop hit"),
                (0.6, "chop small follow start"),
                (0.8, "chop small follow stop"),
                (0.6, "chop medium follow start"),
                (0.9, "chop medium follow stop"),
                (0.6, "chop large follow start"),
                (1.0, "chop large follow stop"),
            ],
        )
}
