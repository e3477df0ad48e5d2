//! Save-game record of the scripted animation queue and the death clip.

use bevy::log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actor::CreatureStats;
use super::controller::CharacterController;
use super::queue::QueuedAnimation;
use super::services::{AnimationSource, PlayRequest, Priority};
use super::states::{IdleState, Transition};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode animation record: {0}")]
    Encode(#[from] ron::Error),
    #[error("failed to decode animation record: {0}")]
    Decode(#[from] ron::error::SpannedError),
}

/// One persistent entry of the scripted queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAnimation {
    pub group: String,
    /// Completion fraction, or clip time in seconds when `absolute`.
    pub time: f32,
    pub absolute: bool,
    pub loop_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationRecord {
    #[serde(default)]
    pub scripted: Vec<ScriptedAnimation>,
    #[serde(default)]
    pub death_animation: Option<u8>,
}

impl AnimationRecord {
    pub fn to_ron(&self) -> Result<String, PersistError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn from_ron(text: &str) -> Result<Self, PersistError> {
        Ok(ron::from_str(text)?)
    }
}

impl CharacterController {
    /// Captures the persistent scripted animations, the head one at its
    /// current completion, and the death clip index.
    pub fn persist(&self, animation: &dyn AnimationSource, stats: &CreatureStats) -> AnimationRecord {
        let scripted = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.persist)
            .map(|(position, entry)| match animation.info(&entry.group).filter(|_| position == 0) {
                Some(info) => ScriptedAnimation {
                    group: entry.group.clone(),
                    time: info.complete,
                    absolute: false,
                    loop_count: info.loops_remaining,
                },
                None => ScriptedAnimation {
                    group: entry.group.clone(),
                    time: 0.0,
                    absolute: true,
                    loop_count: entry.loop_count,
                },
            })
            .collect();

        AnimationRecord {
            scripted,
            death_animation: stats.death_animation,
        }
    }

    /// Restores the scripted queue of `record`. Groups the current model
    /// lacks are dropped with a warning.
    pub fn unpersist(&mut self, animation: &mut dyn AnimationSource, record: &AnimationRecord) {
        let restored: Vec<&ScriptedAnimation> = record
            .scripted
            .iter()
            .filter(|scripted| {
                let known = animation.has_animation(&scripted.group);
                if !known {
                    warn!(
                        "actor {:?}: dropping saved animation {:?}, the model has no such group",
                        self.actor, scripted.group
                    );
                }
                known
            })
            .collect();
        let Some(head) = restored.first() else {
            return;
        };

        self.clear_anim_queue(animation);
        for scripted in &restored {
            self.queue.push(QueuedAnimation {
                group: scripted.group.clone(),
                loop_count: scripted.loop_count,
                persist: true,
            });
        }

        let complete = if head.absolute {
            let start = animation.text_key_time(&format!("{}: start", head.group));
            let stop = animation.text_key_time(&format!("{}: stop", head.group));
            match (start, stop) {
                (Some(start), Some(stop)) if stop > start => (head.time.clamp(start, stop) - start) / (stop - start),
                _ => 0.0,
            }
        } else if (0.0..=1.0).contains(&head.time) {
            head.time
        } else {
            warn!(
                "actor {:?}: saved completion {} of {:?} is out of range",
                self.actor, head.time, head.group
            );
            head.time.clamp(0.0, 1.0)
        };

        animation.disable(&self.clips.idle);
        self.clips.idle.clear();
        self.states.apply(Transition::Idle(IdleState::Special));
        animation.play(
            PlayRequest::new(head.group.clone(), Priority::Persistent)
                .starting_at(complete)
                .with_loops(head.loop_count)
                .with_loop_fallback(head.group.starts_with("idle")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_survives_ron() {
        let record = AnimationRecord {
            scripted: vec![ScriptedAnimation {
                group: "bowdown".to_owned(),
                time: 0.25,
                absolute: false,
                loop_count: 2,
            }],
            death_animation: Some(3),
        };
        let text = record.to_ron().unwrap();
        assert_eq!(AnimationRecord::from_ron(&text).unwrap(), record);
    }

    #[test]
    fn missing_fields_default() {
        let record = AnimationRecord::from_ron("()").unwrap();
        assert_eq!(record, AnimationRecord::default());
    }

    #[test]
    fn malformed_record_is_an_error() {
        assert!(matches!(
            AnimationRecord::from_ron("(scripted: 4"),
            Err(PersistError::Decode(_))
        ));
    }
}
