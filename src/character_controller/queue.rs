use std::collections::VecDeque;

use bevy::log::debug;

use super::controller::CharacterController;
use super::services::{AnimationSource, PlayRequest, Priority};
use super::states::{IdleState, Transition};

/// How [`CharacterController::play_group`] treats what is already queued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayMode {
    /// Play after the current entry finishes.
    #[default]
    Queue,
    /// Replace the queue and start now.
    Immediate,
    /// Replace the queue and start now at the group's loop start.
    ImmediateLoop,
}

/// A scripted animation waiting in or heading the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedAnimation {
    pub group: String,
    pub loop_count: u32,
    /// Survives non-persistent clears and outranks every procedural layer.
    pub persist: bool,
}

/// Scripted animations in play order. The head is the one playing; the last
/// entry keeps its final pose until replaced.
#[derive(Clone, Debug, Default)]
pub struct AnimationQueue {
    entries: VecDeque<QueuedAnimation>,
}

impl AnimationQueue {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn front(&self) -> Option<&QueuedAnimation> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedAnimation> {
        self.entries.iter()
    }

    pub(super) fn push(&mut self, entry: QueuedAnimation) {
        self.entries.push_back(entry);
    }
}

fn queued_request(group: &str, persist: bool, loops: u32) -> PlayRequest {
    let priority = if persist && group != "idle" {
        Priority::Persistent
    } else {
        Priority::Default
    };
    PlayRequest::new(group, priority)
        .with_loops(loops)
        .with_loop_fallback(group.starts_with("idle"))
}

impl CharacterController {
    /// Requests a scripted animation. Returns false when the group does not
    /// exist or a persistent animation may not be interrupted.
    ///
    /// `count` is the number of plays, at least one.
    pub fn play_group(
        &mut self,
        animation: &mut dyn AnimationSource,
        group: &str,
        mode: PlayMode,
        count: u32,
        persist: bool,
    ) -> bool {
        if !animation.has_animation(group) {
            return false;
        }
        if self.is_persistent_anim_playing(animation) && !persist {
            return false;
        }
        // Nothing scripted to return from.
        if group == "idle" && self.queue.is_empty() {
            return true;
        }

        // A looping group already inside its loop keeps going with its own
        // loop count; only what was queued behind it is dropped.
        if let Some(front) = self.queue.front().filter(|front| front.group == group) {
            let loop_start = animation.text_key_time(&format!("{group}: loop start"));
            if loop_start.is_some() && animation.is_playing(group) {
                let end_of_loop = animation
                    .text_key_time(&format!("{}: loop stop", front.group))
                    .or_else(|| animation.text_key_time(&format!("{}: stop", front.group)));
                let now = animation.current_time(group);
                if let (Some(end), Some(now)) = (end_of_loop, now) {
                    if end > 0.0 && now < end {
                        self.queue.entries.truncate(1);
                        return true;
                    }
                }
            }
        }

        let count = count.max(1);
        let entry = QueuedAnimation {
            group: group.to_owned(),
            loop_count: count - 1,
            // Returning to idle ends scripted control.
            persist: persist && group != "idle",
        };

        let head_playing = self
            .queue
            .front()
            .is_some_and(|front| animation.is_playing(&front.group));
        if mode != PlayMode::Queue || !head_playing {
            self.clear_anim_queue_inner(animation, persist);
            animation.disable(&self.clips.idle);
            self.clips.idle.clear();
            self.states.apply(Transition::Idle(IdleState::Special));

            let start = if mode == PlayMode::ImmediateLoop {
                "loop start"
            } else {
                "start"
            };
            animation.play(queued_request(group, persist, count - 1).with_keys(start, "stop"));
        } else {
            self.queue.entries.truncate(1);
        }

        debug!("actor {:?} queues {group} x{count} ({mode:?})", self.actor);
        self.queue.push(entry);
        true
    }

    /// Drops every non-persistent scripted animation.
    pub(super) fn clear_anim_queue(&mut self, animation: &mut dyn AnimationSource) {
        self.clear_anim_queue_inner(animation, false);
    }

    fn clear_anim_queue_inner(&mut self, animation: &mut dyn AnimationSource, clear_persistent: bool) {
        if !self.is_persistent_anim_playing(animation) || clear_persistent {
            if let Some(front) = self.queue.front() {
                animation.disable(&front.group);
            }
        }
        self.queue
            .entries
            .retain(|entry| !clear_persistent && entry.persist);
    }

    /// Starts the next entry once the head has finished.
    pub(super) fn update_anim_queue(&mut self, animation: &mut dyn AnimationSource) {
        if self.queue.len() > 1 {
            if let Some(front) = self.queue.front().filter(|front| !animation.is_playing(&front.group)) {
                animation.disable(&front.group);
                self.queue.entries.pop_front();
                if let Some(next) = self.queue.front() {
                    animation.play(queued_request(&next.group, next.persist, next.loop_count));
                }
            }
        }

        if let Some(front) = self.queue.front() {
            // Only the last entry may loop on; earlier ones must end to let the next start.
            animation.set_looping_enabled(&front.group, self.queue.len() <= 1);
        }
    }

    /// A persistent scripted animation heads the queue and is still playing.
    pub fn is_persistent_anim_playing(&self, animation: &dyn AnimationSource) -> bool {
        self.queue
            .front()
            .is_some_and(|front| front.persist && animation.is_playing(&front.group))
    }

    pub fn scripted_queue(&self) -> &AnimationQueue {
        &self.queue
    }
}
