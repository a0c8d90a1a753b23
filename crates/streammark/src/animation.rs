//! Cooperative reveal animation.
//!
//! The scheduler never owns a timer. The host asks for a [`TimerHandle`],
//! waits `interval` and calls `Session::tick` with it; a cancelled or stale
//! handle makes the tick a no-op.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use hashbrown::HashMap;
use serde::Serialize;

use crate::config::{AnimationConfig, Effect};
use crate::token::TokenId;

/// How far a node's content is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RevealState {
    /// Fully shown, nothing to animate
    Steady,
    /// `revealed` of `total` characters are shown
    Entering { revealed: usize, total: usize },
}

/// Shared flag that stops a timer loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// What the host needs to drive ticks.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    pub interval: Duration,
    pub cancel: CancelToken,
    generation: u64,
}

impl TimerHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug)]
struct Track {
    text: String,
    revealed: usize,
    total: usize,
    settled: bool,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    config: AnimationConfig,
    enabled: bool,
    tracks: HashMap<TokenId, Track>,
    /// Nodes whose reveal completed, with the character count shown
    finished: HashMap<TokenId, usize>,
    generation: u64,
    timer: Option<CancelToken>,
}

impl Scheduler {
    pub fn new(config: AnimationConfig, enabled: bool) -> Self {
        Self {
            config,
            enabled,
            tracks: HashMap::new(),
            finished: HashMap::new(),
            generation: 0,
            timer: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Record the current text of a node and return its reveal state.
    pub fn observe(&mut self, id: TokenId, text: &str, settled: bool) -> RevealState {
        if !self.enabled {
            return RevealState::Steady;
        }

        let total = text.chars().count();
        let keep_prefix = self.config.keep_prefix;

        if !self.tracks.contains_key(&id) {
            let revealed = match self.finished.get(&id) {
                Some(&shown) if shown == total => return RevealState::Steady,
                Some(&shown) if shown < total => shown,
                _ => 0,
            };
            self.finished.remove(&id);
            self.tracks.insert(
                id,
                Track {
                    text: String::new(),
                    revealed,
                    total: revealed,
                    settled,
                },
            );
        }
        let Some(track) = self.tracks.get_mut(&id) else {
            return RevealState::Steady;
        };

        if track.text != text {
            let appended = text.starts_with(track.text.as_str());
            if !appended {
                track.revealed = if keep_prefix {
                    track.revealed.min(common_prefix_chars(&track.text, text))
                } else {
                    0
                };
            }
            track.text = text.to_string();
            track.total = total;
        }
        track.settled = settled;

        RevealState::Entering {
            revealed: track.revealed,
            total: track.total,
        }
    }

    pub fn state(&self, id: TokenId) -> RevealState {
        match self.tracks.get(&id) {
            Some(track) => RevealState::Entering {
                revealed: track.revealed,
                total: track.total,
            },
            None => RevealState::Steady,
        }
    }

    /// Advance every active node one step and retire the finished ones.
    pub fn tick(&mut self, has_next_chunk: bool) {
        let step = self.config.step;
        let typing = self.config.effect == Effect::Typing;

        let mut done = Vec::new();
        for (id, track) in self.tracks.iter_mut() {
            track.revealed = if typing {
                track.revealed.saturating_add(step).min(track.total)
            } else {
                track.total
            };
            let full = track.revealed == track.total;
            // a one-shot effect is over after its transition; typing keeps
            // following content that may still grow
            if full && (!typing || track.settled || !has_next_chunk) {
                done.push((*id, track.total));
            }
        }
        for (id, shown) in done {
            self.tracks.remove(&id);
            self.finished.insert(id, shown);
        }

        tracing::trace!(active = self.tracks.len(), "animation tick");
        if self.is_idle() {
            self.release_timer();
        }
    }

    /// Handle for the current timer, creating one if none is live. `None`
    /// when there is nothing to animate.
    pub fn timer(&mut self) -> Option<TimerHandle> {
        if !self.enabled || self.is_idle() {
            return None;
        }
        let cancel = match &self.timer {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                self.generation += 1;
                let token = CancelToken::default();
                self.timer = Some(token.clone());
                token
            }
        };
        Some(TimerHandle {
            interval: self.config.interval(),
            cancel,
            generation: self.generation,
        })
    }

    /// A handle is live until cancelled or replaced.
    pub fn is_live(&self, handle: &TimerHandle) -> bool {
        handle.generation == self.generation && !handle.is_cancelled()
    }

    fn release_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }

    pub fn reset(&mut self) {
        self.release_timer();
        self.tracks.clear();
        self.finished.clear();
        self.generation += 1;
    }

    /// Drop the reveal state of nodes that no longer exist.
    pub fn retain(&mut self, live: impl Fn(TokenId) -> bool) {
        self.tracks.retain(|id, _| live(*id));
        self.finished.retain(|id, _| live(*id));
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.release_timer();
    }
}

fn common_prefix_chars(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn typing(keep_prefix: bool) -> Scheduler {
        Scheduler::new(
            AnimationConfig {
                effect: Effect::Typing,
                step: 2,
                keep_prefix,
                ..AnimationConfig::default()
            },
            true,
        )
    }

    #[test]
    fn disabled_is_always_steady() {
        let mut scheduler = Scheduler::new(AnimationConfig::default(), false);
        assert_eq!(scheduler.observe(TokenId(0), "abc", false), RevealState::Steady);
        assert!(scheduler.timer().is_none());
    }

    #[test]
    fn typing_reveals_step_chars_per_tick() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "hello", false);
        scheduler.tick(true);
        assert_eq!(
            scheduler.state(TokenId(0)),
            RevealState::Entering {
                revealed: 2,
                total: 5
            }
        );
        scheduler.tick(true);
        scheduler.tick(true);
        // fully shown but still growing
        assert_eq!(
            scheduler.state(TokenId(0)),
            RevealState::Entering {
                revealed: 5,
                total: 5
            }
        );
        scheduler.tick(false);
        assert_eq!(scheduler.state(TokenId(0)), RevealState::Steady);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn appended_text_continues_reveal() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "ab", false);
        scheduler.tick(true);
        let state = scheduler.observe(TokenId(0), "abcd", false);
        assert_eq!(
            state,
            RevealState::Entering {
                revealed: 2,
                total: 4
            }
        );
    }

    #[test]
    fn replaced_text_restarts_without_keep_prefix() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "hello", false);
        scheduler.tick(true);
        scheduler.tick(true);
        let state = scheduler.observe(TokenId(0), "help!", false);
        assert_eq!(
            state,
            RevealState::Entering {
                revealed: 0,
                total: 5
            }
        );
    }

    #[test]
    fn keep_prefix_resumes_at_first_difference() {
        let mut scheduler = typing(true);
        scheduler.observe(TokenId(0), "hello", false);
        scheduler.tick(true);
        scheduler.tick(true);
        let state = scheduler.observe(TokenId(0), "help!", false);
        assert_eq!(
            state,
            RevealState::Entering {
                revealed: 3,
                total: 5
            }
        );
    }

    #[test]
    fn fade_in_finishes_after_one_tick() {
        let mut scheduler = Scheduler::new(AnimationConfig::default(), true);
        scheduler.observe(TokenId(0), "hello", false);
        scheduler.tick(true);
        assert_eq!(scheduler.state(TokenId(0)), RevealState::Steady);
        assert_eq!(scheduler.observe(TokenId(0), "hello", false), RevealState::Steady);
    }

    #[test]
    fn timer_is_cancelled_on_reset_and_when_idle() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "ab", true);
        let handle = scheduler.timer().unwrap();
        assert!(scheduler.is_live(&handle));

        scheduler.reset();
        assert!(handle.is_cancelled());
        assert!(!scheduler.is_live(&handle));

        scheduler.observe(TokenId(1), "ab", true);
        let handle = scheduler.timer().unwrap();
        scheduler.tick(true);
        assert!(scheduler.is_idle());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn huge_step_reveals_everything_at_once() {
        let mut scheduler = Scheduler::new(
            AnimationConfig {
                effect: Effect::Typing,
                step: usize::MAX,
                ..AnimationConfig::default()
            },
            true,
        );
        scheduler.observe(TokenId(0), "hello", false);
        scheduler.tick(true);
        assert_eq!(
            scheduler.state(TokenId(0)),
            RevealState::Entering {
                revealed: 5,
                total: 5
            }
        );
        scheduler.tick(false);
        assert_eq!(scheduler.state(TokenId(0)), RevealState::Steady);
    }

    #[test]
    fn settled_typing_track_retires_while_streaming() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "abcd", true);
        scheduler.observe(TokenId(1), "abcd", false);
        scheduler.tick(true);
        scheduler.tick(true);

        // more chunks may follow, yet the settled block is done
        assert_eq!(scheduler.state(TokenId(0)), RevealState::Steady);
        assert_eq!(
            scheduler.state(TokenId(1)),
            RevealState::Entering {
                revealed: 4,
                total: 4
            }
        );
        assert!(!scheduler.is_idle());

        scheduler.tick(false);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn drop_cancels_timer() {
        let mut scheduler = typing(false);
        scheduler.observe(TokenId(0), "ab", false);
        let handle = scheduler.timer().unwrap();
        drop(scheduler);
        assert!(handle.is_cancelled());
    }
}
