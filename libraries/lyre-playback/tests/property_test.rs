//! Property-based tests for the playlist controller
//!
//! Transport and playlist operations are checked against a small reference
//! model over many random sequences.

mod common;

use common::Harness;
use lyre_playback::{PlaybackError, PlaybackState};
use proptest::prelude::*;
use std::time::Duration;

const TRACK_MS: u64 = 120_000;

#[derive(Debug, Clone)]
enum Transport {
    Play,
    Pause,
    Stop,
    Tick(u64),
    Seek(u64),
}

fn transport_op() -> impl Strategy<Value = Transport> {
    prop_oneof![
        Just(Transport::Play),
        Just(Transport::Pause),
        Just(Transport::Stop),
        (0u64..20_000).prop_map(Transport::Tick),
        (0u64..TRACK_MS + 10_000).prop_map(Transport::Seek),
    ]
}

/// Reference model of one unit
#[derive(Debug, Clone, Copy)]
struct Model {
    state: PlaybackState,
    position_ms: u64,
}

impl Model {
    fn apply(&mut self, op: &Transport) -> bool {
        match *op {
            Transport::Play => {
                if self.state == PlaybackState::Stopped {
                    self.position_ms = 0;
                }
                self.state = PlaybackState::Playing;
            }
            Transport::Pause => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                }
            }
            Transport::Stop => {
                self.state = PlaybackState::Stopped;
                self.position_ms = 0;
            }
            Transport::Tick(ms) => {
                if self.state == PlaybackState::Playing {
                    self.position_ms = (self.position_ms + ms).min(TRACK_MS);
                }
            }
            Transport::Seek(ms) => {
                if ms >= TRACK_MS {
                    return false;
                }
                self.position_ms = ms;
                if self.state == PlaybackState::Stopped {
                    self.state = PlaybackState::Playing;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
enum Edit {
    Add,
    Insert(usize),
    Remove(usize),
    Replace(usize),
    Advance,
    Back,
    Play,
    Stop,
}

fn edit_op() -> impl Strategy<Value = Edit> {
    prop_oneof![
        Just(Edit::Add),
        (0usize..8).prop_map(Edit::Insert),
        (0usize..8).prop_map(Edit::Remove),
        (0usize..8).prop_map(Edit::Replace),
        Just(Edit::Advance),
        Just(Edit::Back),
        Just(Edit::Play),
        Just(Edit::Stop),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: state and position always match the reference model
    #[test]
    fn transport_matches_reference_model(ops in prop::collection::vec(transport_op(), 1..40)) {
        let mut h = Harness::with_durations(&[("A", TRACK_MS / 1000)]);
        h.playlist.add_track("A");
        h.settle();

        let mut model = Model { state: PlaybackState::Stopped, position_ms: 0 };

        for op in &ops {
            let accepted = model.apply(op);
            let result = match *op {
                Transport::Play => h.playlist.play(),
                Transport::Pause => h.playlist.pause(),
                Transport::Stop => h.playlist.stop(),
                Transport::Tick(ms) => {
                    h.clock.advance(Duration::from_millis(ms));
                    Ok(())
                }
                Transport::Seek(ms) => h.playlist.set_song_position(Duration::from_millis(ms)),
            };

            match result {
                Ok(()) => prop_assert!(accepted, "{:?} should have failed", op),
                Err(PlaybackError::OutOfRange { .. }) => prop_assert!(!accepted),
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }

            prop_assert_eq!(h.playlist.state(), model.state);
            prop_assert_eq!(h.playlist.song_position(), Duration::from_millis(model.position_ms));
            prop_assert!(h.engine.running() <= 1);
            prop_assert_eq!(h.engine.running() == 1, model.state == PlaybackState::Playing);
        }
    }

    /// Property: position never decreases while playing without a seek
    #[test]
    fn position_is_monotonic_while_playing(ticks in prop::collection::vec(0u64..30_000, 1..30)) {
        let mut h = Harness::new();
        h.playlist.add_track("A");
        h.settle();
        h.playlist.play().unwrap();

        let mut last = h.playlist.song_position();
        for ms in ticks {
            h.clock.advance(Duration::from_millis(ms));
            let now = h.playlist.song_position();
            prop_assert!(now >= last);
            prop_assert!(now <= h.playlist.song_duration(None).unwrap());
            last = now;
        }
    }

    /// Property: the cursor stays addressable and playlist order follows edits
    #[test]
    fn cursor_and_order_follow_edits(ops in prop::collection::vec(edit_op(), 1..40)) {
        let mut h = Harness::new();
        let mut model: Vec<String> = Vec::new();
        let mut counter = 0;
        let mut fresh = || {
            counter += 1;
            format!("t{counter}")
        };

        for op in ops {
            match op {
                Edit::Add => {
                    let name = fresh();
                    h.playlist.add_track(name.as_str());
                    model.push(name);
                }
                Edit::Insert(i) => {
                    let name = fresh();
                    let result = h.playlist.insert_track(i, name.as_str());
                    prop_assert_eq!(result.is_ok(), i <= model.len());
                    if i <= model.len() {
                        model.insert(i, name);
                    }
                }
                Edit::Remove(i) => {
                    let result = h.playlist.remove_track(i);
                    prop_assert_eq!(result.is_ok(), i < model.len());
                    if i < model.len() {
                        model.remove(i);
                    }
                }
                Edit::Replace(i) => {
                    let name = fresh();
                    let result = h.playlist.replace_track(i, name.as_str());
                    prop_assert_eq!(result.is_ok(), i < model.len());
                    if i < model.len() {
                        model[i] = name;
                    }
                }
                Edit::Advance => h.playlist.advance().unwrap(),
                Edit::Back => h.playlist.skip_back().unwrap(),
                Edit::Play => {
                    h.settle();
                    h.playlist.play().ok();
                }
                Edit::Stop => h.playlist.stop().unwrap(),
            }

            h.playlist.dispatch_pending();
            // Only the cursor unit can be audible
            let running = h.engine.running();
            prop_assert!(running <= 1);
            if running == 1 {
                prop_assert_eq!(h.playlist.state(), PlaybackState::Playing);
            }
            if model.is_empty() {
                prop_assert_eq!(h.playlist.cursor(), 0);
            } else {
                prop_assert!(h.playlist.cursor() < model.len());
            }
            let order: Vec<_> = h.playlist.locators().iter().map(|l| l.to_string()).collect();
            prop_assert_eq!(&order, &model);
        }
    }

    /// Property: two mute toggles restore the exact gain for any volume history
    #[test]
    fn double_mute_toggle_restores_gain(volumes in prop::collection::vec(-1.0f32..3.0, 0..10)) {
        let mut h = Harness::new();
        for v in volumes {
            h.playlist.set_volume(v).unwrap();
        }
        let before = h.playlist.volume();

        h.playlist.toggle_mute();
        prop_assert_eq!(h.playlist.volume(), 0.0);
        h.playlist.toggle_mute();

        prop_assert_eq!(h.playlist.volume().to_bits(), before.to_bits());
        prop_assert!((0.0..=1.0).contains(&before));
    }
}
