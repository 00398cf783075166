//! Playback clock interface.
//!
//! The capture controller samples the clock at the instant of every key
//! press and never caches the reading across presses. [`ManualClock`] is a
//! deterministic implementation for tests and scripted replays.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported playback speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackRate {
    #[default]
    Normal,
    Double,
    Quadruple,
}

impl PlaybackRate {
    /// Maps a requested speed onto a supported one; anything else resets to 1x.
    pub fn from_requested(rate: f64) -> Self {
        if rate.total_cmp(&2.0).is_eq() {
            Self::Double
        } else if rate.total_cmp(&4.0).is_eq() {
            Self::Quadruple
        } else {
            Self::Normal
        }
    }

    /// Speed multiplier.
    pub const fn factor(self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Double => 2.0,
            Self::Quadruple => 4.0,
        }
    }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// The video player as seen by the capture controller.
pub trait PlaybackClock {
    /// Current media position in seconds.
    fn current_time(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    fn playback_rate(&self) -> PlaybackRate;

    /// Requests a speed and returns the one actually applied.
    fn set_playback_rate(&mut self, requested: f64) -> PlaybackRate;

    /// Flips between playing and paused.
    fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualClock {
    position: f64,
    duration: Option<f64>,
    playing: bool,
    rate: PlaybackRate,
}

impl ManualClock {
    /// A paused clock at `0.0` with no end.
    pub fn new() -> Self {
        Self::default()
    }

    /// A paused clock that stops at the end of `duration` seconds of media.
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration.max(0.0)),
            ..Self::default()
        }
    }

    pub const fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Lets `wall_seconds` of real time pass.
    ///
    /// Media time only moves while playing, scaled by the playback rate.
    /// Reaching the end of the media clamps the position and pauses.
    pub fn advance(&mut self, wall_seconds: f64) {
        if !self.playing || wall_seconds <= 0.0 {
            return;
        }
        self.position += wall_seconds * self.rate.factor();
        if let Some(duration) = self.duration {
            if self.position >= duration {
                self.position = duration;
                self.playing = false;
            }
        }
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let floor = seconds.max(0.0);
        self.duration.map_or(floor, |duration| floor.min(duration))
    }
}

impl PlaybackClock for ManualClock {
    fn current_time(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = self.clamp(seconds);
    }

    fn playback_rate(&self) -> PlaybackRate {
        self.rate
    }

    fn set_playback_rate(&mut self, requested: f64) -> PlaybackRate {
        self.rate = PlaybackRate::from_requested(requested);
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_rates_reset_to_normal() {
        assert_eq!(PlaybackRate::from_requested(2.0), PlaybackRate::Double);
        assert_eq!(PlaybackRate::from_requested(4.0), PlaybackRate::Quadruple);
        assert_eq!(PlaybackRate::from_requested(1.5), PlaybackRate::Normal);
        assert_eq!(PlaybackRate::from_requested(0.5), PlaybackRate::Normal);
        assert_eq!(PlaybackRate::from_requested(f64::NAN), PlaybackRate::Normal);
    }

    #[test]
    fn rate_displays_as_multiplier() {
        assert_eq!(PlaybackRate::Quadruple.to_string(), "4x");
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = ManualClock::new();
        clock.advance(3.0);
        assert!(clock.current_time().abs() < f64::EPSILON);
    }

    #[test]
    fn advance_scales_by_rate() {
        let mut clock = ManualClock::new();
        clock.play();
        clock.advance(1.0);
        assert_eq!(clock.set_playback_rate(2.0), PlaybackRate::Double);
        clock.advance(1.5);
        assert!((clock.current_time() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reaching_the_end_pauses() {
        let mut clock = ManualClock::with_duration(10.0);
        clock.play();
        clock.advance(12.0);
        assert!((clock.current_time() - 10.0).abs() < f64::EPSILON);
        assert!(!clock.is_playing());
    }

    #[test]
    fn seek_clamps_to_media() {
        let mut clock = ManualClock::with_duration(30.0);
        clock.seek(-4.0);
        assert!(clock.current_time().abs() < f64::EPSILON);
        clock.seek(45.0);
        assert!((clock.current_time() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn toggle_flips_play_state() {
        let mut clock = ManualClock::new();
        clock.toggle();
        assert!(clock.is_playing());
        clock.toggle();
        assert!(!clock.is_playing());
    }
}
