//! Load profiles and the shared profile cell.
//!
//! The current profile is the only state shared between the poller and the
//! workers. It lives in a `tokio::sync::watch` channel: the poller (or the
//! fixed-profile publisher) owns the single [`ProfilePublisher`], and every
//! worker holds a cloned [`ProfileReader`]. Reads copy the value out, so no
//! reader ever holds a borrow across an await point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Externally controlled load intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// No activity; workers hold no connections.
    #[default]
    Off,
    Low,
    Med,
    High,
}

impl Profile {
    /// Tag used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Off => "off",
            Profile::Low => "low",
            Profile::Med => "med",
            Profile::High => "high",
        }
    }

    /// Returns true for every profile that carries throughput.
    pub fn is_active(&self) -> bool {
        !matches!(self, Profile::Off)
    }

    /// Numeric level exported as a gauge (off=0 .. high=3).
    pub fn level(&self) -> i64 {
        match self {
            Profile::Off => 0,
            Profile::Low => 1,
            Profile::Med => 2,
            Profile::High => 3,
        }
    }

    /// Exact-match parse for control-plane tags. Unlike [`FromStr`], which
    /// also accepts padded or mixed-case operator input, anything other than
    /// `off|low|med|high` is rejected.
    pub fn from_tag(tag: &str) -> Result<Self, UnknownProfile> {
        Profile::all()
            .into_iter()
            .find(|p| p.as_str() == tag)
            .ok_or_else(|| UnknownProfile(tag.to_string()))
    }

    /// All profiles in ascending intensity.
    pub fn all() -> [Profile; 4] {
        [Profile::Off, Profile::Low, Profile::Med, Profile::High]
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tag is not one of `off|low|med|high`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown load profile: '{0}' (expected off, low, med or high)")]
pub struct UnknownProfile(pub String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Profile::Off),
            "low" => Ok(Profile::Low),
            "med" => Ok(Profile::Med),
            "high" => Ok(Profile::High),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

/// Target aggregate throughput (operations/second) for each active profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileRates {
    pub low: u64,
    pub med: u64,
    pub high: u64,
}

impl Default for ProfileRates {
    fn default() -> Self {
        Self {
            low: 200,
            med: 2_000,
            high: 10_000,
        }
    }
}

impl ProfileRates {
    /// Target throughput for `profile`, or `None` for `off`.
    pub fn target_throughput(&self, profile: Profile) -> Option<u64> {
        match profile {
            Profile::Off => None,
            Profile::Low => Some(self.low),
            Profile::Med => Some(self.med),
            Profile::High => Some(self.high),
        }
    }
}

/// Creates the shared profile cell, initialised to [`Profile::Off`].
pub fn profile_channel() -> (ProfilePublisher, ProfileReader) {
    let (tx, rx) = watch::channel(Profile::Off);
    (ProfilePublisher { tx }, ProfileReader { rx })
}

/// Sole writer of the shared profile.
#[derive(Debug)]
pub struct ProfilePublisher {
    tx: watch::Sender<Profile>,
}

impl ProfilePublisher {
    /// Replaces the shared profile. Returns the previous value when it changed.
    pub fn publish(&self, profile: Profile) -> Option<Profile> {
        let previous = self.tx.send_replace(profile);
        (previous != profile).then_some(previous)
    }

    /// Current value as seen by the writer.
    pub fn current(&self) -> Profile {
        *self.tx.borrow()
    }

    /// Creates another reader of the same cell.
    pub fn subscribe(&self) -> ProfileReader {
        ProfileReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only handle to the shared profile.
#[derive(Debug, Clone)]
pub struct ProfileReader {
    rx: watch::Receiver<Profile>,
}

impl ProfileReader {
    /// Copies the current profile out of the cell.
    pub fn current(&self) -> Profile {
        *self.rx.borrow()
    }
}
