use serde::{Deserialize, Serialize};

use crate::util::epoch_secs;

/// Permission tier of a chat participant.
///
/// Compared by simple equality; there is no ordering-based privilege check
/// anywhere in the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Owner,
    Mod,
    Vip,
    #[default]
    User,
}

impl Level {
    /// Lowercase label used in chat-native promotion lines (`/vip name`).
    pub fn label(self) -> &'static str {
        match self {
            Level::Owner => "owner",
            Level::Mod => "mod",
            Level::Vip => "vip",
            Level::User => "user",
        }
    }
}

/// Persistent per-user record. One exists per distinct participant ever seen;
/// records are never deleted, only mutated.
///
/// Timestamps are epoch seconds. A missing timestamp in the stats file
/// defaults to load time; missing counters default to zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub level: Level,
    #[serde(default = "epoch_secs")]
    pub last_chat: f64,
    #[serde(default = "epoch_secs")]
    pub last_command: f64,
    #[serde(default)]
    pub last_vote: f64,
    #[serde(default = "epoch_secs")]
    pub first_seen: f64,
    #[serde(default)]
    pub messages_sent: u64,
    #[serde(default)]
    pub bonks: u64,
    #[serde(default)]
    pub hugs: u64,
    #[serde(default)]
    pub points: u64,
    /// Opaque blob owned by the RPG subsystem; round-tripped untouched.
    #[serde(default)]
    pub player_profile: serde_json::Value,
}

impl UserRecord {
    /// Fresh record for a participant seen for the first time.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_level(name, Level::User)
    }

    pub fn with_level(name: impl Into<String>, level: Level) -> Self {
        let now = epoch_secs();
        Self {
            name: name.into(),
            level,
            last_chat: now,
            last_command: 0.0,
            last_vote: 0.0,
            first_seen: now,
            messages_sent: 0,
            bonks: 0,
            hugs: 0,
            points: 0,
            player_profile: serde_json::Value::Null,
        }
    }
}

/// A participant currently present in the channel, as reported by the chat
/// platform API. `seen` is stamped when the snapshot was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct Chatter {
    pub id: String,
    pub login: String,
    pub name: String,
    pub seen: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trips_as_lowercase() {
        let json = serde_json::to_string(&Level::Mod).unwrap();
        assert_eq!(json, "\"mod\"");
        let back: Level = serde_json::from_str("\"vip\"").unwrap();
        assert_eq!(back, Level::Vip);
    }

    #[test]
    fn new_record_has_defaults() {
        let rec = UserRecord::new("alice");
        assert_eq!(rec.level, Level::User);
        assert_eq!(rec.messages_sent, 0);
        assert_eq!(rec.last_vote, 0.0);
        assert!(rec.first_seen > 0.0);
        assert!(rec.player_profile.is_null());
    }
}
