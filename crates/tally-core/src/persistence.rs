use std::{collections::HashMap, path::Path};

use tracing::{error, info, warn};

use crate::{
    domain::{Level, UserRecord},
    registry::UserRegistry,
    Result,
};

/// Load the stats file into a name-keyed record map.
///
/// A missing file yields the seed state (one Owner record); malformed content
/// is logged and also falls back to the seed state rather than aborting.
pub fn load_or_seed(path: &Path, owner: &str) -> HashMap<String, UserRecord> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no stats file, seeding owner record");
            return seed(owner);
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read stats file, starting from seed state");
            return seed(owner);
        }
    };

    match parse_stats(&contents) {
        Ok(records) => {
            info!(path = %path.display(), users = records.len(), "loaded stats file");
            records
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed stats file, starting from seed state");
            seed(owner)
        }
    }
}

fn seed(owner: &str) -> HashMap<String, UserRecord> {
    let record = UserRecord::with_level(owner, Level::Owner);
    HashMap::from([(record.name.clone(), record)])
}

fn parse_stats(contents: &str) -> Result<HashMap<String, UserRecord>> {
    let mut records: HashMap<String, UserRecord> = serde_json::from_str(contents)?;
    // Names live in the map keys, not in the stored values.
    for (name, record) in records.iter_mut() {
        record.name = name.clone();
    }
    Ok(records)
}

/// Serialize `records` and atomically replace the stats file (write to a
/// sibling temp file, then rename over the target).
pub fn save(path: &Path, records: &[UserRecord]) -> Result<()> {
    let map: HashMap<&str, &UserRecord> = records
        .iter()
        .map(|record| (record.name.as_str(), record))
        .collect();
    let serialized = serde_json::to_string_pretty(&map)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serialized)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// One flush: snapshot every record under the registry lock, then write the
/// serialized form with the lock released.
pub async fn flush(path: &Path, registry: &UserRegistry) -> Result<()> {
    let snapshot = registry.all().await;
    save(path, &snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::epoch_secs;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        PathBuf::from(format!("/tmp/tally-stats-{tag}-{}.json", std::process::id()))
    }

    #[test]
    fn missing_file_seeds_owner_record() {
        let records = load_or_seed(Path::new("/tmp/tally-does-not-exist.json"), "boss");
        assert_eq!(records.len(), 1);
        assert_eq!(records["boss"].level, Level::Owner);
    }

    #[test]
    fn malformed_file_falls_back_to_seed_state() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{not json").unwrap();

        let records = load_or_seed(&path, "boss");
        assert_eq!(records.len(), 1);
        assert_eq!(records["boss"].level, Level::Owner);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let path = temp_path("roundtrip");

        let mut alice = UserRecord::with_level("alice", Level::Vip);
        alice.last_chat = 100.5;
        alice.last_command = 90.0;
        alice.last_vote = 80.0;
        alice.first_seen = 10.0;
        alice.messages_sent = 42;
        alice.bonks = 3;
        alice.hugs = 5;
        alice.points = 7;
        alice.player_profile = serde_json::json!({"class": "bard", "str": 11});

        save(&path, std::slice::from_ref(&alice)).unwrap();
        let loaded = load_or_seed(&path, "boss");

        let back = &loaded["alice"];
        assert_eq!(back.name, "alice");
        assert_eq!(back.level, Level::Vip);
        assert_eq!(back.last_chat, 100.5);
        assert_eq!(back.last_command, 90.0);
        assert_eq!(back.last_vote, 80.0);
        assert_eq!(back.first_seen, 10.0);
        assert_eq!(back.messages_sent, 42);
        assert_eq!(back.bonks, 3);
        assert_eq!(back.hugs, 5);
        assert_eq!(back.points, 7);
        assert_eq!(back.player_profile, alice.player_profile);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_optional_fields_default_at_load_time() {
        let path = temp_path("defaults");
        // A minimal hand-written record: only the level is present.
        std::fs::write(&path, r#"{"ghost": {"level": "mod"}}"#).unwrap();

        let before = epoch_secs();
        let loaded = load_or_seed(&path, "boss");
        let after = epoch_secs();

        let ghost = &loaded["ghost"];
        assert_eq!(ghost.level, Level::Mod);
        // Missing timestamps default to "now" at load time.
        assert!(ghost.last_chat >= before && ghost.last_chat <= after);
        assert!(ghost.first_seen >= before && ghost.first_seen <= after);
        // Counters and the vote stamp default to zero.
        assert_eq!(ghost.last_vote, 0.0);
        assert_eq!(ghost.messages_sent, 0);
        assert!(ghost.player_profile.is_null());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn flush_writes_registry_snapshot() {
        let path = temp_path("flush");
        let registry = UserRegistry::default();
        registry.ensure("a").await;
        registry.ensure("b").await;

        flush(&path, &registry).await.unwrap();
        let loaded = load_or_seed(&path, "boss");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key("a") && loaded.contains_key("b"));

        let _ = std::fs::remove_file(&path);
    }
}
