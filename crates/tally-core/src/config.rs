use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Everything tunable lives here; components receive the values they need
/// instead of reading process-wide globals.
#[derive(Clone, Debug)]
pub struct Config {
    // Identity
    pub owner: String,
    pub channel: String,
    pub nickname: String,

    // Twitch credentials (consumed by the Helix adapter)
    pub oauth_token: String,
    pub client_id: String,
    pub client_secret: String,

    // Persistence
    pub stats_path: PathBuf,

    // Background loop intervals
    pub write_interval: Duration,
    pub sweep_interval: Duration,
    pub chatter_interval: Duration,

    // Invocation policy, in seconds (compared against epoch-second deltas)
    pub command_delay: f64,
    pub vip_command_delay: f64,
    pub vote_delay: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let owner = env_str("TALLY_OWNER").unwrap_or_default();
        let channel = env_str("TALLY_CHANNEL").unwrap_or_default();

        if owner.trim().is_empty() {
            return Err(Error::Config(
                "TALLY_OWNER environment variable is required".to_string(),
            ));
        }
        if channel.trim().is_empty() {
            return Err(Error::Config(
                "TALLY_CHANNEL environment variable is required".to_string(),
            ));
        }

        let nickname = env_str("TALLY_NICKNAME").unwrap_or_else(|| owner.clone());
        let oauth_token = env_str("TALLY_OAUTH_TOKEN").unwrap_or_default();
        let client_id = env_str("TALLY_CLIENT_ID").unwrap_or_default();
        let client_secret = env_str("TALLY_CLIENT_SECRET").unwrap_or_default();

        let stats_path =
            PathBuf::from(env_str("TALLY_STATS_PATH").unwrap_or("stats.json".to_string()));

        let write_interval = Duration::from_secs(env_u64("TALLY_WRITE_INTERVAL_SECS").unwrap_or(60));
        let sweep_interval = Duration::from_secs(env_u64("TALLY_SWEEP_INTERVAL_SECS").unwrap_or(1));
        let chatter_interval =
            Duration::from_secs(env_u64("TALLY_CHATTER_INTERVAL_SECS").unwrap_or(5));

        let command_delay = env_u64("TALLY_COMMAND_DELAY_SECS").unwrap_or(30) as f64;
        let vip_command_delay = env_u64("TALLY_VIP_COMMAND_DELAY_SECS").unwrap_or(10) as f64;
        let vote_delay = env_u64("TALLY_VOTE_DELAY_SECS").unwrap_or(60) as f64;

        if vip_command_delay >= command_delay {
            return Err(Error::Config(format!(
                "VIP command delay ({vip_command_delay}s) must be shorter than the base delay ({command_delay}s)"
            )));
        }

        Ok(Self {
            owner,
            channel,
            nickname,
            oauth_token,
            client_id,
            client_secret,
            stats_path,
            write_interval,
            sweep_interval,
            chatter_interval,
            command_delay,
            vip_command_delay,
            vote_delay,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        owner: "owner".to_string(),
        channel: "channel".to_string(),
        nickname: "tallybot".to_string(),
        oauth_token: String::new(),
        client_id: String::new(),
        client_secret: String::new(),
        stats_path: PathBuf::from("/tmp/tally-test-stats.json"),
        write_interval: Duration::from_secs(60),
        sweep_interval: Duration::from_secs(1),
        chatter_interval: Duration::from_secs(5),
        command_delay: 30.0,
        vip_command_delay: 10.0,
        vote_delay: 60.0,
    }
}
