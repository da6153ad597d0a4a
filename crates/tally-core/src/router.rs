use tracing::{error, warn};

use crate::{
    bot::Bot,
    domain::{Level, UserRecord},
    util::epoch_secs,
};

/// Marker every command line must start with. A line without it never
/// reaches the router.
pub const COMMAND_PREFIX: char = '!';

/// Second-token keyword that redirects to the help path, matched
/// case-insensitively.
const HELP_KEYWORD: &str = "help";

/// Resolve and run one command line on behalf of `record`.
///
/// Policy order: effective level → cooldown (non-privileged only) → table
/// lookup → help redirect → handler. A handler error is logged here and goes
/// no further; one broken command must not take the process down.
pub(crate) async fn route(bot: &Bot, record: &UserRecord, text: &str) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some(&token) = tokens.first() else {
        return;
    };
    let args = &tokens[1..];

    let level = effective_level(&bot.config().owner, record);

    if matches!(level, Level::User | Level::Vip) {
        let delay = match level {
            Level::Vip => bot.config().vip_command_delay,
            _ => bot.config().command_delay,
        };
        let delta = epoch_secs() - record.last_command;
        if delta <= delay {
            warn!(user = %record.name, delta, "command suppressed by cooldown");
            send_delay_not_met(bot, record, level, delay - delta).await;
            return;
        }
    }

    let Some(command) = bot.tables().resolve(level, token) else {
        bot.send(&format!(
            "@{} that was an invalid command...",
            record.name
        ))
        .await;
        return;
    };

    if args
        .first()
        .is_some_and(|a| a.eq_ignore_ascii_case(HELP_KEYWORD))
    {
        bot.send(&format!(
            "Hey @{} here's your help: {} - {}",
            record.name, command.description, command.usage
        ))
        .await;
        return;
    }

    match command.execute(bot, record, args).await {
        Ok(()) => {
            let now = epoch_secs();
            bot.registry()
                .update(&record.name, |r| r.last_command = now)
                .await;
        }
        Err(e) => {
            error!(command = token, user = %record.name, error = %e, "command handler failed");
        }
    }
}

/// The owner is recognized by name regardless of what the stats file says;
/// everyone else is taken at their recorded level.
fn effective_level(owner: &str, record: &UserRecord) -> Level {
    if record.name == owner {
        Level::Owner
    } else {
        record.level
    }
}

async fn send_delay_not_met(bot: &Bot, record: &UserRecord, level: Level, remaining: f64) {
    let remaining = remaining.ceil() as i64;
    let line = if level == Level::Vip {
        format!(
            "@{} we know you're important but you cannot use a command again that soon! Wait {remaining} seconds",
            record.name
        )
    } else {
        format!(
            "@{} you cannot use a command again that soon! Wait {remaining} seconds",
            record.name
        )
    };
    bot.send(&line).await;
}
