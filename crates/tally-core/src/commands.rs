use std::collections::HashMap;

use tokio::time::sleep;
use tracing::debug;

use crate::{
    bot::Bot,
    dice,
    domain::{Level, UserRecord},
    events::{Broadcast, Poll, VoteOutcome, POLL_SLOT},
    util::{epoch_secs, seconds_to_dhms, title_case},
    Result,
};

/// Spacing between consecutive promotion lines so the transport is not
/// hammered when a mod promotes a long list at once.
const PROMOTE_PACING: std::time::Duration = std::time::Duration::from_secs(1);

/// One user-invocable command: what it does, how to call it, and which
/// handler runs it.
pub struct Command {
    pub description: &'static str,
    pub usage: &'static str,
    kind: CommandKind,
}

/// Closed set of command handlers. Dispatch is a single match; there is no
/// open registration surface.
#[derive(Clone, Copy, Debug)]
enum CommandKind {
    Messages,
    Roll,
    FirstSighting,
    Bonk,
    BonkCount,
    Hug,
    HugCount,
    Points,
    Vote,
    CurrentPoll,
    CommandSheet,
    SetVips,
    StartPoll,
    StartBroadcast,
    SetMods,
}

impl Command {
    const fn new(kind: CommandKind, description: &'static str, usage: &'static str) -> Self {
        Self {
            description,
            usage,
            kind,
        }
    }

    pub(crate) async fn execute(&self, bot: &Bot, invoker: &UserRecord, args: &[&str]) -> Result<()> {
        debug!(command = ?self.kind, invoker = %invoker.name, "executing command");
        match self.kind {
            CommandKind::Messages => messages(bot, invoker).await,
            CommandKind::Roll => roll(bot, invoker, args).await,
            CommandKind::FirstSighting => first_sighting(bot, invoker).await,
            CommandKind::Bonk => bonk(bot, invoker, args).await,
            CommandKind::BonkCount => {
                count_reply(bot, invoker, |r| r.bonks, "has been 🔨bonked🔨", "times!").await
            }
            CommandKind::Hug => hug(bot, invoker, args).await,
            CommandKind::HugCount => {
                count_reply(bot, invoker, |r| r.hugs, "has been ❤hugged❤", "times!").await
            }
            CommandKind::Points => count_reply(bot, invoker, |r| r.points, "has", "points!").await,
            CommandKind::Vote => vote(bot, invoker, args).await,
            CommandKind::CurrentPoll => current_poll(bot).await,
            CommandKind::CommandSheet => command_sheet(bot).await,
            CommandKind::SetVips => set_levels(bot, args, Level::Vip).await,
            CommandKind::StartPoll => start_poll(bot, args).await,
            CommandKind::StartBroadcast => start_broadcast(bot, args).await,
            CommandKind::SetMods => set_levels(bot, args, Level::Mod).await,
        }
    }
}

/// The three permission-scoped lookup tables. Each privileged table is a
/// strict superset of the one below it.
pub struct CommandTables {
    base: HashMap<&'static str, Command>,
    moderator: HashMap<&'static str, Command>,
    owner: HashMap<&'static str, Command>,
}

impl CommandTables {
    pub fn new() -> Self {
        let base = base_commands();
        let mut moderator = base_commands();
        moderator.extend(mod_commands());
        let mut owner = base_commands();
        owner.extend(mod_commands());
        owner.extend(owner_commands());

        Self {
            base,
            moderator,
            owner,
        }
    }

    /// Table lookup for the invoker's level. Tokens are matched
    /// case-sensitively, prefix included.
    pub fn resolve(&self, level: Level, token: &str) -> Option<&Command> {
        let table = match level {
            Level::Owner => &self.owner,
            Level::Mod => &self.moderator,
            Level::Vip | Level::User => &self.base,
        };
        table.get(token)
    }
}

impl Default for CommandTables {
    fn default() -> Self {
        Self::new()
    }
}

fn base_commands() -> HashMap<&'static str, Command> {
    HashMap::from([
        (
            "!messages",
            Command::new(
                CommandKind::Messages,
                "Returns how many messages a user has sent",
                "!messages",
            ),
        ),
        (
            "!roll",
            Command::new(CommandKind::Roll, "Rolls a die of format #dSides", "!roll 2d20"),
        ),
        (
            "!first_sighting",
            Command::new(
                CommandKind::FirstSighting,
                "Gives the delta from the first time you were seen in chat",
                "!first_sighting",
            ),
        ),
        (
            "!bonk",
            Command::new(CommandKind::Bonk, "Bonks someone!", "!bonk [user]"),
        ),
        (
            "!bonked?",
            Command::new(
                CommandKind::BonkCount,
                "How many times have you been bonked?",
                "!bonked?",
            ),
        ),
        (
            "!hug",
            Command::new(CommandKind::Hug, "Hugs someone!", "!hug [user]"),
        ),
        (
            "!hugged?",
            Command::new(
                CommandKind::HugCount,
                "How many times have you been hugged?",
                "!hugged?",
            ),
        ),
        (
            "!points?",
            Command::new(CommandKind::Points, "How many points do you have?", "!points?"),
        ),
        (
            "!vote",
            Command::new(CommandKind::Vote, "Votes for a poll choice!", "!vote [choice]"),
        ),
        (
            "!current_poll",
            Command::new(
                CommandKind::CurrentPoll,
                "Gets the current poll information!",
                "!current_poll",
            ),
        ),
        (
            "!commands",
            Command::new(
                CommandKind::CommandSheet,
                "Returns a link to the current user command sheet! Try using ![command] help for more info",
                "!commands",
            ),
        ),
    ])
}

fn mod_commands() -> HashMap<&'static str, Command> {
    HashMap::from([
        (
            "!set_vips",
            Command::new(
                CommandKind::SetVips,
                "Sets user level to VIP.",
                "!set_vips [username1] [username2] ...",
            ),
        ),
        (
            "!start_poll",
            Command::new(
                CommandKind::StartPoll,
                "Starts a new poll",
                "!start_poll [This_is_a_title] [choice1],[choice2],... [duration]",
            ),
        ),
        (
            "!start_broadcast",
            Command::new(
                CommandKind::StartBroadcast,
                "Begins broadcasting a message after a certain delay",
                "!start_broadcast [message_goes_here] [delay] [repetitions]",
            ),
        ),
    ])
}

fn owner_commands() -> HashMap<&'static str, Command> {
    HashMap::from([(
        "!set_mods",
        Command::new(
            CommandKind::SetMods,
            "Sets bot mod level for all provided users.",
            "!set_mods [username1] [username2] ...",
        ),
    )])
}

// === Handlers ===

async fn messages(bot: &Bot, invoker: &UserRecord) -> Result<()> {
    let sent = bot
        .registry()
        .get(&invoker.name)
        .await
        .map(|r| r.messages_sent)
        .unwrap_or(0);
    bot.send(&format!(
        "@{}, you have sent {sent} messages.",
        invoker.name
    ))
    .await;
    Ok(())
}

async fn roll(bot: &Bot, invoker: &UserRecord, args: &[&str]) -> Result<()> {
    let raw = args.first().copied().unwrap_or("");
    match dice::parse_roll(raw) {
        Some(spec) => {
            bot.send(&format!("@{} rolled {}", invoker.name, dice::roll(spec)))
                .await;
        }
        None => {
            bot.send(&format!(
                "@{} sorry that wasn't a valid roll...{raw}",
                invoker.name
            ))
            .await;
        }
    }
    Ok(())
}

async fn first_sighting(bot: &Bot, invoker: &UserRecord) -> Result<()> {
    let first_seen = bot
        .registry()
        .get(&invoker.name)
        .await
        .map(|r| r.first_seen)
        .unwrap_or_else(epoch_secs);
    let elapsed = epoch_secs() - first_seen;
    bot.send(&format!(
        "@{} you were first seen {} ago! WOW!",
        invoker.name,
        seconds_to_dhms(elapsed)
    ))
    .await;
    Ok(())
}

async fn bonk(bot: &Bot, invoker: &UserRecord, args: &[&str]) -> Result<()> {
    target_command(bot, invoker, args, "bonked", |r| r.bonks += 1).await
}

async fn hug(bot: &Bot, invoker: &UserRecord, args: &[&str]) -> Result<()> {
    target_command(bot, invoker, args, "hugged", |r| r.hugs += 1).await
}

/// Shared shape of bonk/hug-style commands: increment a counter on a target
/// who must already exist in the registry.
async fn target_command<F>(
    bot: &Bot,
    invoker: &UserRecord,
    args: &[&str],
    verb: &str,
    increment: F,
) -> Result<()>
where
    F: FnOnce(&mut UserRecord),
{
    let target = args.first().copied().unwrap_or("");
    if bot.registry().contains(target).await {
        bot.registry().update(target, increment).await;
        bot.send(&format!("@{target} was {verb} by @{}!", invoker.name))
            .await;
    } else {
        bot.send(&format!(
            "Sorry {} @{target} either doesn't exist or hasn't chatted...they should fix that.",
            invoker.name
        ))
        .await;
    }
    Ok(())
}

async fn count_reply<F>(
    bot: &Bot,
    invoker: &UserRecord,
    get: F,
    description: &str,
    post: &str,
) -> Result<()>
where
    F: FnOnce(&UserRecord) -> u64,
{
    let count = bot
        .registry()
        .get(&invoker.name)
        .await
        .map(|r| get(&r))
        .unwrap_or(0);
    bot.send(&format!(
        "@{} {description} {count} {post}",
        invoker.name
    ))
    .await;
    Ok(())
}

async fn vote(bot: &Bot, invoker: &UserRecord, args: &[&str]) -> Result<()> {
    let choice = args.first().copied().unwrap_or("");

    let last_vote = bot
        .registry()
        .get(&invoker.name)
        .await
        .map(|r| r.last_vote)
        .unwrap_or(0.0);
    let now = epoch_secs();
    if now - last_vote <= bot.config().vote_delay {
        bot.send(&format!("@{} you already voted!", invoker.name))
            .await;
        return Ok(());
    }

    match bot.events().vote_for(POLL_SLOT, choice).await {
        VoteOutcome::Counted => {
            bot.registry()
                .update(&invoker.name, |r| r.last_vote = now)
                .await;
            bot.send(&format!(
                "Thank you @{} for voting for {choice}!",
                invoker.name
            ))
            .await;
        }
        VoteOutcome::NotAChoice | VoteOutcome::NoPoll => {
            bot.send(&format!("{choice} isn't in this poll...")).await;
        }
    }
    Ok(())
}

async fn current_poll(bot: &Bot) -> Result<()> {
    if let Some(status) = bot.events().status_line(POLL_SLOT).await {
        bot.send(&status).await;
    }
    Ok(())
}

async fn command_sheet(bot: &Bot) -> Result<()> {
    bot.send("All commands are on the command sheet! Try using ![command] help for more info.")
        .await;
    Ok(())
}

async fn set_levels(bot: &Bot, names: &[&str], level: Level) -> Result<()> {
    for name in names {
        if bot.registry().contains(name).await {
            bot.registry().set_level(name, level).await;
        } else {
            bot.registry()
                .upsert(UserRecord::with_level(*name, level))
                .await;
        }
        bot.send(&format!("/{} {name}", level.label())).await;
        bot.send(&format!(
            "@{name}, you are recognized as a {}!",
            level.label()
        ))
        .await;
        sleep(PROMOTE_PACING).await;
    }
    Ok(())
}

async fn start_poll(bot: &Bot, args: &[&str]) -> Result<()> {
    if args.len() < 3 {
        bot.send("You might want to try making that poll again...")
            .await;
        return Ok(());
    }

    let title = title_case(&args[0].replace('_', " "));
    let choices: Vec<String> = args[1]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let Ok(duration) = args[2].parse::<f64>() else {
        bot.send("You might want to try making that poll again...")
            .await;
        return Ok(());
    };

    if choices.is_empty() {
        bot.send("You might want to try making that poll again...")
            .await;
        return Ok(());
    }

    bot.add_poll(Poll::new(title, choices, duration, epoch_secs()))
        .await;
    Ok(())
}

async fn start_broadcast(bot: &Bot, args: &[&str]) -> Result<()> {
    if args.len() < 3 {
        bot.send("You might want to try making that broadcast again...")
            .await;
        return Ok(());
    }

    let message = args[0].replace('_', " ");
    let (Ok(delay), Ok(repetitions)) = (args[1].parse::<f64>(), args[2].parse::<u32>()) else {
        bot.send("You might want to try making that broadcast again...")
            .await;
        return Ok(());
    };

    let broadcast = Broadcast::new(message, delay, repetitions.max(1), false, epoch_secs());
    bot.add_broadcast(broadcast).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_tables_are_supersets() {
        let tables = CommandTables::new();
        for token in tables.base.keys() {
            assert!(tables.moderator.contains_key(token), "mod table missing {token}");
            assert!(tables.owner.contains_key(token), "owner table missing {token}");
        }
        for token in tables.moderator.keys() {
            assert!(tables.owner.contains_key(token), "owner table missing {token}");
        }
    }

    #[test]
    fn resolution_respects_permission_tiers() {
        let tables = CommandTables::new();

        assert!(tables.resolve(Level::User, "!roll").is_some());
        assert!(tables.resolve(Level::Vip, "!vote").is_some());
        assert!(tables.resolve(Level::User, "!start_poll").is_none());
        assert!(tables.resolve(Level::Mod, "!start_poll").is_some());
        assert!(tables.resolve(Level::Mod, "!set_mods").is_none());
        assert!(tables.resolve(Level::Owner, "!set_mods").is_some());
    }

    #[test]
    fn tokens_are_case_sensitive_and_prefixed() {
        let tables = CommandTables::new();
        assert!(tables.resolve(Level::User, "roll").is_none());
        assert!(tables.resolve(Level::User, "!Roll").is_none());
    }
}
