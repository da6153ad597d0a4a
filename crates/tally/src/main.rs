use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tally_core::{bot::Bot, config::Config};
use tally_twitch::HelixTransport;

/// Inbound delivery stand-in: each stdin line of the form `name: text` is
/// forwarded to the bot as a chat message from `name`. The real delivery
/// callback of a chat connection plugs into the same `handle_message` entry
/// point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tally_core::logging::init("tally")?;

    let cfg = Arc::new(Config::load()?);
    let transport = HelixTransport::connect(&cfg).await?;
    let bot = Bot::new(cfg.clone(), transport);

    info!(
        owner = %cfg.owner,
        channel = %cfg.channel,
        users = bot.registry().len().await,
        "tally started"
    );

    let handles = bot.spawn_loops();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let Some((name, text)) = line.split_once(':') else {
                            warn!(line = %line, "ignoring malformed inbound line");
                            continue;
                        };
                        bot.handle_message(name.trim(), text.trim()).await;
                    }
                    Ok(None) => break, // stdin closed
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        }
    }

    bot.shutdown();
    for handle in handles {
        let _ = handle.await;
    }

    // Final flush so nothing since the last interval is lost.
    if let Err(e) = tally_core::persistence::flush(&cfg.stats_path, bot.registry()).await {
        warn!(error = %e, "final stats flush failed");
    }

    Ok(())
}
