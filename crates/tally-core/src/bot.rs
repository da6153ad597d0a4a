use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    chatters::ChatterMonitor,
    commands::CommandTables,
    config::Config,
    events::{BotEvent, Broadcast, EventTable, Poll, BROADCAST_SLOT, POLL_SLOT},
    persistence,
    ports::ChatTransport,
    registry::UserRegistry,
    router::{self, COMMAND_PREFIX},
    util::epoch_secs,
};

/// Composition root of the engine.
///
/// Owns the registry, the event table, the chatter cache and the command
/// tables, and exposes the narrow surface command handlers call back into
/// (`send`, `add_poll`, registry accessors). The transport stays behind its
/// port so the engine is fully drivable from tests.
pub struct Bot {
    cfg: Arc<Config>,
    transport: Arc<dyn ChatTransport>,
    registry: UserRegistry,
    events: EventTable,
    chatters: ChatterMonitor,
    tables: CommandTables,
    shutdown: CancellationToken,
}

impl Bot {
    /// Build the bot, loading (or seeding) persistent state from the stats
    /// path in `cfg`.
    pub fn new(cfg: Arc<Config>, transport: Arc<dyn ChatTransport>) -> Arc<Self> {
        let records = persistence::load_or_seed(&cfg.stats_path, &cfg.owner);
        Arc::new(Self {
            cfg,
            transport,
            registry: UserRegistry::new(records),
            events: EventTable::default(),
            chatters: ChatterMonitor::default(),
            tables: CommandTables::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn registry(&self) -> &UserRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    pub fn chatters(&self) -> &ChatterMonitor {
        &self.chatters
    }

    pub(crate) fn tables(&self) -> &CommandTables {
        &self.tables
    }

    /// Start the three background loops: persistence flush, event sweep and
    /// chatter refresh. Each runs until `shutdown` is signalled.
    pub fn spawn_loops(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            self.clone().spawn_writer_loop(),
            self.clone().spawn_sweep_loop(),
            self.clone().spawn_chatter_loop(),
        ]
    }

    /// Signal every background loop to exit after its current iteration.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.shutdown.cancel();
    }

    /// Entry point for inbound chat messages.
    ///
    /// A first-time sender gets a default record; every message bumps the
    /// sender's chat stamp and message counter; lines carrying the command
    /// prefix additionally go through the router.
    pub async fn handle_message(&self, display_name: &str, text: &str) {
        if display_name.is_empty() {
            return;
        }
        info!(user = display_name, text, "received message");

        let record = self.registry.ensure(display_name).await;

        if text.starts_with(COMMAND_PREFIX) {
            router::route(self, &record, text).await;
        }

        let now = epoch_secs();
        self.registry
            .update(display_name, |r| {
                r.last_chat = now;
                r.messages_sent += 1;
            })
            .await;
    }

    /// Deliver one line to the channel. A transport failure is logged and the
    /// engine proceeds; there is no retry and no delivery guarantee.
    pub async fn send(&self, text: &str) {
        if let Err(e) = self.transport.send(text).await {
            error!(error = %e, "failed to send message");
        }
    }

    /// Insert `event` into `slot`; false when the slot is occupied.
    pub async fn add_event(&self, slot: &str, event: BotEvent) -> bool {
        self.events.add(slot, event).await
    }

    pub async fn add_poll(&self, poll: Poll) {
        let title = poll.title.clone();
        if self.add_event(POLL_SLOT, BotEvent::Poll(poll)).await {
            self.send(&format!("Created a new poll for: {title}")).await;
        } else {
            self.send("There is already a poll running!").await;
        }
    }

    pub async fn add_broadcast(&self, broadcast: Broadcast) {
        if self
            .add_event(BROADCAST_SLOT, BotEvent::Broadcast(broadcast))
            .await
        {
            self.send("Broadcast scheduled!").await;
        } else {
            self.send("There is already a broadcast running!").await;
        }
    }

    /// One sweep tick: advance every event at time `now`, then send whatever
    /// the table produced with no lock held.
    pub async fn sweep_events(&self, now: f64) {
        let outbound = self.events.sweep(now, &self.registry).await;
        for line in outbound {
            self.send(&line).await;
        }
    }

    fn spawn_writer_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.cfg.write_interval);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = persistence::flush(&self.cfg.stats_path, &self.registry).await {
                            // Retried implicitly on the next interval.
                            error!(error = %e, "stats flush failed");
                        }
                    }
                }
            }
            info!("writer loop stopped");
        })
    }

    fn spawn_sweep_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.cfg.sweep_interval);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        self.sweep_events(epoch_secs()).await;
                    }
                }
            }
            info!("sweep loop stopped");
        })
    }

    fn spawn_chatter_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.cfg.chatter_interval);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        self.chatters.refresh(self.transport.as_ref()).await;
                    }
                }
            }
            info!("chatter loop stopped");
        })
    }
}
