//! Periodic driver for the aggregator.
//!
//! `start` kicks one pass immediately and then one per polling interval.
//! Accepted batches are delivered on an unbounded channel in pass order,
//! tagged with the generation of the `start` that produced them.
//! `stop` prevents future passes; a pass already in flight still commits.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::aggregator::{Aggregator, PassOutcome};
use crate::config::Config;
use crate::domain::Post;
use crate::provider::FetchError;

/// Posts accepted by one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Bumped on every `start`; earlier generations predate a restart.
    pub generation: u64,
    pub posts: Vec<Post>,
}

pub struct PollScheduler {
    aggregator: Arc<Mutex<Aggregator>>,
    config: Config,
    last_error: Arc<StdMutex<Option<FetchError>>>,
    batches: mpsc::UnboundedSender<Batch>,
    stop_tx: Option<watch::Sender<bool>>,
    generation: u64,
}

impl PollScheduler {
    pub fn new(aggregator: Aggregator, config: Config) -> (Self, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            aggregator: Arc::new(Mutex::new(aggregator)),
            config,
            last_error: Arc::new(StdMutex::new(None)),
            batches: tx,
            stop_tx: None,
            generation: 0,
        };
        (scheduler, rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True while a poll loop is alive. The loop also ends on its own when
    /// the batch receiver is dropped.
    pub fn is_running(&self) -> bool {
        self.stop_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Generation of the current (or most recent) start.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Message of the most recent failed pass, until a pass accepts something.
    pub fn last_error(&self) -> Option<FetchError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of every post accepted since the last start.
    pub async fn history(&self) -> Vec<Post> {
        self.aggregator.lock().await.history().to_vec()
    }

    /// Reset history and begin polling. No-op when already running.
    pub async fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.aggregator.lock().await.reset();
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);
        self.generation += 1;

        info!(
            interval = %crate::config::PollingConfig::format_interval(self.config.polling.interval_secs()),
            provider = %self.config.provider.kind,
            "Polling started"
        );

        tokio::spawn(poll_loop(
            self.aggregator.clone(),
            self.config.clone(),
            self.last_error.clone(),
            self.batches.clone(),
            self.generation,
            stop_rx,
        ));
    }

    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
            info!("Polling stopped");
        }
    }

    /// Swap in a new config. A running scheduler restarts with a full reset.
    pub async fn apply_config(&mut self, config: Config) {
        let was_running = self.is_running();
        self.stop();

        self.aggregator
            .lock()
            .await
            .set_credentials(config.provider.credential_set());
        self.config = config;

        if was_running {
            self.start().await;
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    aggregator: Arc<Mutex<Aggregator>>,
    config: Config,
    last_error: Arc<StdMutex<Option<FetchError>>>,
    batches: mpsc::UnboundedSender<Batch>,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut timer = interval(config.polling.interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = timer.tick() => {}
        }

        let outcome = {
            let mut aggregator = aggregator.lock().await;
            // Stopped while waiting for the lock; the aggregator may already
            // belong to a newer start.
            if *stop_rx.borrow() {
                break;
            }
            aggregator.run_pass(&config).await
        };
        record_outcome(&last_error, &outcome);

        if outcome.accepted.is_empty() {
            continue;
        }
        let batch = Batch {
            generation,
            posts: outcome.accepted,
        };
        if batches.send(batch).is_err() {
            warn!("Batch receiver dropped, stopping poll loop");
            break;
        }
    }
}

/// A pass that accepted posts clears the error; a pass that failed sets it.
fn record_outcome(last_error: &StdMutex<Option<FetchError>>, outcome: &PassOutcome) {
    let mut slot = last_error.lock().unwrap_or_else(PoisonError::into_inner);
    if !outcome.accepted.is_empty() {
        *slot = None;
    }
    if let Some(e) = &outcome.error {
        *slot = Some(e.clone());
    }
}
