// src/status/poller.rs
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::models::status::LiveStatus;
use crate::status::source::StatusSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.poll_retries,
            delay: config.poll_retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 2, delay: Duration::from_secs(2) }
    }
}

/// Live status of one listing, refreshed by a task this poller owns.
///
/// The first query goes out as soon as the poller is created. A failed query
/// or an offline answer is retried with a fixed delay until the policy runs
/// out; the poller then settles on offline with zero players. Dropping the
/// poller cancels any pending retry and nothing is published afterwards.
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    policy: RetryPolicy,
    address: String,
    state: Arc<watch::Sender<LiveStatus>>,
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl StatusPoller {
    pub fn spawn(source: Arc<dyn StatusSource>, address: &str, policy: RetryPolicy) -> Self {
        let (tx, _) = watch::channel(LiveStatus::loading());
        let state = Arc::new(tx);
        let active = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(poll(
            source.clone(),
            address.to_string(),
            policy,
            state.clone(),
            active.clone(),
        ));
        Self {
            source,
            policy,
            address: address.to_string(),
            state,
            active,
            task,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn current(&self) -> LiveStatus {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveStatus> {
        self.state.subscribe()
    }

    /// Waits until the running sequence has settled.
    pub async fn settled(&self) -> LiveStatus {
        let mut rx = self.subscribe();
        if let Ok(status) = rx.wait_for(|s| !s.is_loading).await {
            return *status;
        }
        self.current()
    }

    /// Points the poller at a new address: the old sequence is cancelled and
    /// a fresh one starts from the loading state.
    pub fn set_address(&mut self, address: &str) {
        if address == self.address {
            return;
        }
        self.stop();
        self.address = address.to_string();
        self.active = Arc::new(AtomicBool::new(true));
        self.state.send_replace(LiveStatus::loading());
        self.task = tokio::spawn(poll(
            self.source.clone(),
            self.address.clone(),
            self.policy,
            self.state.clone(),
            self.active.clone(),
        ));
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.task.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll(
    source: Arc<dyn StatusSource>,
    address: String,
    policy: RetryPolicy,
    state: Arc<watch::Sender<LiveStatus>>,
    active: Arc<AtomicBool>,
) {
    let mut attempt = 0;
    let status = loop {
        match source.fetch(&address).await {
            Ok(sample) if sample.online => break LiveStatus::settled(&sample),
            Ok(_) => debug!("{} reported offline (attempt {})", address, attempt + 1),
            Err(e) => warn!("Error fetching status for {} (attempt {}): {}", address, attempt + 1, e),
        }
        if attempt >= policy.retries {
            break LiveStatus::offline();
        }
        attempt += 1;
        tokio::time::sleep(policy.delay).await;
    };

    if active.load(Ordering::Acquire) {
        state.send_replace(status);
    }
}
