//! Progress transport: keeps a [`ReportSession`] fed with job updates until it
//! reaches a terminal state or the watcher is cancelled.
//!
//! Pull polls the status endpoint on a fixed interval. Push listens on the
//! progress event stream and drops back to pull if the stream breaks. Both
//! paths go through the same session methods.

use crate::{
    api::{ApiError, ReportApi, StreamEvent, ViewLink},
    config::{Config, TransportMode},
    progress::ProgressSnapshot,
    state::{Directive, ErrorView, ReportSession, ViewState},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What is being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// Job id; status and result come from the job endpoints.
    Job(String),
    /// Token-gated link; one endpoint answers both status and result.
    Link(ViewLink),
}

impl WatchTarget {
    pub fn job_id(&self) -> &str {
        match self {
            WatchTarget::Job(id) => id,
            WatchTarget::Link(link) => &link.job_id,
        }
    }
}

type Slots = HashMap<String, (u64, CancellationToken)>;

/// Tracks the live transport of each job. Acquiring a lease for a job that
/// already has one cancels the older lease first.
#[derive(Debug, Clone, Default)]
pub struct TransportRegistry {
    slots: Arc<Mutex<Slots>>,
    serial: Arc<AtomicU64>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn acquire(&self, job_id: &str, parent: &CancellationToken) -> TransportLease {
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let token = parent.child_token();
        let previous = self
            .lock()
            .insert(job_id.to_string(), (serial, token.clone()));
        if let Some((_, old)) = previous {
            info!(job_id, "replacing active transport");
            old.cancel();
        }
        TransportLease {
            job_id: job_id.to_string(),
            serial,
            token,
            registry: self.clone(),
        }
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// Exclusive right to run a transport for one job. Dropping it cancels the
/// transport and frees the slot.
#[derive(Debug)]
pub struct TransportLease {
    job_id: String,
    serial: u64,
    token: CancellationToken,
    registry: TransportRegistry,
}

impl TransportLease {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        self.token.cancel();
        let mut slots = self.registry.lock();
        if slots.get(&self.job_id).map(|(s, _)| *s) == Some(self.serial) {
            slots.remove(&self.job_id);
        }
    }
}

pub struct Watcher<A: ReportApi + ?Sized> {
    api: Arc<A>,
    registry: TransportRegistry,
    mode: TransportMode,
    poll_interval: Duration,
    initial_timeout: Duration,
    state_tx: watch::Sender<ViewState>,
}

impl<A: ReportApi + ?Sized> Watcher<A> {
    pub fn new(api: Arc<A>, cfg: &Config) -> Self {
        let (state_tx, _) = watch::channel(ViewState::Loading);
        Self {
            api,
            registry: TransportRegistry::new(),
            mode: cfg.transport.mode,
            poll_interval: Duration::from_millis(cfg.transport.poll_interval_ms.max(1)),
            initial_timeout: Duration::from_secs(cfg.api.initial_fetch_timeout_seconds.max(1)),
            state_tx,
        }
    }

    pub fn with_registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    /// View-state updates. Only actual changes are delivered.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    /// Runs the session to a terminal state, or until `cancel` fires or a
    /// newer watcher takes over the job. Returns the last view state.
    pub async fn watch(&self, target: Result<WatchTarget, ApiError>, cancel: CancellationToken) -> ViewState {
        let target = match target {
            Ok(target) => target,
            Err(err) => {
                let mut session = ReportSession::new("");
                session.fail(ErrorView::from_api(&err));
                self.publish(&session);
                return session.state().clone();
            }
        };

        let job_id = target.job_id().to_string();
        let lease = self.registry.acquire(&job_id, &cancel);
        let token = lease.token().clone();
        let mut session = ReportSession::new(job_id.clone());
        self.publish(&session);
        info!(job_id = %job_id, mode = ?self.mode, "watching report job");

        let initial = tokio::select! {
            _ = token.cancelled() => return session.state().clone(),
            outcome = tokio::time::timeout(self.initial_timeout, self.fetch(&target)) => {
                outcome.unwrap_or(Err(ApiError::Timeout {
                    seconds: self.initial_timeout.as_secs(),
                }))
            }
        };
        let mut directive = session.apply_initial(initial);
        if directive == Directive::FetchResult {
            directive = self.fetch_result_into(&target, &mut session, &token).await;
        }
        self.publish(&session);

        if directive != Directive::Stop && !session.is_terminal() {
            match (&target, self.mode) {
                (WatchTarget::Job(id), TransportMode::Push) => {
                    self.run_push(id, &target, &mut session, &token).await
                }
                _ => self.run_pull(&target, &mut session, &token).await,
            }
        }

        drop(lease);
        debug!(job_id = %job_id, state = session.state().name(), "watch finished");
        session.state().clone()
    }

    async fn run_pull(&self, target: &WatchTarget, session: &mut ReportSession, token: &CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(job_id = session.job_id(), "polling cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                _ = token.cancelled() => return,
                outcome = self.fetch(target) => outcome,
            };
            let mut directive = session.apply_tick(outcome);
            if directive == Directive::FetchResult {
                directive = self.fetch_result_into(target, session, token).await;
            }
            self.publish(session);

            if directive == Directive::Stop || session.is_terminal() {
                debug!(job_id = session.job_id(), state = session.state().name(), "polling stopped");
                return;
            }
        }
    }

    async fn run_push(
        &self,
        job_id: &str,
        target: &WatchTarget,
        session: &mut ReportSession,
        token: &CancellationToken,
    ) {
        let stream_token = token.child_token();
        let opened = tokio::select! {
            _ = token.cancelled() => return,
            opened = self.api.open_progress_stream(job_id, stream_token.clone()) => opened,
        };

        match opened {
            Ok(mut events) => loop {
                let next = tokio::select! {
                    _ = token.cancelled() => {
                        stream_token.cancel();
                        return;
                    }
                    next = events.recv() => next,
                };
                match next {
                    Some(Ok(StreamEvent::Progress(data))) => {
                        session.apply_progress(ProgressSnapshot::from_value(job_id, &data));
                        self.publish(session);
                    }
                    Some(Ok(StreamEvent::Complete(_))) => {
                        stream_token.cancel();
                        self.fetch_result_into(target, session, token).await;
                        self.publish(session);
                        if session.is_terminal() {
                            return;
                        }
                        debug!(job_id, "result not ready after complete event; polling");
                        break;
                    }
                    Some(Ok(StreamEvent::Error(message))) => {
                        stream_token.cancel();
                        session.fail(ErrorView::job_failed(Some(message.as_str())));
                        self.publish(session);
                        return;
                    }
                    Some(Ok(StreamEvent::Other { event, .. })) => {
                        debug!(job_id, event = %event, "ignoring stream event");
                    }
                    Some(Err(err)) => {
                        warn!(job_id, "progress stream error, falling back to polling: {err}");
                        break;
                    }
                    None => {
                        warn!(job_id, "progress stream closed early, falling back to polling");
                        break;
                    }
                }
            },
            Err(err) => {
                warn!(job_id, "could not open progress stream, falling back to polling: {err}");
            }
        }

        stream_token.cancel();
        if !session.is_terminal() {
            session.mark_reconnecting();
            self.publish(session);
            self.run_pull(target, session, token).await;
        }
    }

    async fn fetch_result_into(
        &self,
        target: &WatchTarget,
        session: &mut ReportSession,
        token: &CancellationToken,
    ) -> Directive {
        let outcome = tokio::select! {
            _ = token.cancelled() => return Directive::Stop,
            outcome = self.fetch_result(target) => outcome,
        };
        session.apply_result(outcome)
    }

    async fn fetch(&self, target: &WatchTarget) -> Result<Value, ApiError> {
        match target {
            WatchTarget::Job(id) => self.api.fetch_status(id).await,
            WatchTarget::Link(link) => self.api.view_report(link).await,
        }
    }

    async fn fetch_result(&self, target: &WatchTarget) -> Result<Value, ApiError> {
        match target {
            WatchTarget::Job(id) => self.api.fetch_result(id).await,
            WatchTarget::Link(link) => self.api.view_report(link).await,
        }
    }

    fn publish(&self, session: &ReportSession) {
        let next = session.state();
        self.state_tx.send_if_modified(|current| {
            if current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
    }
}
