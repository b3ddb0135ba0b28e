//! Real-time event feed.
//!
//! An [`EventSource`] yields [`FeedEvent`]s which are rendered through the
//! matching template and submitted to the [`NotificationService`]. When the
//! source fails, the feed reconnects with exponential backoff and gives up
//! after the configured number of consecutive failed attempts.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use agencia_check_core::Money;

use crate::tasks::{BackgroundTasks, TaskKind};

use super::{NotificationService, TemplateId, TemplateVars};

/// Errors reported by an event source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Could not establish the connection.
    #[error("connection failed: {0}")]
    Connect(String),
    /// An established connection broke.
    #[error("connection lost: {0}")]
    Disconnected(String),
}

/// An event pushed by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    SaleCreated { sale_id: u32, value: Money },
    PaymentReceived { sale_id: u32, value: Money, method: String },
    LowStock { product: String, quantity: u32, min_quantity: u32 },
    ResellerRegistered { name: String },
    SystemAlert { message: String },
}

impl FeedEvent {
    /// Template and variables for this event.
    #[must_use]
    pub fn to_template(&self) -> (TemplateId, TemplateVars) {
        match self {
            Self::SaleCreated { sale_id, value } => (
                TemplateId::SaleCreated,
                TemplateVars::new()
                    .with("sale_id", sale_id)
                    .with("value", value.to_brl()),
            ),
            Self::PaymentReceived {
                sale_id,
                value,
                method,
            } => (
                TemplateId::PaymentReceived,
                TemplateVars::new()
                    .with("sale_id", sale_id)
                    .with("value", value.to_brl())
                    .with("method", method),
            ),
            Self::LowStock {
                product,
                quantity,
                min_quantity,
            } => (
                TemplateId::LowStock,
                TemplateVars::new()
                    .with("product", product)
                    .with("quantity", quantity)
                    .with("min_quantity", min_quantity),
            ),
            Self::ResellerRegistered { name } => (
                TemplateId::ResellerRegistered,
                TemplateVars::new().with("name", name),
            ),
            Self::SystemAlert { message } => (
                TemplateId::SystemAlert,
                TemplateVars::new().with("message", message),
            ),
        }
    }
}

/// A source of feed events.
pub trait EventSource: Send + 'static {
    /// Establish (or re-establish) the connection.
    fn connect(&mut self) -> impl Future<Output = Result<(), FeedError>> + Send;

    /// Wait for the next tick. `Ok(None)` means the tick produced nothing.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<FeedEvent>, FeedError>> + Send;
}

/// Emits a random event with probability `probability` on every tick.
#[derive(Debug)]
pub struct SimulatedEventSource {
    tick: Duration,
    probability: f64,
    rng: StdRng,
}

impl SimulatedEventSource {
    /// Create a source ticking every `tick`.
    #[must_use]
    pub fn new(tick: Duration, probability: f64) -> Self {
        Self {
            tick,
            probability: probability.clamp(0.0, 1.0),
            rng: StdRng::from_os_rng(),
        }
    }

    fn random_event(&mut self) -> FeedEvent {
        const PRODUCTS: [&str; 3] = ["Kit Check Básico", "Kit Check Premium", "Capa Protetora"];
        const METHODS: [&str; 3] = ["PIX", "cartão de crédito", "boleto"];
        const NAMES: [&str; 3] = ["Ana Souza", "Bruno Lima", "Carla Dias"];

        let pick = |rng: &mut StdRng, items: &[&str; 3]| {
            items
                .get(rng.random_range(0..items.len()))
                .copied()
                .unwrap_or_default()
                .to_string()
        };

        match self.rng.random_range(0..5_u8) {
            0 => FeedEvent::SaleCreated {
                sale_id: self.rng.random_range(1000..10_000),
                value: Money::from_cents(self.rng.random_range(2_000..50_000)),
            },
            1 => FeedEvent::PaymentReceived {
                sale_id: self.rng.random_range(1000..10_000),
                value: Money::from_cents(self.rng.random_range(2_000..50_000)),
                method: pick(&mut self.rng, &METHODS),
            },
            2 => FeedEvent::LowStock {
                product: pick(&mut self.rng, &PRODUCTS),
                quantity: self.rng.random_range(0..5),
                min_quantity: 5,
            },
            3 => FeedEvent::ResellerRegistered {
                name: pick(&mut self.rng, &NAMES),
            },
            _ => FeedEvent::SystemAlert {
                message: "Uso de memória acima de 80%".to_string(),
            },
        }
    }
}

impl EventSource for SimulatedEventSource {
    async fn connect(&mut self) -> Result<(), FeedError> {
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        tokio::time::sleep(self.tick).await;
        if self.rng.random_bool(self.probability) {
            Ok(Some(self.random_event()))
        } else {
            Ok(None)
        }
    }
}

/// Replays a fixed script. Once the events run out, `next_event` reports a
/// disconnect.
#[derive(Debug, Default)]
pub struct ScriptedEventSource {
    connects: VecDeque<Result<(), FeedError>>,
    events: VecDeque<Result<Option<FeedEvent>, FeedError>>,
    connect_calls: Arc<AtomicUsize>,
}

impl ScriptedEventSource {
    /// Empty script: connections succeed, no events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `connect` call. Unscripted calls succeed.
    #[must_use]
    pub fn connect_result(mut self, result: Result<(), FeedError>) -> Self {
        self.connects.push_back(result);
        self
    }

    /// Make the next `count` connects fail.
    #[must_use]
    pub fn failing_connects(mut self, count: usize) -> Self {
        for attempt in 0..count {
            self.connects
                .push_back(Err(FeedError::Connect(format!("scripted failure {attempt}"))));
        }
        self
    }

    /// Queue an event.
    #[must_use]
    pub fn event(mut self, event: FeedEvent) -> Self {
        self.events.push_back(Ok(Some(event)));
        self
    }

    /// Queue an error from `next_event`.
    #[must_use]
    pub fn disconnect(mut self, reason: &str) -> Self {
        self.events
            .push_back(Err(FeedError::Disconnected(reason.to_string())));
        self
    }

    /// Shared counter of `connect` calls.
    #[must_use]
    pub fn connect_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connect_calls)
    }
}

impl EventSource for ScriptedEventSource {
    async fn connect(&mut self) -> Result<(), FeedError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connects.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        tokio::task::yield_now().await;
        self.events
            .pop_front()
            .unwrap_or_else(|| Err(FeedError::Disconnected("script exhausted".into())))
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Gave up after too many failed reconnects.
    Failed,
}

/// Drives an [`EventSource`] into the notification service.
pub struct RealtimeFeed<S> {
    source: S,
    notifications: NotificationService,
    base_delay: Duration,
    max_attempts: u32,
    status: watch::Sender<FeedStatus>,
}

impl<S: EventSource> RealtimeFeed<S> {
    /// Create a feed; nothing runs until [`RealtimeFeed::run`] or
    /// [`RealtimeFeed::spawn`].
    pub fn new(
        source: S,
        notifications: NotificationService,
        base_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        let (status, _) = watch::channel(FeedStatus::Disconnected);
        Self {
            source,
            notifications,
            base_delay,
            max_attempts,
            status,
        }
    }

    /// Watch the connection state.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    /// Delay before reconnect `attempt` (0-based): `base * 2^attempt`.
    #[must_use]
    pub fn backoff(base: Duration, attempt: u32) -> Duration {
        base.saturating_mul(2_u32.saturating_pow(attempt))
    }

    fn set_status(&self, status: FeedStatus) {
        self.status.send_replace(status);
    }

    /// Run until cancelled or until reconnecting fails `max_attempts` times
    /// in a row. Returns the final status.
    pub async fn run(mut self, shutdown: CancellationToken) -> FeedStatus {
        let mut attempt: u32 = 0;

        loop {
            self.set_status(if attempt == 0 {
                FeedStatus::Connecting
            } else {
                FeedStatus::Reconnecting { attempt }
            });

            match self.source.connect().await {
                Ok(()) => {
                    attempt = 0;
                    self.set_status(FeedStatus::Connected);
                    tracing::info!("Real-time feed connected");

                    loop {
                        let next = tokio::select! {
                            () = shutdown.cancelled() => None,
                            next = self.source.next_event() => Some(next),
                        };
                        let Some(next) = next else {
                            self.set_status(FeedStatus::Disconnected);
                            return FeedStatus::Disconnected;
                        };
                        match next {
                            Ok(Some(event)) => {
                                let (template, vars) = event.to_template();
                                if let Err(e) = self.notifications.notify(template, &vars).await {
                                    tracing::warn!(error = %e, "Failed to deliver feed event");
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "Real-time feed lost connection");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Real-time feed connection failed");
                }
            }

            if attempt >= self.max_attempts {
                tracing::error!(
                    attempts = self.max_attempts,
                    "Real-time feed giving up after repeated failures"
                );
                self.set_status(FeedStatus::Failed);
                return FeedStatus::Failed;
            }

            let delay = Self::backoff(self.base_delay, attempt);
            attempt += 1;
            self.set_status(FeedStatus::Reconnecting { attempt });
            tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting real-time feed");

            tokio::select! {
                () = shutdown.cancelled() => {
                    self.set_status(FeedStatus::Disconnected);
                    return FeedStatus::Disconnected;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run on the background task registry. Returns the status receiver.
    pub fn spawn(self, tasks: &BackgroundTasks) -> watch::Receiver<FeedStatus> {
        let status = self.status();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("realtime_feed", TaskKind::Listener, async move {
            let final_status = self.run(shutdown).await;
            tracing::info!(status = ?final_status, "Real-time feed stopped");
        });
        status
    }
}
