//! Notifications about state changes.
//!
//! The engine calls a [`Notifier`] after every committed change, from a
//! detached task. Delivery problems are recorded and logged, never returned.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::TravelerId;
use crate::status::StatusProjector;
use crate::store::travelers::{self, WebhookRun};
use crate::store::{Store, StoreError};

/// Why a notification is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    Checkin,
    Checkout,
    Update,
    Undo,
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, traveler: TravelerId, reason: NotifyReason) -> impl Future<Output = ()> + Send;
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn notify(&self, traveler: TravelerId, reason: NotifyReason) {
        debug!(%traveler, ?reason, "notification dropped");
    }
}

/// Longest response excerpt kept in the delivery record.
const MAX_OUTPUT: usize = 500;

/// Posts the traveler's status to their configured webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    store: Store,
    projector: StatusProjector,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(store: Store, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            projector: StatusProjector::new(store.clone()),
            store,
            http,
        })
    }

    async fn deliver(&self, traveler: TravelerId, reason: NotifyReason) -> Result<(), StoreError> {
        let hook = {
            let mut conn = self.store.conn().await?;
            travelers::webhook(&mut conn, traveler).await?
        };
        let Some(hook) = hook.filter(|h| h.enabled) else {
            return Ok(());
        };

        let status = self.projector.for_traveler(traveler, Utc::now()).await?;
        let body = json!({ "reason": reason, "status": status });

        let mut request = self.http.post(&hook.url).json(&body);
        if let Some(token) = &hook.token {
            request = request.bearer_auth(token);
        }

        let run = match request.send().await {
            Ok(response) => {
                let code = response.status();
                let text = response.text().await.unwrap_or_default();
                WebhookRun {
                    at: Utc::now(),
                    errored: !code.is_success(),
                    output: excerpt(&format!("{code} {text}")),
                }
            }
            Err(e) => WebhookRun {
                at: Utc::now(),
                errored: true,
                output: excerpt(&e.to_string()),
            },
        };

        if run.errored {
            warn!(%traveler, output = %run.output, "webhook delivery failed");
        }

        let mut conn = self.store.conn().await?;
        travelers::record_webhook_run(&mut conn, traveler, &run).await
    }
}

fn excerpt(s: &str) -> String {
    s.chars().take(MAX_OUTPUT).collect()
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, traveler: TravelerId, reason: NotifyReason) {
        if let Err(e) = self.deliver(traveler, reason).await {
            warn!(%traveler, error = %e, "webhook bookkeeping failed");
        }
    }
}

/// Remembers every notification, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(TravelerId, NotifyReason)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(TravelerId, NotifyReason)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `n` notifications arrived, or give up after a
    /// second.
    pub async fn wait_for(&self, n: usize) -> Vec<(TravelerId, NotifyReason)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    async fn notify(&self, traveler: TravelerId, reason: NotifyReason) {
        self.sent.lock().unwrap().push((traveler, reason));
    }
}
