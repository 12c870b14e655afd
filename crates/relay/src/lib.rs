use async_trait::async_trait;
use audiopoll_core::{RelayConfig, SubmitMode};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

mod fields;

pub use fields::{build_fields, FieldOptions, FieldSet};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("relay answered with status {0}")]
    Status(u16),
}

/// Delivers a field set to whatever forwards it to the survey owner.
#[async_trait]
pub trait FeedbackRelay: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, fields: &FieldSet) -> Result<(), RelayError>;
}

/// Form POST to a hosted form relay. Redirects are not followed: a 3xx is
/// the relay accepting the submission and pointing at `_next`.
pub struct HttpRelay {
    client: Client,
    endpoint: Url,
}

impl HttpRelay {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RelayError> {
        let endpoint = Url::parse(endpoint).map_err(|e| RelayError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(cfg: &RelayConfig) -> Result<Self, RelayError> {
        Self::new(&cfg.endpoint, Duration::from_millis(cfg.timeout_ms))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl FeedbackRelay for HttpRelay {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn deliver(&self, fields: &FieldSet) -> Result<(), RelayError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .form(fields)
            .send()
            .await?;
        let status = resp.status();
        debug!(status = status.as_u16(), endpoint = %self.endpoint, "relay responded");
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(RelayError::Status(status.as_u16()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub destination: String,
}

pub struct FeedbackSubmitter {
    relay: Arc<dyn FeedbackRelay>,
    mode: SubmitMode,
    confirmation_url: String,
    in_flight: JoinSet<()>,
}

impl FeedbackSubmitter {
    pub fn new(relay: Arc<dyn FeedbackRelay>, mode: SubmitMode, confirmation_url: String) -> Self {
        Self {
            relay,
            mode,
            confirmation_url,
            in_flight: JoinSet::new(),
        }
    }

    /// In `AwaitAck` mode an error means the respondent stays on the form
    /// and may resubmit. `FireAndForget` always redirects.
    pub async fn submit(&mut self, fields: FieldSet) -> Result<Redirect, RelayError> {
        let redirect = Redirect {
            destination: self.confirmation_url.clone(),
        };
        match self.mode {
            SubmitMode::AwaitAck => {
                self.relay.deliver(&fields).await?;
                info!(relay = self.relay.name(), "feedback delivered");
            }
            SubmitMode::FireAndForget => {
                let relay = Arc::clone(&self.relay);
                self.in_flight.spawn(async move {
                    match relay.deliver(&fields).await {
                        Ok(()) => info!(relay = relay.name(), "feedback delivered"),
                        Err(err) => {
                            warn!(error = %err, relay = relay.name(), "feedback delivery failed")
                        }
                    }
                });
            }
        }
        Ok(redirect)
    }

    /// Waits up to `limit` for background deliveries, then aborts the rest.
    /// Returns how many were abandoned.
    pub async fn drain(&mut self, limit: Duration) -> usize {
        if self.in_flight.is_empty() {
            return 0;
        }
        info!(pending = self.in_flight.len(), "waiting for feedback deliveries");
        let in_flight = &mut self.in_flight;
        let finished = tokio::time::timeout(limit, async move {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if finished.is_ok() {
            return 0;
        }
        let abandoned = self.in_flight.len();
        warn!(abandoned, "feedback deliveries still in flight at shutdown");
        self.in_flight.abort_all();
        while self.in_flight.join_next().await.is_some() {}
        abandoned
    }
}
