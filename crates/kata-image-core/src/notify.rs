//! Downstream notification: tell images built `FROM` this one to rebuild.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{BuilderError, Result};
use crate::identity::Dependent;

/// Triggers a rebuild of one dependent image.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, built: &str, dependent: &Dependent) -> Result<()>;
}

/// Records the trigger in the log and nothing else.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, built: &str, dependent: &Dependent) -> Result<()> {
        info!(
            trigger = built,
            dependent = %dependent.key,
            image_name = %dependent.image_name,
            "dependent rebuild requested"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct NotifyBody<'a> {
    dependent: &'a str,
    image_name: &'a str,
    trigger: &'a str,
}

/// POSTs each trigger as JSON to a webhook.
pub struct HttpNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BuilderError::Config(format!("notify client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, built: &str, dependent: &Dependent) -> Result<()> {
        let body = NotifyBody {
            dependent: &dependent.key,
            image_name: &dependent.image_name,
            trigger: built,
        };
        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BuilderError::Publish(format!("POST {}: {e}", self.url)))?;

        if response.status().is_success() {
            info!(dependent = %dependent.key, url = %self.url, "dependent notified");
            Ok(())
        } else {
            Err(BuilderError::Publish(format!(
                "POST {} for {}: status {}",
                self.url,
                dependent.key,
                response.status()
            )))
        }
    }
}

/// Notify every dependent, returning how many succeeded.
///
/// A failed notification is logged and does not stop the others.
pub async fn notify_dependents(
    notifier: &dyn Notifier,
    built: &str,
    dependents: &[Dependent],
) -> usize {
    let mut notified = 0;
    for dependent in dependents {
        match notifier.notify(built, dependent).await {
            Ok(()) => notified += 1,
            Err(e) => warn!(dependent = %dependent.key, error = %e, "notification failed"),
        }
    }
    notified
}
