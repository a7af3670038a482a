//! NATS subscriptions for incoming scoring requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving requests from NATS.
///
/// Subscriptions join a queue group so replicas of the service share the load.
pub struct RequestConsumer {
    client: Client,
    queue_group: String,
}

impl RequestConsumer {
    pub fn new(client: Client, queue_group: &str) -> Self {
        Self {
            client,
            queue_group: queue_group.to_string(),
        }
    }

    /// Subscribe to a request subject within the queue group
    pub async fn subscribe(&self, subject: &str) -> Result<Subscriber> {
        let subscriber = self
            .client
            .queue_subscribe(subject.to_string(), self.queue_group.clone())
            .await?;
        info!(subject = %subject, queue_group = %self.queue_group, "Subscribed to request subject");
        Ok(subscriber)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
