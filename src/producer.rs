//! NATS replies to scoring requests

use anyhow::Result;
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes response bodies to the reply subject of a request
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reply to `request` with `body` as JSON. Requests without a reply
    /// subject are dropped with a warning.
    pub async fn reply<T: Serialize>(&self, request: &Message, body: &T) -> Result<()> {
        let Some(reply_to) = request.reply.clone() else {
            warn!(subject = %request.subject, "Request has no reply subject, dropping response");
            return Ok(());
        };

        let payload = serde_json::to_vec(body)?;
        let size = payload.len();

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(
            subject = %request.subject,
            reply_to = %reply_to,
            bytes = size,
            "Published reply"
        );

        Ok(())
    }

    /// Flush pending replies, used on shutdown
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await?;
        Ok(())
    }
}
