use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ScrapeEnvelope, TaskUpdate};

/// How long a worker blocks on an empty list before polling again.
const DEQUEUE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode task payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Redis list used as the scrape task queue, plus per-task status keys.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    queue_key: String,
    status_ttl_secs: u64,
}

impl RedisBroker {
    pub fn new(client: redis::Client, queue_key: impl Into<String>, status_ttl_secs: u64) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
            status_ttl_secs,
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub fn status_key(&self, task_id: Uuid) -> String {
        format!("{}:status:{task_id}", self.queue_key)
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, BrokerError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Round-trips a PING to check the broker is reachable.
    pub async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    pub async fn enqueue(&self, envelope: &ScrapeEnvelope) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(envelope)?;
        let mut conn = self.conn().await?;
        let depth = redis::cmd("RPUSH")
            .arg(&self.queue_key)
            .arg(&payload)
            .query_async::<_, i64>(&mut conn)
            .await?;
        debug!(task_id = %envelope.task_id, depth, "Enqueued scrape task");
        Ok(())
    }

    /// Blocks up to five seconds for the next envelope. A payload that does
    /// not decode is logged and dropped.
    pub async fn dequeue(&self) -> Result<Option<ScrapeEnvelope>, BrokerError> {
        let mut conn = self.conn().await?;
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_key)
            .arg(DEQUEUE_TIMEOUT_SECS)
            .query_async(&mut conn)
            .await?;

        let Some((_key, payload)) = popped else {
            return Ok(None);
        };
        match decode_envelope(&payload) {
            Some(envelope) => {
                debug!(task_id = %envelope.task_id, "Dequeued scrape task");
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    pub async fn publish_status(&self, update: &TaskUpdate) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(update)?;
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(self.status_key(update.task_id))
            .arg(&payload)
            .arg("EX")
            .arg(self.status_ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn fetch_status(&self, task_id: Uuid) -> Result<Option<TaskUpdate>, BrokerError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.status_key(task_id))
            .query_async(&mut conn)
            .await?;
        Ok(raw.and_then(|payload| match serde_json::from_str(&payload) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!(%task_id, "Discarding unreadable status snapshot: {e}");
                None
            }
        }))
    }
}

fn decode_envelope(payload: &str) -> Option<ScrapeEnvelope> {
    match serde_json::from_str(payload) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("Dropping malformed scrape task payload: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::SearchParams;

    fn broker() -> RedisBroker {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        RedisBroker::new(client, "jobhound:test:tasks", 60)
    }

    #[test]
    fn test_status_key() {
        let id = Uuid::nil();
        assert_eq!(
            broker().status_key(id),
            "jobhound:test:tasks:status:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_decode_envelope() {
        let envelope = ScrapeEnvelope::new(SearchParams::new("data engineer"), None);
        let payload = serde_json::to_string(&envelope).unwrap();
        let decoded = decode_envelope(&payload).unwrap();
        assert_eq!(decoded.task_id, envelope.task_id);
        assert_eq!(decoded.params.search_term, "data engineer");

        assert!(decode_envelope("{\"task_id\": 42}").is_none());
        assert!(decode_envelope("not json").is_none());
    }
}
