//! Component M: the message-bus sink client. Backed by `rdkafka`, the exact library
//! the original collector linked against (`librdkafka`) — one producer per worker,
//! as the original spawned one `rd_kafka_t` per worker thread.

use std::time::Duration;

use anyhow::{Context, Result};
use collector_core::sink::SinkRecord;
use rdkafka::config::{ClientConfig, TopicConfig};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::config::BusConfig;

pub struct BusSink {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl BusSink {
    pub fn new(config: &BusConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.broker)
            .set("message.timeout.ms", &config.timeout.as_millis().to_string());

        for (key, value) in &config.passthrough {
            client_config.set(key, value);
        }

        if !config.topic_passthrough.is_empty() {
            let mut topic_config = TopicConfig::new();
            for (key, value) in &config.topic_passthrough {
                topic_config.set(key, value);
            }
            client_config.set_default_topic_config(topic_config);
        }

        let producer: FutureProducer = client_config
            .create()
            .context("constructing rdkafka producer")?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            send_timeout: config.timeout,
        })
    }

    /// Polls `rd_kafka_outq_len`'s moral equivalent — rdkafka's in-flight count —
    /// repeatedly while it's still decreasing, up to `max_fails` stagnant polls
    /// (the dead-broker heuristic from §5's graceful-drain design note).
    pub async fn drain(&self, max_fails: u32) {
        let mut last_len: i32 = self.producer.in_flight_count();
        let mut stagnant = 0u32;
        while last_len > 0 && stagnant < max_fails {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let len = self.producer.in_flight_count();
            if len >= last_len {
                stagnant += 1;
            } else {
                stagnant = 0;
            }
            last_len = len;
        }
        if last_len > 0 {
            tracing::warn!(
                "bus sink drain gave up with {last_len} messages still outstanding; broker likely dead"
            );
        }
    }
}

#[async_trait::async_trait]
impl super::Sink for BusSink {
    async fn enqueue(&self, record: &SinkRecord) -> Result<()> {
        let payload = record.to_line();
        let send_result = self
            .producer
            .send(
                FutureRecord::<(), _>::to(&self.topic).payload(&payload),
                Timeout::After(self.send_timeout),
            )
            .await;
        send_result
            .map(|_| ())
            .map_err(|(err, _)| anyhow::anyhow!("kafka delivery failed: {err}"))
    }
}
