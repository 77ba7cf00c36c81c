pub mod bus;
pub mod http;

use collector_core::sink::SinkRecord;

/// Component G's external half: a byte-oriented enqueue interface with
/// asynchronous delivery feedback. `collector-core` only serializes; publishing the
/// serialized line is entirely this trait's business; a failure here never
/// propagates back into the pipeline, it is only logged (§7 `SinkError`).
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn enqueue(&self, record: &SinkRecord) -> anyhow::Result<()>;
}

/// Publishes a changed Measurement to whichever of the bus/HTTP sinks its monitor
/// entry opted into. The two enqueues are independent: a failure on one never
/// affects the other (per the design note on sink fan-out).
pub async fn publish(
    record: &SinkRecord,
    publish_bus: bool,
    publish_http: bool,
    bus: &bus::BusSink,
    http: &http::HttpSink,
) {
    if publish_bus {
        if let Err(err) = bus.enqueue(record).await {
            tracing::error!("bus sink enqueue failed: {err:#}");
        }
    }
    if publish_http {
        if let Err(err) = http.enqueue(record).await {
            tracing::error!("http sink enqueue failed: {err:#}");
        }
    }
}
