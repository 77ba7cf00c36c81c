//! Component J: the worker pool. A single producer task re-enqueues the full
//! sensor list onto a bounded FIFO at `sleep_main`; each of `threads` workers pops
//! with a timed wait, runs the Sensor Pipeline, and sleeps `sleep_worker`.

use std::sync::Arc;
use std::time::Duration;

use collector_core::pipeline::{SensorDescriptor, SensorPipeline};
use collector_core::sink::build_record;
use collector_core::store::MeasurementStore;

use crate::config::CollectorConfig;
use crate::probes::DeviceProbeSession;
use crate::shutdown::ShutdownHandle;
use crate::sinks::{bus::BusSink, http::HttpSink};

pub struct SharedState {
    pub config: CollectorConfig,
    pub store: MeasurementStore,
    pub http: HttpSink,
    pub shutdown: ShutdownHandle,
}

/// Spawns the producer task and the fixed-size worker pool; returns their join
/// handles so the caller can await a clean shutdown.
pub fn spawn(
    sensors: Vec<Arc<SensorDescriptor>>,
    state: Arc<SharedState>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let (tx, rx) = flume::bounded(sensors.len().max(1) * 2);

    let mut handles = Vec::new();

    let producer_sensors = sensors.clone();
    let producer_state = state.clone();
    handles.push(tokio::spawn(async move {
        run_producer(producer_sensors, tx, producer_state).await;
    }));

    for id in 0..state.config.threads {
        let rx = rx.clone();
        let worker_state = state.clone();
        let bus = match BusSink::new(&state.config.bus) {
            Ok(bus) => Arc::new(bus),
            Err(err) => {
                tracing::error!("worker {id}: failed to construct bus sink: {err:#}");
                continue;
            }
        };
        handles.push(tokio::spawn(async move {
            run_worker(id, rx, worker_state, bus).await;
        }));
    }

    handles
}

async fn run_producer(
    sensors: Vec<Arc<SensorDescriptor>>,
    tx: flume::Sender<Arc<SensorDescriptor>>,
    state: Arc<SharedState>,
) {
    loop {
        if state.shutdown.is_stopping() {
            break;
        }
        for sensor in &sensors {
            if tx.send_async(sensor.clone()).await.is_err() {
                return;
            }
        }
        tokio::time::sleep(state.config.sleep_main).await;
    }
}

async fn run_worker(
    id: usize,
    rx: flume::Receiver<Arc<SensorDescriptor>>,
    state: Arc<SharedState>,
    bus: Arc<BusSink>,
) {
    loop {
        if state.shutdown.is_stopping() {
            break;
        }

        let sensor = tokio::select! {
            res = rx.recv_async() => match res {
                Ok(sensor) => sensor,
                Err(_) => break,
            },
            () = tokio::time::sleep(Duration::from_secs(1)) => continue,
        };

        process_sensor(sensor, state.clone(), bus.clone()).await;
        tokio::time::sleep(state.config.sleep_worker).await;
    }

    bus.drain(state.config.max_kafka_fails).await;
    tracing::info!("worker {id} drained and exiting");
}

async fn process_sensor(sensor: Arc<SensorDescriptor>, state: Arc<SharedState>, bus: Arc<BusSink>) {
    let peer = sensor.peer.clone();
    let community = sensor.community.clone();
    let timeout = sensor.timeout;

    let session = tokio::task::spawn_blocking(move || {
        DeviceProbeSession::open(&peer, &community, timeout)
    })
    .await;

    let mut session = match session {
        Ok(Ok(session)) => session,
        Ok(Err(err)) => {
            tracing::error!(
                "sensor {}: aborted, session open failed: {err:#}",
                sensor.sensor_name
            );
            return;
        }
        Err(err) => {
            tracing::error!("sensor {}: worker task panicked: {err}", sensor.sensor_name);
            return;
        }
    };

    let now = unix_timestamp();
    let pipeline_sensor = sensor.clone();
    let pipeline_state = state.clone();
    let changed = tokio::task::spawn_blocking(move || {
        run_pipeline(&pipeline_sensor, &pipeline_state.store, &mut session, now)
    })
    .await;

    let changed = match changed {
        Ok(Ok(changed)) => changed,
        Ok(Err(err)) => {
            tracing::error!("sensor {}: tick failed: {err:#}", sensor.sensor_name);
            return;
        }
        Err(err) => {
            tracing::error!("sensor {}: worker task panicked: {err}", sensor.sensor_name);
            return;
        }
    };

    for measurement in changed {
        let record = build_record(&measurement);
        crate::sinks::publish(
            &record,
            measurement.publish_bus,
            measurement.publish_http,
            &bus,
            &state.http,
        )
        .await;
    }
}

fn run_pipeline(
    sensor: &SensorDescriptor,
    store: &MeasurementStore,
    session: &mut DeviceProbeSession,
    now: i64,
) -> anyhow::Result<Vec<collector_core::Measurement>> {
    let pipeline = SensorPipeline::new(store);
    pipeline.run(sensor, session, now).map_err(anyhow::Error::from)
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
