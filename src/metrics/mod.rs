
use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref RECONCILE_PASSES: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_passes", "completed reconciliation passes"),
        &["discovery_id"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_failures", "reconciliation passes aborted by an error"),
        &["discovery_id"]
    )
    .expect("metric can not be created");

    pub static ref UPSTREAMS_INSERTED: IntCounterVec = IntCounterVec::new(
        Opts::new("upstreams_inserted", "upstream records inserted by discovery"),
        &["discovery_id"]
    )
    .expect("metric can not be created");

    pub static ref UPSTREAMS_DELETED: IntCounterVec = IntCounterVec::new(
        Opts::new("upstreams_deleted", "upstream records deleted by discovery"),
        &["discovery_id"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("change_events_published", "change events handed to the dispatcher"),
        &["group", "type"]
    )
    .expect("metric can not be created");

    pub static ref EVENTS_DROPPED: IntCounter = IntCounter::new(
        "change_events_dropped",
        "change events dropped because the dispatch queue was full or closed"
    )
    .expect("metric can not be created");

    pub static ref CONNECTOR_LIFECYCLE: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_connector_lifecycle", "registry connector init/close calls"),
        &["register_type", "action"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_DISCOVERIES: IntGauge =
        IntGauge::new("active_discoveries", "discovery registrations currently cached")
            .expect("metric can not be created");
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILE_PASSES.clone()),
        Box::new(RECONCILE_FAILURES.clone()),
        Box::new(UPSTREAMS_INSERTED.clone()),
        Box::new(UPSTREAMS_DELETED.clone()),
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(CONNECTOR_LIFECYCLE.clone()),
        Box::new(ACTIVE_DISCOVERIES.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `/metrics` until `shutdown_signal` fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let registry = match Registry::new_custom(Some("discovery".to_string()), None) {
        Ok(r) => r,
        Err(e) => {
            error!("metrics registry can not be created: {}", e);
            return;
        }
    };
    register_custom_metrics(&registry);

    let metrics_route = warp::path!("metrics")
        .map(move || registry.clone())
        .and_then(metrics_handler);

    info!("metrics server listening on port {}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    Ok(res)
}
