//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Total number of rolling-restart passes by outcome
    pub static ref ROLLS_TOTAL: CounterVec = register_counter_vec!(
        "kafka_roller_rolls_total",
        "Total number of rolling-restart passes by outcome",
        &["outcome"]
    ).unwrap();

    /// Duration of rolling-restart passes
    pub static ref ROLL_DURATION: HistogramVec = register_histogram_vec!(
        "kafka_roller_roll_duration_seconds",
        "Duration of rolling-restart passes in seconds",
        &["outcome"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    /// Total number of pod restarts performed by the roller
    pub static ref POD_RESTARTS_TOTAL: CounterVec = register_counter_vec!(
        "kafka_roller_pod_restarts_total",
        "Total number of pod restarts by namespace and pod",
        &["namespace", "pod"]
    ).unwrap();

    /// Total number of forced pod restarts (safety checks bypassed)
    pub static ref FORCED_RESTARTS_TOTAL: CounterVec = register_counter_vec!(
        "kafka_roller_forced_restarts_total",
        "Total number of forced pod restarts by namespace and pod",
        &["namespace", "pod"]
    ).unwrap();

    /// Total number of in-place dynamic configuration updates
    pub static ref DYNAMIC_UPDATES_TOTAL: CounterVec = register_counter_vec!(
        "kafka_roller_dynamic_updates_total",
        "Total number of dynamic configuration updates by namespace and pod",
        &["namespace", "pod"]
    ).unwrap();

    /// Admin connections currently open; zero whenever no pass is running
    pub static ref OPEN_ADMIN_CONNECTIONS: IntGauge = register_int_gauge!(
        "kafka_roller_open_admin_connections",
        "Number of currently open broker admin connections"
    ).unwrap();
}

/// Start the metrics HTTP server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" => ok_response(),
        "/readyz" | "/ready" => ok_response(),
        _ => not_found_response(),
    };

    Ok(response)
}

/// Generate metrics response
fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from("Failed to encode metrics")))
            .unwrap();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(Full::new(Bytes::from(buffer)))
        .unwrap()
}

/// Health/readiness check response
fn ok_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::from("ok")))
        .unwrap()
}

/// Not found response
fn not_found_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from("Not Found")))
        .unwrap()
}
