//! Prometheus metrics for the controller, scraped over a tiny hyper server.
//! Mirrors the counters/histograms `clusters::reconcile` expects on
//! `ContextData::metrics` (`reconcile_counter`, `action_counter`,
//! `read_histogram`, `write_histogram`), built on the `prometheus` +
//! `hyper`/`hyper-util` stack declared for the `metrics` feature.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use lazy_static::lazy_static;
use owo_colors::OwoColorize;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use tokio::net::TcpListener;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

pub struct ControllerMetrics {
    pub reconcile_counter: IntCounterVec,
    pub action_counter: IntCounterVec,
    pub read_histogram: HistogramVec,
    pub write_histogram: HistogramVec,
}

impl ControllerMetrics {
    pub fn new(subsystem: &str) -> Self {
        let reconcile_counter = IntCounterVec::new(
            prometheus::Opts::new(
                format!("rss_{subsystem}_reconcile_total"),
                "Total number of reconciliation ticks run for a cluster",
            ),
            &["cluster", "namespace"],
        )
        .expect("valid reconcile_counter options");
        let action_counter = IntCounterVec::new(
            prometheus::Opts::new(
                format!("rss_{subsystem}_action_total"),
                "Total number of actions taken per cluster, by action kind",
            ),
            &["cluster", "namespace", "action"],
        )
        .expect("valid action_counter options");
        let read_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                format!("rss_{subsystem}_read_seconds"),
                "Time spent determining the action to take during a tick",
            ),
            &["cluster", "namespace", "action"],
        )
        .expect("valid read_histogram options");
        let write_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                format!("rss_{subsystem}_write_seconds"),
                "Time spent performing the action decided during a tick",
            ),
            &["cluster", "namespace", "action"],
        )
        .expect("valid write_histogram options");

        for c in [
            Box::new(reconcile_counter.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(action_counter.clone()),
            Box::new(read_histogram.clone()),
            Box::new(write_histogram.clone()),
        ] {
            // Registering the same subsystem twice (e.g. in tests) is harmless.
            let _ = REGISTRY.register(c);
        }

        ControllerMetrics {
            reconcile_counter,
            action_counter,
            read_histogram,
            write_histogram,
        }
    }
}

async fn serve(_req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    Ok(Response::new(Full::new(Bytes::from(buffer))))
}

/// Serves `/metrics` on `0.0.0.0:<port>` until the process exits.
pub async fn run_server(port: u16) {
    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", format!("❌ metrics server failed to bind {addr}: {e}").red());
            return;
        }
    };
    println!("{}", format!("📈 metrics server listening on {addr}").green());
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("{}", format!("❌ metrics server accept failed: {e}").red());
                continue;
            }
        };
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(e) = ConnBuilder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service_fn(serve))
                .await
            {
                eprintln!("{}", format!("❌ metrics connection error: {e}").red());
            }
        });
    }
}
