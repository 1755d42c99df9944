//! ParishKit smoke harness.
//!
//! Drives the offline cache worker against a live origin: installs the
//! parish asset manifest, activates, then reports where each probe request
//! was served from. Point it at a running site (the Django dev server by
//! default) and optionally pull the plug to watch the offline path.
//!
//! ```text
//! parishkit-smoke [--origin URL] [--state-dir PATH] [PROBE_PATH ...]
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use parishkit_net::{HttpFetcher, Request};
use parishkit_sw::{CacheStorage, Manifest, OfflineWorker, WorkerConfig};

/// The parish site's install-time manifest.
const MANIFEST: [&str; 5] = [
    "/",
    "/static/images/church.png",
    "/static/css/style.css",
    "/static/js/main.js",
    "/static/offline.html",
];

/// Offline fallback page within the manifest.
const FALLBACK: &str = "/static/offline.html";

/// Default probe paths: one cached asset, one dynamic page.
const DEFAULT_PROBES: [&str; 2] = ["/static/css/style.css", "/members/"];

struct Args {
    origin: Url,
    state_dir: Option<PathBuf>,
    probes: Vec<String>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut origin = Url::parse("http://127.0.0.1:8000").expect("default origin");
        let mut state_dir = None;
        let mut probes = Vec::new();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--origin" => {
                    let value = args.next().ok_or("--origin needs a URL")?;
                    origin = Url::parse(&value).map_err(|e| format!("bad origin {value:?}: {e}"))?;
                }
                "--state-dir" => {
                    let value = args.next().ok_or("--state-dir needs a path")?;
                    state_dir = Some(PathBuf::from(value));
                }
                "--help" | "-h" => {
                    return Err("usage: parishkit-smoke [--origin URL] [--state-dir PATH] [PROBE_PATH ...]".into());
                }
                probe if probe.starts_with('/') => probes.push(probe.to_string()),
                other => return Err(format!("unexpected argument {other:?}")),
            }
        }

        if probes.is_empty() {
            probes = DEFAULT_PROBES.iter().map(|p| p.to_string()).collect();
        }

        Ok(Self {
            origin,
            state_dir,
            probes,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let storage = match &args.state_dir {
        Some(dir) => CacheStorage::persistent(dir)?,
        None => CacheStorage::new(),
    };
    let storage = Arc::new(RwLock::new(storage));

    let manifest = Manifest::new(MANIFEST, FALLBACK)?;
    let config = WorkerConfig::new("parish-mkw", 1, args.origin.clone(), manifest);
    let fetcher = Arc::new(HttpFetcher::new()?);
    let (worker, mut signals) = OfflineWorker::new(config, storage, fetcher);

    info!(origin = %args.origin, cache = %worker.cache_name(), "installing manifest");
    worker.install().await?;
    worker.activate().await?;
    while let Ok(signal) = signals.try_recv() {
        info!(?signal, "host signal");
    }

    for probe in &args.probes {
        let request = Request::get(args.origin.join(probe)?);
        match worker.handle_fetch(&request).await {
            Ok(outcome) => info!(
                probe = %probe,
                served_from = ?outcome.served_from,
                status = %outcome.response.status,
                bytes = outcome.response.body.len(),
                "probe served"
            ),
            Err(e) => error!(probe = %probe, error = %e, "probe failed"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "smoke run failed");
            ExitCode::FAILURE
        }
    }
}
