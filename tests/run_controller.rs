
use std::sync::Arc;

use volley::app::{RunController, RunReport, RunReporter};
use volley::args::{PositiveU64, PositiveUsize};
use volley::config::RunConfig;
use volley::metrics::ProgressUpdate;
use volley::shutdown::RunFlag;

use support_single::spawn_http_server;

struct QuietReporter;

impl RunReporter for QuietReporter {
    fn started(&self, _config: &RunConfig) {}

    fn warmup(&self, _count: u64) {}

    fn progress(&self, _update: ProgressUpdate) {}

    fn finished(&self, _report: &RunReport) {}
}

fn run(config: RunConfig) -> Result<RunReport, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("runtime build failed: {}", err))?;
    runtime.block_on(async {
        let controller = RunController::new(config, RunFlag::new(), Arc::new(QuietReporter))
            .map_err(|err| format!("controller setup failed: {}", err))?;
        controller
            .run()
            .await
            .map_err(|err| format!("run failed: {}", err))
    })
}

fn config_for(url: &str, requests: u64, concurrency: usize) -> Result<RunConfig, String> {
    let requests = PositiveU64::try_from(requests).map_err(|err| err.to_string())?;
    let concurrency = PositiveUsize::try_from(concurrency).map_err(|err| err.to_string())?;
    RunConfig::new(url)
        .map(|config| {
            config
                .with_requests(requests)
                .with_concurrency(concurrency)
                .with_header("X-Run", "integration")
        })
        .map_err(|err| err.to_string())
}

#[test]
fn warmup_traffic_reaches_server_but_not_report() -> Result<(), String> {
    let (url, server) = spawn_http_server(200)?;

    let report = run(config_for(&url, 40, 20)?)?;

    if report.statistics.total != 40 || report.statistics.successful != 40 {
        return Err(format!(
            "unexpected totals: {}/{}",
            report.statistics.total, report.statistics.successful
        ));
    }
    if server.hits() != 42 {
        return Err(format!(
            "expected 40 measured + 2 warmup requests, server saw {}",
            server.hits()
        ));
    }
    if report.interrupted || report.success_rate_x100 != 10_000 {
        return Err("unexpected report flags".to_owned());
    }
    Ok(())
}

#[test]
fn post_with_body_is_sent() -> Result<(), String> {
    let (url, server) = spawn_http_server(201)?;
    let config = config_for(&url, 5, 1)?
        .with_method(volley::args::HttpMethod::Post)
        .with_body("{\"hello\":\"world\"}".to_owned());

    let report = run(config)?;
    if report.status_counts != vec![("201".to_owned(), 5)] {
        return Err(format!("unexpected statuses: {:?}", report.status_counts));
    }
    if server.hits() != 5 {
        return Err(format!("server saw {} requests", server.hits()));
    }
    Ok(())
}
