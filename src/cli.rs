use crate::{
    api::{ApiError, ReportApi, ViewLink, http::HttpReportApi},
    config::{Config, TransportMode},
    normalize::normalize,
    render::{ShareFlow, ShareStep, render_error, render_progress, render_state, share_text},
    report::Report,
    state::ViewState,
    transport::{WatchTarget, Watcher},
    util::{first_str, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "saju-report.toml";

#[derive(Parser, Debug)]
#[command(name = "saju-report")]
#[command(about = "Terminal client for asynchronous saju report generation")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./saju-report.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RenderOpts {
    /// Section tab to show first.
    #[arg(long)]
    pub tab: Option<String>,
    /// Print every section instead of the active tab.
    #[arg(long)]
    pub all: bool,
    /// Expand the raw response panel.
    #[arg(long)]
    pub debug_raw: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Health {},
    Calculate {
        #[arg(long)]
        input: PathBuf,
    },
    Generate {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        render: RenderOpts,
    },
    Start {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        watch: bool,
        #[arg(long, value_enum)]
        transport: Option<TransportMode>,
        #[command(flatten)]
        render: RenderOpts,
    },
    Watch {
        #[arg(long)]
        job_id: String,
        #[arg(long, value_enum)]
        transport: Option<TransportMode>,
        #[command(flatten)]
        render: RenderOpts,
    },
    View {
        /// Full shared link, e.g. https://host/reports/view/<id>?token=<t>
        #[arg(long, conflicts_with_all = ["job_id", "token"])]
        link: Option<String>,
        #[arg(long)]
        job_id: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[command(flatten)]
        render: RenderOpts,
    },
    Retry {
        #[arg(long)]
        job_id: String,
    },
    Render {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        render: RenderOpts,
    },
    Normalize {
        #[arg(long)]
        input: PathBuf,
    },
    Share {
        #[arg(long)]
        input: PathBuf,
        /// Skip the boundary-date confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref())? {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    }
    .with_env_overrides();
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Render { input, render } => {
            let report = Report::from_response(&read_json(input)?);
            let state = ViewState::Completed(Box::new(report));
            println!("{}", render_state(&state, &cfg, render.tab.as_deref(), render.all, render.debug_raw));
            Ok(())
        }
        Command::Normalize { input } => normalize_cmd(input),
        Command::Share { input, yes } => share(&cfg, input, *yes),
        _ => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;
            rt.block_on(run_online(&args.cmd, &cfg))
        }
    }
}

async fn run_online(cmd: &Command, cfg: &Config) -> Result<()> {
    let api = Arc::new(HttpReportApi::new(cfg)?);
    match cmd {
        Command::Health {} => {
            println!("{}", api.health().await?);
            Ok(())
        }
        Command::Calculate { input } => {
            let resp = api.calculate(&read_json(input)?).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            Ok(())
        }
        Command::Generate { input, render } => {
            let started = now_rfc3339();
            let resp = api.generate_report(&read_json(input)?).await?;
            info!(started = %started, finished = %now_rfc3339(), "report generated");
            let state = ViewState::Completed(Box::new(Report::from_response(&resp)));
            println!("{}", render_state(&state, cfg, render.tab.as_deref(), render.all, render.debug_raw));
            Ok(())
        }
        Command::Start { input, watch, transport, render } => {
            let resp = api.start_report(&read_json(input)?).await?;
            let job_id = start_job_id(&resp)
                .ok_or_else(|| anyhow!("start response carries no job id: {resp}"))?;
            println!("{job_id}");
            if !*watch {
                return Ok(());
            }
            follow(api, cfg, Ok(WatchTarget::Job(job_id)), *transport, render).await
        }
        Command::Watch { job_id, transport, render } => {
            follow(api, cfg, Ok(WatchTarget::Job(job_id.clone())), *transport, render).await
        }
        Command::View { link, job_id, token, render } => {
            let target = match link {
                Some(link) => ViewLink::parse_url(link),
                None => ViewLink::new(job_id.as_deref(), token.as_deref()),
            }
            .map(WatchTarget::Link);
            follow(api, cfg, target, None, render).await
        }
        Command::Retry { job_id } => {
            let resp = api.retry_report(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
            Ok(())
        }
        Command::Render { .. } | Command::Normalize { .. } | Command::Share { .. } => {
            Err(anyhow!("offline command routed to the network path"))
        }
    }
}

/// Drives a watcher to its end, echoing progress lines to stderr, then
/// renders the final state to stdout.
async fn follow(
    api: Arc<HttpReportApi>,
    cfg: &Config,
    target: Result<WatchTarget, ApiError>,
    transport: Option<TransportMode>,
    render: &RenderOpts,
) -> Result<()> {
    let watcher = Watcher::new(api, cfg).with_mode(transport.unwrap_or(cfg.transport.mode));
    let mut updates = watcher.subscribe();
    let cancel = CancellationToken::new();
    let done = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let printer = async {
        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let ViewState::Generating(view) = &*updates.borrow_and_update() {
                        eprintln!("{}", render_progress(view));
                    }
                }
            }
        }
    };
    let run = async {
        let state = watcher.watch(target, cancel.clone()).await;
        done.cancel();
        state
    };
    let (state, ()) = tokio::join!(run, printer);
    debug!(state = state.name(), "watch returned");

    match &state {
        ViewState::Error(view) => {
            println!("{}", render_error(view, render.debug_raw));
            Err(anyhow!("{}", view.message))
        }
        ViewState::Completed(_) => {
            println!("{}", render_state(&state, cfg, render.tab.as_deref(), render.all, render.debug_raw));
            Ok(())
        }
        _ if cancel.is_cancelled() => Err(anyhow!("interrupted")),
        other => Err(anyhow!("watch ended in state {}", other.name())),
    }
}

fn start_job_id(resp: &Value) -> Option<String> {
    first_str(
        resp,
        &["job_id", "jobId", "report_id", "reportId", "id", "job.id", "job.job_id"],
    )
    .map(str::to_string)
}

fn normalize_cmd(input: &Path) -> Result<()> {
    let raw = read_json(input)?;
    let shape = Report::from_response(&raw).shape;
    let out = serde_json::json!({
        "normalized": normalize(&raw).to_value(),
        "shape": shape,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn share(cfg: &Config, input: &Path, yes: bool) -> Result<()> {
    let report = Report::from_response(&read_json(input)?);
    let mut flow = ShareFlow::for_report(&report);

    if flow.request() == ShareStep::NeedsConfirmation {
        if yes || prompt_yes_no(&ShareFlow::confirmation_prompt(&report))? {
            flow.confirm();
        } else {
            flow.cancel();
        }
    }

    if flow.is_cancelled() {
        eprintln!("share cancelled");
        return Ok(());
    }
    println!("{}", share_text(&report, cfg));
    Ok(())
}

fn prompt_yes_no(question: &str) -> Result<bool> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{question} [y/N] ")?;
    stderr.flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading confirmation from stdin")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading input: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing JSON: {}", path.display()))
}

fn resolve_config_path(user: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config file not found: {}", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    let default = PathBuf::from(DEFAULT_CONFIG);
    Ok(default.exists().then_some(default))
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir: {}", parent.display()))?;
            let file = std::fs::File::create(&path)
                .with_context(|| format!("create log file: {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("saju-report.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_response_job_id_variants() {
        assert_eq!(start_job_id(&json!({"job_id": "a1"})).as_deref(), Some("a1"));
        assert_eq!(start_job_id(&json!({"report_id": "r9", "status": "queued"})).as_deref(), Some("r9"));
        assert_eq!(start_job_id(&json!({"job": {"id": "j2"}})).as_deref(), Some("j2"));
        assert_eq!(start_job_id(&json!({"status": "queued"})), None);
    }

    #[test]
    fn cli_parses_view_link() {
        let args = Args::try_parse_from([
            "saju-report",
            "view",
            "--link",
            "https://sajuos.com/reports/view/abc?token=t",
            "--all",
        ])
        .unwrap();
        match args.cmd {
            Command::View { link, render, .. } => {
                assert!(link.is_some());
                assert!(render.all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
