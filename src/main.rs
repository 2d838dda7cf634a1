mod agents;
mod buffer;
mod client;
mod config;
mod document;
mod jobs;
mod logging;
mod passage;
mod tui;
mod wrap;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use config::{ConfigFile, ResolvedConfig};
use document::Document;
use logging::{DEBUG_LOG_CAP, DebugLog, LogContext};

#[derive(Parser, Debug)]
#[command(
    name = "scribe",
    about = "Draft prose passage by passage and refine it with a completion model",
    long_about = None,
)]
struct Args {
    /// Document to open; created on first save if it does not exist
    document: Option<PathBuf>,

    /// Config file to read instead of ~/.config/scribe/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Profile to use from config file
    #[arg(short, long, env = "SCRIBE_PROFILE")]
    profile: Option<String>,

    /// Override endpoint URL (including the /v1 suffix)
    #[arg(long, env = "FS_API_URL")]
    endpoint: Option<String>,

    /// Override model name
    #[arg(short, long, env = "FS_MODEL")]
    model: Option<String>,

    /// Override API key
    #[arg(long, env = "FS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Show a live log pane beside the editor and log the resolved configuration
    #[arg(long)]
    debug: bool,

    /// Do not write a log file
    #[arg(long)]
    no_log: bool,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Generate shell completions and print to stdout
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::config_path);

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing(&config_path)?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: scribe");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell) = args.completions {
        let mut cmd = Args::command();
        generate(shell, &mut cmd, "scribe", &mut std::io::stdout());
        return Ok(());
    }

    let file = ConfigFile::load(&config_path)?;
    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.model.as_deref(),
        args.api_key.as_deref(),
    );

    // ── Logging ───────────────────────────────────────────────────────────────
    let panel = args.debug.then(|| DebugLog::new(DEBUG_LOG_CAP));
    let file = (!args.no_log).then_some(resolved.log_path.as_path());
    let (log, _log_guard) = match LogContext::build(file, panel.clone()) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("  Logging disabled: {e:#}");
            LogContext::build(None, panel.clone())?
        }
    };
    let _log_scope = log.enter();

    if args.debug {
        log_resolved_config(&config_path, &resolved);
    }
    tracing::info!(
        profile = %resolved.profile_name,
        model = %resolved.model,
        endpoint = %resolved.endpoint,
        "starting"
    );

    let doc = open_document(args.document.as_deref(), &resolved)?;

    let mut client = client::Client::new(resolved.endpoint.clone(), resolved.model.clone());
    if let Some(key) = &resolved.api_key {
        client.set_api_key(key.clone());
    }
    client.set_timeout(Duration::from_secs(resolved.request_timeout_secs));

    let prompts = agents::AgentPrompts::load(&resolved.prompts);
    let jobs = jobs::JobDispatcher::new(Arc::new(client), prompts, resolved.temperature, log.clone());
    let mut state = tui::AppState::new(doc, jobs, &resolved);
    if let Some(panel) = panel {
        state = state.with_debug_log(panel);
    }

    tui::run(state).await
}

/// Load `path` when it exists. A missing file becomes the save target of a
/// fresh document named after it.
fn open_document(path: Option<&Path>, resolved: &ResolvedConfig) -> Result<Document> {
    let Some(path) = path else {
        let mut doc = Document::new("Untitled");
        doc.config = resolved.document_config();
        return Ok(doc);
    };

    if path.exists() {
        let doc = Document::load(path)
            .with_context(|| format!("Failed to open document {}", path.display()))?;
        tracing::info!(path = %path.display(), passages = doc.len(), "document loaded");
        return Ok(doc);
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());
    let mut doc = Document::new(&name);
    doc.config = resolved.document_config();
    doc.set_file_path(path.to_path_buf());
    tracing::info!(path = %path.display(), "new document");
    Ok(doc)
}

fn log_resolved_config(config_path: &Path, resolved: &ResolvedConfig) {
    tracing::debug!(
        config = %config_path.display(),
        profile = %resolved.profile_name,
        endpoint = %resolved.endpoint,
        model = %resolved.model,
        api_key = %resolved.redacted_key(),
        max_output_tokens = resolved.max_output_tokens,
        context_chars = resolved.context_chars,
        works_dir = %resolved.works_dir.display(),
        log = %resolved.log_path.display(),
        "resolved config"
    );
}
