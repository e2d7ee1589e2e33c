mod doctor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowline_client::HttpExecutor;
use flowline_core::config::AppConfig;
use flowline_core::error::FlowError;
use flowline_core::event::{FlowEvent, NoticeLevel, RunStatus};
use flowline_core::ids::SequentialIds;
use flowline_core::types::{ChainKeying, RunMode};
use flowline_graph::validation::validation_hint;
use flowline_graph::{validate_all, FlowDocument, FlowGraph, FlowTemplate, Palette};
use flowline_runtime::{FlowSession, Submission};

#[derive(Parser)]
#[command(
    name = "flowline",
    version,
    about = "Linearize node flows and run them on a workflow executor"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, linearize and execute a flow file
    Run {
        /// Exported flow document (JSON)
        flow: PathBuf,
        /// Use the streaming endpoint instead of the batch endpoint
        #[arg(long)]
        stream: bool,
        /// How chain walks key nodes
        #[arg(long, value_enum)]
        keying: Option<Keying>,
    },
    /// Print the execution list a flow would be submitted as
    Linearize {
        flow: PathBuf,
        #[arg(long, value_enum)]
        keying: Option<Keying>,
    },
    /// Check node inputs without submitting
    Validate { flow: PathBuf },
    /// List available node types
    Palette,
    /// List flow templates, or write one out as a flow document
    Templates {
        /// Template id to export
        #[arg(long)]
        export: Option<String>,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run configuration and executor health checks
    Doctor,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Keying {
    Instance,
    Domain,
}

impl From<Keying> for ChainKeying {
    fn from(k: Keying) -> Self {
        match k {
            Keying::Instance => ChainKeying::Instance,
            Keying::Domain => ChainKeying::Domain,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowline=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that need no config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "flowline", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Palette => {
            print_palette(&Palette::builtin());
            return Ok(());
        }
        Commands::Templates { export, output } => {
            return templates(export.as_deref(), output.as_deref());
        }
        Commands::Validate { flow } => return validate(flow),
        _ => {}
    }

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            flow,
            stream,
            keying,
        } => {
            if let Some(k) = keying {
                config.run.chain_keying = k.into();
            }
            let mode = if stream { RunMode::Stream } else { config.run.mode };
            run(&config, &flow, mode).await
        }
        Commands::Linearize { flow, keying } => {
            let keying = keying.map(Into::into).unwrap_or(config.run.chain_keying);
            let graph = read_graph(&flow)?;
            let list = graph.execution_list(keying);
            if list.is_empty() && !graph.is_empty() {
                anyhow::bail!("No valid execution list generated");
            }
            println!("{}", serde_json::to_string_pretty(&list)?);
            Ok(())
        }
        Commands::Doctor => {
            println!("Flowline Doctor");
            println!("===============");
            doctor::run_doctor(&config).await;
            Ok(())
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Completions { .. }
        | Commands::Palette
        | Commands::Templates { .. }
        | Commands::Validate { .. } => unreachable!("handled before config load"),
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    match AppConfig::home_config_path() {
        Some(home) if home.exists() => {
            info!(path = %home.display(), "Loading config from home directory");
            Ok(AppConfig::load(&home)?)
        }
        _ => {
            info!("No config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn read_graph(path: &Path) -> anyhow::Result<FlowGraph> {
    let doc = FlowDocument::read(path)?;
    let mut graph = FlowGraph::new(Arc::new(SequentialIds::default()));
    graph.import(doc)?;
    Ok(graph)
}

async fn run(config: &AppConfig, flow: &Path, mode: RunMode) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(flow)?;
    let executor = HttpExecutor::new(config.executor.clone())?;
    let handle = FlowSession::new(Arc::new(executor), config).spawn();

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                FlowEvent::Notice { level, message } => {
                    let tag = match level {
                        NoticeLevel::Info => "info",
                        NoticeLevel::Success => "ok",
                        NoticeLevel::Warning => "warn",
                        NoticeLevel::Error => "error",
                    };
                    eprintln!("[{}] {}", tag, message);
                }
                FlowEvent::RunStarted { entries, mode, .. } => {
                    eprintln!("[run] submitting {} nodes ({})", entries, mode);
                }
                FlowEvent::NodeCompleted { instance_id, .. } => {
                    eprintln!("[done] {}", instance_id);
                }
                FlowEvent::RunFinished { .. } => break,
                FlowEvent::GraphChanged { .. } => {}
            }
        }
    });

    handle.import_json(text).await?;

    let ticket = match handle.run(mode).await? {
        Submission::Started(ticket) => ticket,
        Submission::Invalid(summary) => {
            for line in &summary.details {
                eprintln!("  {}", line);
            }
            anyhow::bail!(summary.message);
        }
        Submission::NothingToRun => anyhow::bail!("Nothing to run"),
    };

    let status = tokio::select! {
        status = ticket.finished() => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling run");
            handle.cancel().await?;
            RunStatus::Cancelled
        }
    };
    printer.await.ok();

    let snapshot = handle.snapshot().await?;
    let results: Vec<_> = snapshot
        .nodes
        .iter()
        .map(|n| {
            json!({
                "instance_id": n.instance_id,
                "node_id": n.domain_id,
                "title": n.title,
                "node_input": n.input_value,
                "node_result": n.result,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&results)?);

    match status {
        RunStatus::Completed => Ok(()),
        RunStatus::Failed => anyhow::bail!("Flow execution failed"),
        RunStatus::Cancelled => Err(FlowError::Cancelled.into()),
    }
}

fn validate(flow: &Path) -> anyhow::Result<()> {
    let graph = read_graph(flow)?;
    if graph.is_empty() {
        anyhow::bail!("No nodes to validate");
    }
    let report = validate_all(graph.nodes());
    let summary = report.summary();
    println!("{}", summary.message);
    for line in &summary.details {
        println!("  {}", line);
    }
    for err in &report.errors {
        if let Some(node) = graph.node(&err.instance_id) {
            println!("    hint for {}: {}", err.title, validation_hint(&node.domain_id));
        }
    }
    if !summary.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_palette(palette: &Palette) {
    for (category, types) in palette.categories() {
        println!("{}", category);
        for ty in types {
            println!("  {:<26} {}  {}", ty.title, ty.domain_id, ty.description);
        }
        println!();
    }
}

fn templates(export: Option<&str>, output: Option<&Path>) -> anyhow::Result<()> {
    let Some(id) = export else {
        for t in FlowTemplate::builtin() {
            println!(
                "{:<26} {} [{} / {}]",
                t.id, t.name, t.category, t.difficulty
            );
            println!("  {}", t.description);
        }
        return Ok(());
    };

    let template = FlowTemplate::find(id)?;
    let mut graph = FlowGraph::new(Arc::new(SequentialIds::default()));
    graph.load_template(&template, &Palette::builtin())?;
    let doc = graph
        .export()
        .ok_or_else(|| anyhow::anyhow!("No nodes to export"))?;

    match output {
        Some(path) => {
            doc.write(path)?;
            info!(path = %path.display(), template = id, "Template written");
        }
        None => println!("{}", doc.to_json_pretty()?),
    }
    Ok(())
}
