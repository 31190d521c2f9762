use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cadence_agent::{AgentRegistry, Dispatcher, Pipeline};
use cadence_config::{CadenceConfig, WorkflowDef, builtin_agents};
use cadence_engine::{RunRequest, WorkflowEngine};
use cadence_guardrails::PolicyChecker;
use cadence_model::HttpModelCaller;
use cadence_queue::PromptQueue;

/// Cadence - batched LLM agent workflows
#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the runtime config (default: ~/.cadence/config.json if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// User the workflow runs for
  #[arg(long, global = true, default_value = "local")]
  user: String,

  /// Optional session id, available to prompts as {{sessionId}}
  #[arg(long, global = true)]
  session: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow or a single step
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run an entire workflow
  Workflow {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a single step from a workflow
  Step {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// The step ID to execute
    #[arg(long)]
    step: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let config = load_config(cli.config.as_deref())?;
  let mut request = RunRequest::new(cli.user);
  request.session_id = cli.session;

  match cli.command {
    Some(Commands::Run { target }) => {
      let rt = tokio::runtime::Runtime::new()?;
      match target {
        RunTarget::Workflow { workflow_file } => {
          rt.block_on(run_workflow(workflow_file, config, request))?;
        }
        RunTarget::Step {
          workflow_file,
          step,
        } => {
          rt.block_on(run_step(workflow_file, step, config, request))?;
        }
      }
    }
    None => {
      println!("cadence - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CadenceConfig> {
  if let Some(path) = path {
    return CadenceConfig::from_file(path)
      .with_context(|| format!("failed to load config: {}", path.display()));
  }

  let default_path = dirs::home_dir().map(|home| home.join(".cadence").join("config.json"));
  match default_path {
    Some(path) if path.exists() => CadenceConfig::from_file(&path)
      .with_context(|| format!("failed to load config: {}", path.display())),
    _ => Ok(CadenceConfig::default()),
  }
}

fn build_engine(config: &CadenceConfig) -> Result<WorkflowEngine> {
  let caller = Arc::new(
    HttpModelCaller::from_env(&config.model).context("failed to create model client")?,
  );
  let queue = PromptQueue::new(config.queue.clone(), caller.clone());
  let checker = Arc::new(PolicyChecker);
  let pipeline = Arc::new(Pipeline::with_defaults(
    Dispatcher::new(queue, caller),
    checker.clone(),
    config.dispatch.clone(),
  ));

  let agents = if config.agents.is_empty() {
    builtin_agents()
  } else {
    config.agents.clone()
  };
  let registry = AgentRegistry::from_defs(&agents, pipeline, &config.model.default_model);

  Ok(WorkflowEngine::new(
    Arc::new(registry),
    checker,
    config.engine.clone(),
  ))
}

async fn load_workflow(workflow_file: &Path) -> Result<WorkflowDef> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

async fn run_workflow(
  workflow_file: PathBuf,
  config: CadenceConfig,
  mut request: RunRequest,
) -> Result<()> {
  let def = load_workflow(&workflow_file).await?;
  eprintln!("Loaded workflow: {} ({} steps)", def.name, def.steps.len());

  request.initial_data = read_payload_from_stdin()?;
  let engine = build_engine(&config)?;

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  let run = engine
    .execute(&def, request, cancel)
    .await
    .context("workflow could not be executed")?;

  eprintln!("{}", run.result.summary);
  println!("{}", serde_json::to_string_pretty(&run.result)?);

  if !run.result.success {
    anyhow::bail!("workflow '{}' failed", def.workflow_id);
  }
  Ok(())
}

async fn run_step(
  workflow_file: PathBuf,
  step_id: String,
  config: CadenceConfig,
  mut request: RunRequest,
) -> Result<()> {
  let def = load_workflow(&workflow_file).await?;
  let step = def
    .get_step(&step_id)
    .with_context(|| format!("step '{}' not found in workflow", step_id))?;
  eprintln!("Running step: {} ({} / {})", step.display_name(), step.agent_id, step.action);

  request.initial_data = read_payload_from_stdin()?;
  let engine = build_engine(&config)?;

  let result = engine
    .execute_step(&def, &step_id, request)
    .await
    .context("step could not be executed")?;

  println!("{}", serde_json::to_string_pretty(&result)?);

  if let Some(error) = result.error() {
    anyhow::bail!("step '{}' failed: {}", step_id, error);
  }
  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read initial data from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse initial data JSON from stdin")
  }
}
