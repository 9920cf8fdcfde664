use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use bosun_bus::{Bus, Severity, TracingSink};
use bosun_config::{DEFAULT_RUNFILE, RunfileDef, load_env_file};
use bosun_context::{RunContext, Variables};
use bosun_engine::{Action, DeploymentRunner, Entity, JobRunner, Orchestrator, TaskRunner};
use bosun_graph::Vertex;
use bosun_resolver::{Registries, resolve};

mod console;

use console::ConsoleSink;

/// Bosun - run tasks, jobs and deployments declared in a runfile
#[derive(Parser)]
#[command(name = "bosun")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the runfile (default: ./bosun.json)
  #[arg(short = 'f', long = "file", global = true)]
  file: Option<PathBuf>,

  /// Report entity progress
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Report everything, including engine internals
  #[arg(short, long, global = true)]
  debug: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run tasks
  Task(RunArgs),

  /// Run jobs
  Job(RunArgs),

  /// Deploy
  Deploy(RunArgs),

  /// Roll deployments back
  Rollback(RunArgs),

  /// Tear deployments down
  Destroy(RunArgs),

  /// List everything the runfile declares
  List,
}

#[derive(Args)]
struct RunArgs {
  /// Ids to run; whatever they need runs first
  targets: Vec<String>,

  /// Set an environment variable for the run
  #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
  env: Vec<(String, String)>,

  /// Load environment variables from a dotenv file
  #[arg(long = "env-file", value_name = "PATH")]
  env_files: Vec<PathBuf>,

  /// Load secrets from a dotenv file
  #[arg(long = "secret-file", value_name = "PATH")]
  secret_files: Vec<PathBuf>,

  /// Timeout for entities that do not set their own
  #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
  timeout: Option<u64>,

  /// Print the run order without running anything
  #[arg(short = 'w', long = "dry-run")]
  dry_run: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => {
      Ok((key.trim().to_string(), value.to_string()))
    }
    _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
  }
}

fn main() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let _ = e.print();
      // --help and --version are not failures
      return if e.use_stderr() {
        ExitCode::FAILURE
      } else {
        ExitCode::SUCCESS
      };
    }
  };

  init_tracing(&cli);

  let result = tokio::runtime::Runtime::new()
    .context("failed to start the runtime")
    .and_then(|rt| rt.block_on(run(cli)));

  match result {
    Ok(code) => code,
    Err(e) => {
      eprintln!("error: {:#}", e);
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(cli: &Cli) {
  use tracing_subscriber::prelude::*;

  let filter = if cli.debug {
    "debug"
  } else if cli.verbose {
    "info"
  } else {
    "warn"
  };
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter),
    )
    .init();
}

fn severity(cli: &Cli) -> Severity {
  if cli.debug {
    Severity::Debug
  } else if cli.verbose {
    Severity::Info
  } else {
    Severity::Warning
  }
}

async fn run(cli: Cli) -> Result<ExitCode> {
  let path = cli
    .file
    .clone()
    .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNFILE));

  let def = RunfileDef::load(&path).context("failed to load runfile")?;
  let registries = resolve(def).context("failed to resolve runfile")?;

  // Relative entity directories resolve against the runfile's directory
  let root = match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
    _ => PathBuf::from("."),
  };

  let session = Session {
    root,
    severity: severity(&cli),
    debug: cli.debug,
  };

  match cli.command {
    Commands::List => {
      list(&registries);
      Ok(ExitCode::SUCCESS)
    }
    Commands::Task(args) => {
      let runner = TaskRunner::new(registries.tasks.clone());
      session.execute(runner, &registries, args).await
    }
    Commands::Job(args) => {
      let runner = JobRunner::new(registries.jobs.clone());
      session.execute(runner, &registries, args).await
    }
    Commands::Deploy(args) => {
      let runner = DeploymentRunner::new(registries.deployments_for(Action::Deploy));
      session.execute(runner, &registries, args).await
    }
    Commands::Rollback(args) => {
      let runner = DeploymentRunner::new(registries.deployments_for(Action::Rollback));
      session.execute(runner, &registries, args).await
    }
    Commands::Destroy(args) => {
      let runner = DeploymentRunner::new(registries.deployments_for(Action::Destroy));
      session.execute(runner, &registries, args).await
    }
  }
}

struct Session {
  root: PathBuf,
  severity: Severity,
  debug: bool,
}

impl Session {
  async fn execute<E: Entity>(
    &self,
    runner: Orchestrator<E>,
    registries: &Registries,
    args: RunArgs,
  ) -> Result<ExitCode> {
    let runner = runner.with_default_timeout(args.timeout.map(Duration::from_secs));

    if args.dry_run {
      return match runner.plan(&args.targets) {
        Ok(order) => {
          for entity in order {
            println!("{}", entity.id());
          }
          Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
          eprintln!("error: {}", e);
          Ok(ExitCode::FAILURE)
        }
      };
    }

    let bus = Bus::new(self.severity);
    let _console = bus.subscribe(ConsoleSink, ["*"]);
    let _tracing = self.debug.then(|| bus.subscribe(TracingSink, ["*"]));

    let ctx = RunContext::new(bus)
      .with_cwd(self.root.clone())
      .with_env(load_env(&args)?)
      .with_secrets(load_variables(&args.secret_files)?);
    registries.install(ctx.services());

    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling run");
        cancel.cancel();
      }
    });

    let summary = runner.run(&ctx, &args.targets).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.is_success() && !summary.has_cancellations() {
      Ok(ExitCode::SUCCESS)
    } else {
      Ok(ExitCode::FAILURE)
    }
  }
}

/// Process environment, then env files in order, then `-e` flags.
fn load_env(args: &RunArgs) -> Result<Variables> {
  let mut env: Variables = std::env::vars().collect();
  env.merge(&load_variables(&args.env_files)?);
  env.extend(args.env.iter().cloned());
  Ok(env)
}

fn load_variables(paths: &[PathBuf]) -> Result<Variables> {
  let mut vars = Variables::new();
  for path in paths {
    let entries = load_env_file(path)
      .with_context(|| format!("failed to load env file: {}", path.display()))?;
    vars.extend(entries);
  }
  Ok(vars)
}

fn list(registries: &Registries) {
  println!("tasks:");
  for task in registries.tasks.iter() {
    println!("  {}", describe(task.id(), task.needs()));
  }

  println!("jobs:");
  for job in registries.jobs.iter() {
    println!(
      "  {} [{}]",
      describe(job.id(), job.needs()),
      job.tasks().join(", ")
    );
  }

  println!("deployments:");
  for deployment in registries.deployments.iter() {
    let actions: Vec<&str> = Action::ALL
      .iter()
      .filter(|action| deployment.handles(**action))
      .map(|action| action.as_str())
      .collect();
    println!(
      "  {} ({})",
      describe(deployment.id(), deployment.needs()),
      actions.join(", ")
    );
  }
}

fn describe(id: &str, needs: &[String]) -> String {
  if needs.is_empty() {
    id.to_string()
  } else {
    format!("{} (needs: {})", id, needs.join(", "))
  }
}
