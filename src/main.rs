// ABOUTME: Entry point for the marathon-bluegreen CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{BlueGreenArgs, Cli, Commands};
use marathon_bluegreen::bluegreen::{BlueGreen, BlueGreenOptions};
use marathon_bluegreen::config::{self, Config};
use marathon_bluegreen::descriptor;
use marathon_bluegreen::error::{Error, Result};
use marathon_bluegreen::haproxy::HaproxyClient;
use marathon_bluegreen::marathon::MarathonClient;
use marathon_bluegreen::output::{Output, OutputMode};
use marathon_bluegreen::types::DeploymentGroup;
use std::env;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;
    match cli.command {
        Commands::Init {
            marathon,
            lb,
            force,
        } => {
            config::init_config(&cwd, marathon.as_deref(), lb.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Bluegreen(args) => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            bluegreen(config, args, output).await
        }
        Commands::Status { group, alt_port } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            status(config, &group, alt_port, output).await
        }
    }
}

fn load_config(path: Option<&Path>, cwd: &Path) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}

/// Fold CLI flags into the configured options. Flags win.
fn apply_overrides(options: &mut BlueGreenOptions, args: &BlueGreenArgs) -> Result<()> {
    if let Some(lb) = &args.lb {
        options.load_balancer_url = lb.clone();
    }
    if let Some(secs) = args.lb_timeout {
        options.proxy_wait_timeout = Duration::from_secs(secs);
    }
    if let Some(instances) = args.instances {
        if instances == 0 {
            return Err(Error::InvalidConfig("--instances must be at least 1".into()));
        }
        options.initial_instances = instances;
    }
    if let Some(secs) = args.step_delay {
        options.step_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = args.drain_timeout {
        options.drain_deadline = Some(Duration::from_secs(secs));
    }
    if args.no_resume {
        options.resume = false;
    }
    if args.ignore_missing {
        options.error_on_missing_params = false;
    }
    options.dry_run = args.dry;

    // Params file first so -p wins on conflicting keys.
    if let Some(path) = &args.params_file {
        options.env_params.extend(descriptor::load_params_file(path)?);
    }
    for param in &args.params {
        let (key, value) = descriptor::parse_param(param)?;
        options.env_params.insert(key, value);
    }
    Ok(())
}

/// Wire Ctrl-C to the shutdown channel watched by waits and the drain loop.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping rollout");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn bluegreen(config: Config, args: BlueGreenArgs, output: &mut Output) -> Result<()> {
    let mut options = config.blue_green_options()?;
    apply_overrides(&mut options, &args)?;

    let client_config = config.marathon.client_config()?;
    let request_timeout = client_config.request_timeout;
    let shutdown = shutdown_signal();
    let cluster = MarathonClient::new(client_config)?.with_shutdown(shutdown.clone());
    let proxy = HaproxyClient::new(&options.load_balancer_url, request_timeout)?;

    output.start_timer();
    output.progress(&format!("Deploying {}...", args.file.display()));

    let deployer = BlueGreen::new(&cluster, &proxy, options).with_shutdown(shutdown);
    let rollout = deployer.deploy_from_file(&args.file).await?;

    output.application(&rollout.app);
    if deployer.options().dry_run {
        return Ok(());
    }

    match rollout.drain {
        Some(report) => {
            output.diagnostics(&report.diagnostics);
            if !report.outcome.is_converged() {
                return Err(Error::DrainIncomplete(format!("{:?}", report.outcome)));
            }
            output.success(&format!(
                "Deployed {} after {} drain step(s)",
                rollout.app.id, report.steps
            ));
        }
        None => output.success(&format!("Deployed {}", rollout.app.id)),
    }
    Ok(())
}

async fn status(config: Config, group: &str, alt_port: u16, output: &Output) -> Result<()> {
    let group = DeploymentGroup::new(group).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let options = config.blue_green_options()?;
    let client_config = config.marathon.client_config()?;
    let request_timeout = client_config.request_timeout;
    let cluster = MarathonClient::new(client_config)?;
    let proxy = HaproxyClient::new(&options.load_balancer_url, request_timeout)?;

    let state = BlueGreen::new(&cluster, &proxy, options)
        .probe(&group, alt_port)
        .await?;
    output.app_state(&state);
    Ok(())
}
