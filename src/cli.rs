// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "marathon-bluegreen")]
#[command(about = "Blue/green deployments for Marathon applications behind marathon-lb")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to bluegreen.yml (discovered in the current directory otherwise)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new bluegreen.yml configuration file
    Init {
        /// Marathon base URL
        #[arg(long)]
        marathon: Option<String>,

        /// Marathon-LB stats URL
        #[arg(long)]
        lb: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Roll out an application descriptor next to the live one
    #[command(alias = "deploy")]
    Bluegreen(BlueGreenArgs),

    /// Show which colour and port the next rollout of a group would use
    Status {
        /// Deployment group name
        group: String,

        /// Alternate service port of the group
        #[arg(long)]
        alt_port: u16,
    },
}

#[derive(clap::Args)]
pub struct BlueGreenArgs {
    /// Application descriptor (.json, .yml or .yaml)
    pub file: PathBuf,

    /// Marathon-LB stats URL
    #[arg(long)]
    pub lb: Option<String>,

    /// Seconds a load balancer reload may hold back a drain step
    #[arg(long = "lb-timeout")]
    pub lb_timeout: Option<u64>,

    /// Instances the new application starts with
    #[arg(long)]
    pub instances: Option<u32>,

    /// Seconds between drain steps
    #[arg(long = "step-delay")]
    pub step_delay: Option<u64>,

    /// Refuse to continue a rollout already in progress
    #[arg(long = "no-resume")]
    pub no_resume: bool,

    /// Print the application that would be created and exit
    #[arg(long)]
    pub dry: bool,

    /// Descriptor parameter, may be repeated
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// File of KEY=VALUE descriptor parameters
    #[arg(short = 'c', long = "params-file")]
    pub params_file: Option<PathBuf>,

    /// Leave unresolved descriptor parameters in place instead of failing
    #[arg(short, long = "ignore-missing")]
    pub ignore_missing: bool,

    /// Give up draining after this many seconds
    #[arg(long = "drain-timeout")]
    pub drain_timeout: Option<u64>,
}
