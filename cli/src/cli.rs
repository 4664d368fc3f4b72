//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Run scripts and notebooks on spot instances
#[derive(Parser)]
#[command(
    name = "bokchoi",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase diagnostic logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project configuration file (default: ./bokchoi.yaml)
    #[arg(long, global = true, env = "BOKCHOI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a starter bokchoi.yaml
    Init(commands::init::InitArgs),

    /// Package the project and provision its resources
    Deploy(commands::deploy::DeployArgs),

    /// Remove every resource of the project
    Undeploy(commands::undeploy::UndeployArgs),

    /// Launch a spot instance running the project
    Run,

    /// Cancel spot requests and terminate instances
    Stop(commands::stop::StopArgs),

    /// Show project state and instances
    Status,

    /// Print the most recent log stream
    Logs(commands::logs::LogsArgs),

    /// Tunnel to the notebook server of the running instance
    Connect(commands::connect::ConnectArgs),

    /// Forward a local port through an SSH host
    Forward(commands::forward::ForwardArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            verbose: _,
            config,
            command,
        } = self;

        let yes = matches!(&command, Command::Undeploy(args) if args.yes);
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });

        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Init(args) => commands::init::run(&app, &args),
            Command::Deploy(args) => commands::deploy::run(&app, &args).await,
            Command::Undeploy(args) => commands::undeploy::run(&app, &args).await,
            Command::Run => commands::run::run(&app).await,
            Command::Stop(args) => commands::stop::run(&app, &args).await,
            Command::Status => commands::status::run(&app).await,
            Command::Logs(args) => commands::logs::run(&app, &args).await,
            Command::Connect(args) => commands::connect::run(&app, &args).await,
            Command::Forward(args) => commands::forward::run(&app, &args).await,
        }
    }
}
