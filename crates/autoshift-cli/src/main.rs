mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::init::PostInstall;
use cmd::install::InstallArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autoshift",
    about = "Install the AutoShift hub and wait until it reports ready",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "AUTOSHIFT_CONFIG",
        default_value = autoshift_core::config::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug-level logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Step to run after the hub is ready
        #[arg(long, value_enum, default_value_t = PostInstall::Script)]
        post_install: PostInstall,
    },

    /// Log in to a cluster with `oc login`
    Login {
        /// API server URL, e.g. https://api.hub.example.com:6443
        #[arg(long)]
        server: String,

        #[arg(long, short = 'u')]
        username: String,

        #[arg(long, env = "AUTOSHIFT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out of the current cluster
    Logout,

    /// Validate the config file
    Check,

    /// Query the readiness status once
    Status,

    /// Run the bootstrap if needed and poll until the hub is ready
    Install {
        /// Status that counts as ready (overrides the config file)
        #[arg(long)]
        target: Option<String>,

        /// Seconds between status queries
        #[arg(long = "interval")]
        interval_secs: Option<u64>,

        /// Give up after this many seconds
        #[arg(long = "timeout")]
        timeout_secs: Option<u64>,

        /// Fail after this many status query errors in a row
        #[arg(long)]
        max_failures: Option<u32>,

        /// Do not require an active cluster login
        #[arg(long)]
        skip_login_check: bool,

        /// Stop once the hub is ready, without the post-install step
        #[arg(long)]
        skip_post_install: bool,

        /// Also write the run log to a timestamped file in this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Install { .. } => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init {
            force,
            post_install,
        } => cmd::init::run(&cli.config, force, post_install).map(|()| 0),
        Commands::Login {
            server,
            username,
            password,
        } => cmd::login::login(&server, &username, &password, cli.json).map(|()| 0),
        Commands::Logout => cmd::login::logout(cli.json).map(|()| 0),
        Commands::Check => cmd::check::run(&cli.config, cli.json).map(|()| 0),
        Commands::Status => cmd::status::run(&cli.config, cli.json).map(|()| 0),
        Commands::Install {
            target,
            interval_secs,
            timeout_secs,
            max_failures,
            skip_login_check,
            skip_post_install,
            log_dir,
        } => {
            let args = InstallArgs {
                target,
                interval_secs,
                timeout_secs,
                max_failures,
                skip_login_check,
                skip_post_install,
                log_dir,
            };
            cmd::install::run(&cli.config, args, cli.json)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
