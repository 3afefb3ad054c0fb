use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the fleet simulation workspace",
    long_about = "A unified CLI for running the simulation server and CI checks\n\
                  in the fleet simulation workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the simulation server (store and upstream URLs from the environment)
    Run {
        /// Extra arguments forwarded to the server binary
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Run CI checks
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CiJob {
    /// fmt + clippy
    Check,
    /// Workspace test suite
    Test,
    /// Everything
    All,
}

fn main() {
    let cli = Cli::parse();
    let ok = match cli.command {
        Commands::Run { args } => run_server(&args),
        Commands::Ci { job } => run_ci(job),
    };
    if !ok {
        exit(1);
    }
}

fn run_server(extra: &[String]) -> bool {
    let mut args = vec!["run", "--release", "-p", "fleet_server", "--"];
    args.extend(extra.iter().map(String::as_str));
    cargo(&args)
}

fn run_ci(job: CiJob) -> bool {
    let fmt: &[&str] = &["fmt", "--all", "--check"];
    let clippy: &[&str] = &[
        "clippy",
        "--workspace",
        "--all-targets",
        "--",
        "-D",
        "warnings",
    ];
    let test: &[&str] = &["test", "--workspace"];

    let steps: Vec<&[&str]> = match job {
        CiJob::Check => vec![fmt, clippy],
        CiJob::Test => vec![test],
        CiJob::All => vec![fmt, clippy, test],
    };
    steps.into_iter().all(|step| cargo(step))
}

fn cargo(args: &[&str]) -> bool {
    match Command::new("cargo").args(args).status() {
        Ok(status) => status.success(),
        Err(err) => {
            eprintln!("failed to spawn cargo {args:?}: {err}");
            false
        }
    }
}
