mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{Output, EXIT_FAILURE};
use condainer_core::{install_signal_handler, StepSelection};
use condainer_runtime::{DryRunExecutor, Executor, SystemExecutor};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "condainer",
    version,
    about = "Build, mount, and run commands inside compressed conda environment images"
)]
struct Cli {
    /// Suppress informational output.
    #[arg(short, long, default_value_t = false, global = true)]
    quiet: bool,

    /// Print external commands and filesystem changes instead of performing them.
    #[arg(long, default_value_t = false, global = true)]
    dry_run: bool,

    /// Project directory.
    #[arg(short = 'd', long, default_value = ".", global = true)]
    directory: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a project skeleton and fetch the installer.
    Init {
        /// Package an application with its own installer instead of a conda environment.
        #[arg(long, default_value_t = false)]
        non_conda_application: bool,
        /// Append the user id to the mount point so several users can mount the same image.
        #[arg(long, default_value_t = false)]
        multiuser_mountpoint: bool,
        /// Installer URL or local path.
        #[arg(long, env = "CONDAINER_INSTALLER")]
        installer: Option<String>,
    },
    /// Build the compressed environment image.
    Build {
        /// Comma-separated build steps to run (1-7).
        #[arg(long, default_value = "1,2,3,4,5,6,7")]
        steps: StepSelection,
    },
    /// Mount the image (no-op if already mounted).
    Mount {
        /// Print only the mount directory.
        #[arg(long, default_value_t = false)]
        print: bool,
    },
    /// Unmount the image (no-op if not mounted).
    Umount,
    /// Run a command inside the environment, mounting the image if needed.
    Exec {
        /// Command and arguments to run.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Show resolved paths and mount state.
    Status,
    /// Check that the required external tools are installed.
    Prereq,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CONDAINER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let out = Output {
        quiet: cli.quiet,
        json: cli.json,
        dry_run: cli.dry_run,
    };
    let executor: Box<dyn Executor> = if cli.dry_run {
        Box::new(DryRunExecutor::new(cli.quiet || cli.json))
    } else {
        Box::new(SystemExecutor::new())
    };

    if !cli.dry_run && std::env::var("CONDAINER_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = match cli.command {
            Commands::Build { .. } => condainer_runtime::check_build_prereqs(),
            Commands::Mount { .. } | Commands::Umount | Commands::Exec { .. } => {
                condainer_runtime::check_mount_prereqs()
            }
            _ => Vec::new(),
        };
        if !missing.is_empty() {
            eprintln!("error: {}", condainer_runtime::format_missing(&missing));
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let dir = &cli.directory;
    tracing::debug!("project directory {}", dir.display());
    let result = match cli.command {
        Commands::Init {
            non_conda_application,
            multiuser_mountpoint,
            installer,
        } => commands::init::run(
            dir,
            &condainer_schema::InitOptions {
                installer_url: installer,
                non_conda_application,
                multiuser_mountpoint,
            },
            executor.as_ref(),
            &out,
        ),
        Commands::Build { steps } => commands::build::run(dir, &steps, executor.as_ref(), &out),
        Commands::Mount { print } => commands::mount::run(dir, print, executor.as_ref(), &out),
        Commands::Umount => commands::umount::run(dir, executor.as_ref(), &out),
        Commands::Exec { command } => commands::exec::run(dir, &command, executor.as_ref(), &out),
        Commands::Status => commands::status::run(dir, &out),
        Commands::Prereq => commands::prereq::run(&out),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exec_keeps_hyphenated_arguments() {
        let cli = Cli::try_parse_from(["condainer", "exec", "python", "-c", "print(1)"]).unwrap();
        match cli.command {
            Commands::Exec { command } => assert_eq!(command, ["python", "-c", "print(1)"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["condainer", "mount", "--quiet", "-d", "/p"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.directory, PathBuf::from("/p"));
    }

    #[test]
    fn invalid_steps_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["condainer", "build", "--steps", "1,9"]).is_err());
        let cli = Cli::try_parse_from(["condainer", "build", "--steps", "5"]).unwrap();
        match cli.command {
            Commands::Build { steps } => {
                assert_eq!(steps, StepSelection::only([condainer_core::BuildStep::Compress]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
