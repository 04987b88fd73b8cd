use super::{json_pretty, Output, EXIT_SUCCESS};
use condainer_core::{InitReport, InstallerSource};
use condainer_runtime::Executor;
use condainer_schema::InitOptions;
use std::path::Path;

pub fn run(
    dir: &Path,
    options: &InitOptions,
    executor: &dyn Executor,
    out: &Output,
) -> Result<u8, String> {
    let report = condainer_core::init(dir, options, executor).map_err(|e| e.to_string())?;

    if out.json {
        let payload = serde_json::json!({
            "status": if out.dry_run { "planned" } else { "initialized" },
            "uuid": report.config.uuid,
            "installer": installer_path(&report),
            "example_manifest": report.wrote_example_manifest,
        });
        println!("{}", json_pretty(&payload)?);
    } else if out.chatty() {
        print_report(&report);
    }
    Ok(EXIT_SUCCESS)
}

fn installer_path(report: &InitReport) -> &Path {
    match &report.installer {
        InstallerSource::Downloaded(p)
        | InstallerSource::AlreadyPresent(p)
        | InstallerSource::Local(p) => p,
    }
}

fn print_report(report: &InitReport) {
    match &report.installer {
        InstallerSource::Downloaded(p) => println!("downloaded installer {}", p.display()),
        InstallerSource::AlreadyPresent(p) => {
            println!("Found existing installer {}, skipping download.", p.display());
        }
        InstallerSource::Local(p) => println!("Using installer {}", p.display()),
    }
    if report.wrote_example_manifest {
        println!(
            "wrote example {}, edit it before running `condainer build`",
            report.config.environment_yml.display()
        );
    }
    println!("initialized project {}", report.config.uuid);
}
