use super::{heading, json_pretty, open_project, Output, EXIT_SUCCESS};
use condainer_core::{BuildEvent, StepSelection};
use condainer_runtime::Executor;
use console::Style;
use std::path::Path;

pub fn run(
    dir: &Path,
    steps: &StepSelection,
    executor: &dyn Executor,
    out: &Output,
) -> Result<u8, String> {
    let mut project = open_project(dir)?;
    let chatty = out.chatty();
    let observer = |event: &BuildEvent| {
        if chatty {
            print_event(event);
        }
    };

    let report = match condainer_core::build(&mut project, executor, steps, &observer) {
        Ok(r) => r,
        Err(e) => {
            if chatty {
                println!("{}", Style::new().red().bold().apply_to("✗ build failed"));
            }
            return Err(e.to_string());
        }
    };

    if out.json {
        let payload = serde_json::json!({
            "status": if out.dry_run { "planned" } else { "built" },
            "image": report.image,
            "env_name": report.env_name,
            "completed": report.completed.iter().map(|s| s.number()).collect::<Vec<_>>(),
            "skipped": report.skipped.iter().map(|(s, _)| s.number()).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else if chatty && !out.dry_run {
        println!("{}", Style::new().green().bold().apply_to("✓ build finished"));
        println!("image: {}", report.image.display());
        if project.dir().join("activate").is_file() {
            println!("enable with: source {}", project.dir().join("activate").display());
        }
    }
    Ok(EXIT_SUCCESS)
}

fn print_event(event: &BuildEvent) {
    match event {
        BuildEvent::Started(step) => println!("{}", heading(&format!("▸ {step}"))),
        BuildEvent::Finished(step) => {
            println!("{}", Style::new().green().apply_to(format!("✓ {step}")));
        }
        BuildEvent::Skipped { step, reason } => {
            println!("{}", Style::new().dim().apply_to(format!("- {step} skipped: {reason}")));
        }
    }
}
