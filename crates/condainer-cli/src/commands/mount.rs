use super::{
    json_pretty, maybe_spinner, open_project, print_usage_hint, spin_fail, spin_ok, Output,
    EXIT_SUCCESS,
};
use condainer_core::MountOutcome;
use condainer_runtime::Executor;
use std::path::Path;

pub fn run(dir: &Path, print: bool, executor: &dyn Executor, out: &Output) -> Result<u8, String> {
    let project = open_project(dir)?;
    let mount_dir = project.mount_dir();

    let pb = if print {
        None
    } else {
        maybe_spinner(out, "mounting image...")
    };
    let outcome = match condainer_core::mount(&project, executor) {
        Ok(o) => o,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "mount failed");
            }
            return Err(e.to_string());
        }
    };
    if let Some(ref pb) = pb {
        match outcome {
            MountOutcome::Mounted => spin_ok(pb, &format!("mounted at {}", mount_dir.display())),
            MountOutcome::AlreadyMounted => pb.finish_and_clear(),
        }
    }

    if print {
        println!("{}", mount_dir.display());
    } else if out.json {
        let payload = serde_json::json!({
            "mount_point": mount_dir,
            "status": match outcome {
                MountOutcome::Mounted => "mounted",
                MountOutcome::AlreadyMounted => "already_mounted",
            },
        });
        println!("{}", json_pretty(&payload)?);
    } else if out.chatty() {
        if outcome == MountOutcome::AlreadyMounted {
            println!("hint: condainer already mounted");
        } else if !out.dry_run {
            print_usage_hint(&project);
        }
    }
    Ok(EXIT_SUCCESS)
}
