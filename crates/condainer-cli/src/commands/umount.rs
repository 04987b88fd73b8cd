use super::{json_pretty, maybe_spinner, open_project, spin_fail, spin_ok, Output, EXIT_SUCCESS};
use condainer_core::UnmountOutcome;
use condainer_runtime::Executor;
use std::path::Path;

pub fn run(dir: &Path, executor: &dyn Executor, out: &Output) -> Result<u8, String> {
    let project = open_project(dir)?;

    let pb = maybe_spinner(out, "unmounting image...");
    let outcome = match condainer_core::umount(&project, executor) {
        Ok(o) => o,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "unmount failed");
            }
            return Err(e.to_string());
        }
    };
    if let Some(ref pb) = pb {
        match outcome {
            UnmountOutcome::Unmounted => spin_ok(pb, "unmounted"),
            UnmountOutcome::NotMounted => pb.finish_and_clear(),
        }
    }

    if out.json {
        let payload = serde_json::json!({
            "mount_point": project.mount_dir(),
            "status": match outcome {
                UnmountOutcome::Unmounted => "unmounted",
                UnmountOutcome::NotMounted => "not_mounted",
            },
        });
        println!("{}", json_pretty(&payload)?);
    } else if out.chatty() && outcome == UnmountOutcome::NotMounted {
        println!("hint: condainer not mounted");
    }
    Ok(EXIT_SUCCESS)
}
