use super::{json_pretty, open_project, Output, EXIT_FAILURE};
use condainer_core::FileLockProvider;
use condainer_runtime::Executor;
use std::path::Path;

/// Exits with the child's own exit code.
pub fn run(
    dir: &Path,
    command: &[String],
    executor: &dyn Executor,
    out: &Output,
) -> Result<u8, String> {
    let project = open_project(dir)?;
    let cwd = std::env::current_dir().map_err(|e| format!("current directory: {e}"))?;

    let outcome = condainer_core::exec(&project, executor, &FileLockProvider, command, Some(&cwd))
        .map_err(|e| e.to_string())?;

    if out.json {
        let payload = serde_json::json!({
            "exit_code": outcome.exit_code,
            "mounted_here": outcome.mounted_here,
        });
        eprintln!("{}", json_pretty(&payload)?);
    }
    Ok(u8::try_from(outcome.exit_code).unwrap_or(EXIT_FAILURE))
}
