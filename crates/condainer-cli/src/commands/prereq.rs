use super::{heading, json_pretty, Output, EXIT_FAILURE, EXIT_SUCCESS};
use condainer_runtime::ToolStatus;

pub fn run(out: &Output) -> Result<u8, String> {
    let tools = condainer_runtime::tool_report();
    let all_found = tools.iter().all(|t| t.path.is_some());

    if out.json {
        let payload = serde_json::json!({
            "ok": all_found,
            "tools": tools.iter().map(|t| serde_json::json!({
                "name": t.name,
                "purpose": t.purpose,
                "path": t.path,
            })).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_report(&tools, out.quiet);
    }
    Ok(if all_found { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn print_report(tools: &[ToolStatus], quiet: bool) {
    if !quiet {
        println!("{}", heading("Checking for local tool availability"));
    }
    for tool in tools {
        match &tool.path {
            Some(path) => println!(" ✓ {} : {}", tool.name, path.display()),
            None => println!(" ✗ {} : not found ({})", tool.name, tool.purpose),
        }
    }
    if !quiet {
        let missing: Vec<_> = condainer_runtime::check_build_prereqs()
            .into_iter()
            .chain(condainer_runtime::check_mount_prereqs())
            .collect();
        if !missing.is_empty() {
            println!();
            println!("{}", condainer_runtime::format_missing(&missing));
        }
    }
}
