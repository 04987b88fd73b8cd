use super::{heading, json_pretty, open_project, Output, EXIT_SUCCESS};
use condainer_core::ProjectStatus;
use std::path::Path;

pub fn run(dir: &Path, out: &Output) -> Result<u8, String> {
    let project = open_project(dir)?;
    let status = condainer_core::status(&project).map_err(|e| e.to_string())?;

    if out.json {
        println!("{}", json_pretty(&status)?);
    } else {
        print!("{}", render(&status, !out.quiet));
    }
    Ok(EXIT_SUCCESS)
}

fn render(status: &ProjectStatus, with_heading: bool) -> String {
    let mut text = String::new();
    if with_heading {
        text.push_str(&heading("Condainer status"));
        text.push('\n');
    }
    let image_state = if status.image_present { "" } else { " (not built)" };
    let lines = [
        ("project directory", status.project_directory.display().to_string()),
        ("uuid", status.uuid.clone()),
        ("squashfs image", format!("{}{image_state}", status.image.display())),
        ("fuse mount point", status.mount_point.display().to_string()),
        (
            "environment",
            status.env_name.clone().unwrap_or_else(|| "-".to_owned()),
        ),
        ("image mounted", status.mounted.to_string()),
    ];
    for (label, value) in lines {
        text.push_str(&format!(" - {label}: {value}\n"));
    }
    text
}
