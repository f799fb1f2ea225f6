//! Compose manifest scripts.
//!
//! The manifest is rendered from `templates/compose.yml` and written by the
//! build script through a quoted here-document, so the shell performs no
//! expansion inside it. Every substituted value is a double-quoted YAML
//! scalar with `$` doubled for compose interpolation; no value can span lines
//! and so none can terminate the here-document.

use askama::Template;

use super::{
    ContainerDefaults, ContainerNames, ScriptContext, ScriptError, TaskScripts, launch_command,
    shell_line,
};

const MANIFEST_DELIMITER: &str = "SD_COMPOSE_MANIFEST";

#[derive(Template)]
#[template(path = "compose.yml", escape = "none")]
struct ComposeManifest {
    launcher_image: String,
    launcher_name: String,
    build_image: String,
    build_name: String,
    tag: String,
    memory: String,
    memory_limit: String,
    command: String,
}

pub(super) fn scripts(
    defaults: &ContainerDefaults,
    context: &ScriptContext<'_>,
) -> Result<TaskScripts, ScriptError> {
    let names = ContainerNames::new(&defaults.prefix, context.build_id);
    let manifest = ComposeManifest {
        launcher_image: scalar(&defaults.launcher_image()),
        launcher_name: scalar(&names.launcher),
        build_image: scalar(context.container),
        build_name: scalar(&names.build),
        tag: scalar(&names.tag),
        memory: scalar(&defaults.memory),
        memory_limit: scalar(&defaults.memory_limit),
        command: scalar(&launch_command(context.build_id, context.ecosystem)),
    }
    .render()?;

    let manifest_path = defaults
        .manifest_dir
        .join(format!("{}-compose.yml", names.tag));
    let project = project_name(&names.tag);
    let compose = |action: &[&str]| {
        let mut words: Vec<&str> = defaults.compose_command.iter().map(String::as_str).collect();
        words.extend(["-f", manifest_path.as_str(), "-p", project.as_str()]);
        words.extend_from_slice(action);
        shell_line(words)
    };

    let make_dir = shell_line(["mkdir", "-p", defaults.manifest_dir.as_str()]);
    let write_manifest = format!(
        "cat > {} <<'{MANIFEST_DELIMITER}'",
        shell_line([manifest_path.as_str()])
    );
    let pull = compose(&["pull"]);
    let up = compose(&["up", "-d"]);
    let wait_build = shell_line([
        defaults.docker_command.as_str(),
        "wait",
        names.build.as_str(),
    ]);

    let build = format!(
        "set -eu\n\n\
         {make_dir}\n\
         {write_manifest}\n\
         {}\n\
         {MANIFEST_DELIMITER}\n\n\
         {pull}\n\
         {up}\n\n\
         {wait_build}\n",
        manifest.trim_end()
    );

    let down = compose(&["down", "-v"]);
    let remove_manifest = shell_line(["rm", "-f", manifest_path.as_str()]);
    let cleanup = format!("{down}\n{remove_manifest}\n");

    Ok(TaskScripts { build, cleanup })
}

/// Quotes `value` as a single-line YAML scalar that compose will not
/// interpolate.
fn scalar(value: &str) -> String {
    let literal = value.replace('$', "$$");
    // A JSON string is a valid double-quoted YAML scalar.
    serde_json::Value::String(literal).to_string()
}

/// Compose project names allow lowercase letters, digits, `-` and `_` only.
fn project_name(tag: &str) -> String {
    let sanitized: String = tag
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '_' || lower == '-' {
                lower
            } else {
                '-'
            }
        })
        .collect();
    format!("sd-{sanitized}")
}
