//! Direct `docker run` scripts.

use super::{ContainerDefaults, ContainerNames, ScriptContext, TaskScripts, launch_command, shell_line};

pub(super) fn scripts(defaults: &ContainerDefaults, context: &ScriptContext<'_>) -> TaskScripts {
    let docker = defaults.docker_command.as_str();
    let launcher_image = defaults.launcher_image();
    let names = ContainerNames::new(&defaults.prefix, context.build_id);
    let label = names.label();

    let pull_launcher = shell_line([docker, "pull", launcher_image.as_str()]);
    let pull_build = shell_line([docker, "pull", context.container]);
    let create_launcher = shell_line([
        docker,
        "run",
        "--name",
        names.launcher.as_str(),
        "--label",
        label.as_str(),
        "--entrypoint",
        "/bin/true",
        launcher_image.as_str(),
    ]);
    let volumes_from = format!("{}:rw", names.launcher);
    let command = launch_command(context.build_id, context.ecosystem);
    let create_build = shell_line([
        docker,
        "run",
        "--name",
        names.build.as_str(),
        "--label",
        label.as_str(),
        "--entrypoint",
        "/opt/sd/tini",
        "--memory",
        defaults.memory.as_str(),
        "--memory-swap",
        defaults.memory_limit.as_str(),
        "--volumes-from",
        volumes_from.as_str(),
        "-e",
        "SD_TOKEN",
        context.container,
        "--",
        "/bin/sh",
        "-c",
        command.as_str(),
    ]);
    let wait_build = shell_line([docker, "wait", names.build.as_str()]);

    let build = format!(
        "set -eu\n\n\
         {pull_launcher} &\n\
         {pull_build} &\n\n\
         wait $(jobs -p)\n\n\
         {create_launcher}\n\
         {create_build}\n\n\
         {wait_build}\n"
    );

    let filter = format!("label={label}");
    let list_containers = shell_line([docker, "ps", "-a", "-q", "--filter", filter.as_str()]);
    let remove = shell_line([docker, "rm", "-v", "-f"]);
    let cleanup = format!(
        "containers=$({list_containers})\n\
         if [ -n \"$containers\" ]; then\n  \
         {remove} $containers\n\
         fi\n"
    );

    TaskScripts { build, cleanup }
}
