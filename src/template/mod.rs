//! Jenkins job definition rendering.
//!
//! `templates/job.xml` is compiled into the binary. The node label and both
//! scripts are XML escaped on substitution, so no value can change the
//! document structure.

use askama::Template;
use thiserror::Error;

/// Build parameter carrying the build identifier.
pub const BUILD_ID_PARAMETER: &str = "SD_BUILD_ID";
/// Build parameter carrying the build token. Declared as a password.
pub const TOKEN_PARAMETER: &str = "SD_TOKEN";
/// Build parameter carrying the build container image.
pub const CONTAINER_PARAMETER: &str = "SD_CONTAINER";
/// Build parameter carrying the API URI.
pub const API_PARAMETER: &str = "SD_API";
/// Build parameter carrying the store URI.
pub const STORE_PARAMETER: &str = "SD_STORE";
/// Build parameter carrying the UI URI.
pub const UI_PARAMETER: &str = "SD_UI";
/// Build parameter carrying the build timeout in minutes.
pub const TIMEOUT_PARAMETER: &str = "SD_BUILD_TIMEOUT";

const STRING_PARAMETERS: [&str; 6] = [
    BUILD_ID_PARAMETER,
    CONTAINER_PARAMETER,
    API_PARAMETER,
    STORE_PARAMETER,
    UI_PARAMETER,
    TIMEOUT_PARAMETER,
];

#[derive(Template)]
#[template(path = "job.xml", escape = "html")]
struct JobDefinition<'a> {
    node_label: &'a str,
    build_script: &'a str,
    cleanup_script: &'a str,
    string_parameters: &'a [&'a str],
    token_parameter: &'a str,
}

/// Errors raised while rendering a job definition.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template engine rejected the values.
    #[error("failed to render job definition: {0}")]
    Render(#[from] askama::Error),
}

/// Renders the `config.xml` of a job pinned to `node_label` that runs
/// `build_script` and, after every build, `cleanup_script`.
///
/// # Errors
///
/// Returns [`TemplateError::Render`] when rendering fails.
pub fn render_job_definition(
    node_label: &str,
    build_script: &str,
    cleanup_script: &str,
) -> Result<String, TemplateError> {
    let definition = JobDefinition {
        node_label,
        build_script,
        cleanup_script,
        string_parameters: &STRING_PARAMETERS,
        token_parameter: TOKEN_PARAMETER,
    };
    Ok(definition.render()?)
}

#[cfg(test)]
mod tests;
