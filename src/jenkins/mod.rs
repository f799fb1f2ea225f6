//! Jenkins HTTP implementation of [`RemoteClient`].
//!
//! Every request carries basic auth. When the crumb issuer is enabled the
//! CSRF crumb is fetched once, on the first POST, and reused afterwards.

mod log;

use std::collections::BTreeMap;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{ConfigError, ExecutorConfig};
use crate::gateway::{
    JobInfo, JobName, RemoteClient, RemoteClientError, RemoteCommand, RemoteFuture, RemoteReply,
};

/// Fields requested from the job API when reading build numbers.
const JOB_INFO_TREE: &str = "lastBuild[number],lastCompletedBuild[number]";

/// Longest response body kept in an HTTP error.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug)]
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Crumb {
    crumb: String,
    crumb_request_field: String,
}

/// Client for one Jenkins server.
#[derive(Debug)]
pub struct JenkinsClient {
    http: Client,
    base: Url,
    credentials: Credentials,
    crumb_enabled: bool,
    crumb: OnceCell<Option<Crumb>>,
}

impl JenkinsClient {
    /// Creates a client for the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the host does not form a valid
    /// base URL or the HTTP client cannot be built.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.jenkins_base_url())
            .map_err(|err| ConfigError::Invalid(format!("jenkins_host: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid(String::from(
                "jenkins_host does not form a base URL",
            )));
        }
        let http = Client::builder()
            .build()
            .map_err(|err| ConfigError::Invalid(format!("HTTP client: {err}")))?;
        Ok(Self {
            http,
            base,
            credentials: Credentials {
                username: config.jenkins_username.clone(),
                password: config.jenkins_password.clone(),
            },
            crumb_enabled: config.jenkins_crumb_issuer,
            crumb: OnceCell::new(),
        })
    }

    /// Returns the base URL requests are issued against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    async fn dispatch(&self, command: &RemoteCommand) -> Result<RemoteReply, RemoteClientError> {
        match command {
            RemoteCommand::JobExists { name } => {
                let url = job_url(&self.base, name, &["api", "json"])?;
                let response = self.get(url).await?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(RemoteReply::Exists(false));
                }
                check_status(response).await?;
                Ok(RemoteReply::Exists(true))
            }
            RemoteCommand::JobGet { name } => {
                let mut url = job_url(&self.base, name, &["api", "json"])?;
                url.query_pairs_mut().append_pair("tree", JOB_INFO_TREE);
                let response = check_status(self.get(url).await?).await?;
                let info: JobInfo = response.json().await.map_err(decode_error)?;
                Ok(RemoteReply::Job(info))
            }
            RemoteCommand::JobCreate { name, definition } => {
                let mut url = root_url(&self.base, &["createItem"])?;
                url.query_pairs_mut().append_pair("name", name.as_str());
                self.post_xml(url, definition).await
            }
            RemoteCommand::JobConfig { name, definition } => {
                let url = job_url(&self.base, name, &["config.xml"])?;
                self.post_xml(url, definition).await
            }
            RemoteCommand::JobBuild { name, parameters } => {
                let url = job_url(&self.base, name, &["buildWithParameters"])?;
                self.post_form(url, parameters).await
            }
            RemoteCommand::JobDestroy { name } => {
                let url = job_url(&self.base, name, &["doDelete"])?;
                self.post_empty(url).await
            }
            RemoteCommand::BuildStop { name, number } => {
                let build = number.to_string();
                let url = job_url(&self.base, name, &[build.as_str(), "stop"])?;
                self.post_empty(url).await
            }
            RemoteCommand::BuildLog { name, number } => {
                let build = number.to_string();
                let url = job_url(
                    &self.base,
                    name,
                    &[build.as_str(), "logText", "progressiveText"],
                )?;
                let stream = log::open(self.http.clone(), self.credentials.clone(), url).await?;
                Ok(RemoteReply::Log(stream))
            }
        }
    }

    async fn get(&self, url: Url) -> Result<Response, RemoteClientError> {
        debug!(%url, "GET");
        self.credentials
            .apply(self.http.get(url))
            .send()
            .await
            .map_err(transport_error)
    }

    async fn post(&self, url: Url) -> Result<RequestBuilder, RemoteClientError> {
        debug!(%url, "POST");
        let mut request = self.credentials.apply(self.http.post(url));
        if let Some(crumb) = self.crumb().await? {
            request = request.header(crumb.crumb_request_field.as_str(), crumb.crumb.as_str());
        }
        Ok(request)
    }

    async fn post_xml(&self, url: Url, body: &str) -> Result<RemoteReply, RemoteClientError> {
        let request = self
            .post(url)
            .await?
            .header(CONTENT_TYPE, "application/xml")
            .body(body.to_owned());
        send_for_ack(request).await
    }

    async fn post_form(
        &self,
        url: Url,
        parameters: &BTreeMap<String, String>,
    ) -> Result<RemoteReply, RemoteClientError> {
        let request = self.post(url).await?.form(parameters);
        send_for_ack(request).await
    }

    async fn post_empty(&self, url: Url) -> Result<RemoteReply, RemoteClientError> {
        let request = self.post(url).await?;
        send_for_ack(request).await
    }

    async fn crumb(&self) -> Result<Option<&Crumb>, RemoteClientError> {
        if !self.crumb_enabled {
            return Ok(None);
        }
        let crumb = self
            .crumb
            .get_or_try_init(|| async {
                let url = root_url(&self.base, &["crumbIssuer", "api", "json"])?;
                let response = self.get(url).await?;
                if response.status() == StatusCode::NOT_FOUND {
                    debug!("crumb issuer not available; sending requests without a crumb");
                    return Ok(None);
                }
                let issued: Crumb = check_status(response)
                    .await?
                    .json()
                    .await
                    .map_err(decode_error)?;
                Ok::<_, RemoteClientError>(Some(issued))
            })
            .await?;
        Ok(crumb.as_ref())
    }
}

impl RemoteClient for JenkinsClient {
    fn execute<'a>(&'a self, command: &'a RemoteCommand) -> RemoteFuture<'a, RemoteReply> {
        Box::pin(self.dispatch(command))
    }
}

async fn send_for_ack(request: RequestBuilder) -> Result<RemoteReply, RemoteClientError> {
    let response = request.send().await.map_err(transport_error)?;
    check_status(response).await?;
    Ok(RemoteReply::Ack)
}

/// Builds `<base>/<segments...>`, percent-encoding each segment.
fn root_url(base: &Url, segments: &[&str]) -> Result<Url, RemoteClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| RemoteClientError::Transport {
            message: format!("{base} cannot carry a path"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Builds `<base>/job/<name>/<segments...>`.
fn job_url(base: &Url, name: &JobName, segments: &[&str]) -> Result<Url, RemoteClientError> {
    let mut path = Vec::with_capacity(segments.len().saturating_add(2));
    path.push("job");
    path.push(name.as_str());
    path.extend_from_slice(segments);
    root_url(base, &path)
}

async fn check_status(response: Response) -> Result<Response, RemoteClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteClientError::Http {
        status: status.as_u16(),
        body: truncate(body, ERROR_BODY_LIMIT),
    })
}

fn truncate(mut body: String, limit: usize) -> String {
    if body.len() > limit {
        let mut cut = limit;
        while !body.is_char_boundary(cut) {
            cut = cut.saturating_sub(1);
        }
        body.truncate(cut);
    }
    body
}

fn transport_error(err: reqwest::Error) -> RemoteClientError {
    RemoteClientError::Transport {
        message: err.to_string(),
    }
}

fn decode_error(err: reqwest::Error) -> RemoteClientError {
    RemoteClientError::Decode {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests;
