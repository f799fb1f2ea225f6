//! Unit tests for Jenkins URL construction and client setup.

use reqwest::Url;
use rstest::rstest;

use super::{ERROR_BODY_LIMIT, JenkinsClient, job_url, root_url, truncate};
use crate::backend::BuildId;
use crate::config::{ConfigError, sample_config};
use crate::gateway::JobName;

fn base() -> Url {
    Url::parse("http://jenkins:8080").unwrap_or_else(|err| panic!("base url: {err}"))
}

fn job(build_id: &str) -> JobName {
    JobName::for_build("SD-", &BuildId::from(build_id))
}

#[rstest]
#[case::api(&["api", "json"], "http://jenkins:8080/job/SD-b1/api/json")]
#[case::config(&["config.xml"], "http://jenkins:8080/job/SD-b1/config.xml")]
#[case::stop(&["7", "stop"], "http://jenkins:8080/job/SD-b1/7/stop")]
#[case::log(
    &["7", "logText", "progressiveText"],
    "http://jenkins:8080/job/SD-b1/7/logText/progressiveText"
)]
fn builds_job_urls(#[case] segments: &[&str], #[case] expected: &str) {
    let url = job_url(&base(), &job("b1"), segments)
        .unwrap_or_else(|err| panic!("url should build: {err}"));
    assert_eq!(url.as_str(), expected);
}

#[test]
fn encodes_job_names_as_single_segments() {
    let url = job_url(&base(), &job("a/b c?"), &["doDelete"])
        .unwrap_or_else(|err| panic!("url should build: {err}"));
    assert_eq!(url.as_str(), "http://jenkins:8080/job/SD-a%2Fb%20c%3F/doDelete");
}

#[test]
fn builds_root_urls() {
    let mut url = root_url(&base(), &["createItem"])
        .unwrap_or_else(|err| panic!("url should build: {err}"));
    url.query_pairs_mut().append_pair("name", "SD-b1");
    assert_eq!(url.as_str(), "http://jenkins:8080/createItem?name=SD-b1");
}

#[test]
fn client_uses_configured_scheme_and_port() {
    let mut config = sample_config();
    config.jenkins_use_tls = true;
    config.jenkins_port = 8443;

    let client = JenkinsClient::from_config(&config)
        .unwrap_or_else(|err| panic!("client should build: {err}"));

    assert_eq!(client.base_url().as_str(), "https://jenkins:8443/");
}

#[test]
fn rejects_unparseable_host() {
    let mut config = sample_config();
    config.jenkins_host = String::from("bad host");

    let err = JenkinsClient::from_config(&config).expect_err("host with space is invalid");
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn truncates_long_error_bodies_on_char_boundaries() {
    let body = "é".repeat(ERROR_BODY_LIMIT);
    let short = truncate(body, ERROR_BODY_LIMIT);
    assert!(short.len() <= ERROR_BODY_LIMIT);
    assert!(short.chars().all(|ch| ch == 'é'));
    assert_eq!(truncate(String::from("ok"), ERROR_BODY_LIMIT), "ok");
}
