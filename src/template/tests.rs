//! Unit tests for job definition rendering.

use rstest::rstest;

use super::{TIMEOUT_PARAMETER, TOKEN_PARAMETER, render_job_definition};

fn render(node_label: &str, build: &str, cleanup: &str) -> String {
    render_job_definition(node_label, build, cleanup)
        .unwrap_or_else(|err| panic!("definition should render: {err}"))
}

#[test]
fn substitutes_label_and_scripts() {
    let xml = render("screwdriver", "echo build", "echo cleanup");

    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<assignedNode>screwdriver</assignedNode>"));
    assert!(xml.contains("<command>echo build</command>"));
    assert!(xml.contains("<command>echo cleanup</command>"));
}

#[rstest]
#[case::angle_brackets("node:<latest>", "node:&lt;latest&gt;")]
#[case::ampersand("run & wait", "run &amp; wait")]
#[case::quotes("say \"hi\"", "say &#34;hi&#34;")]
fn escapes_markup_in_scripts(#[case] raw: &str, #[case] escaped: &str) {
    let xml = render("screwdriver", raw, "");

    assert!(xml.contains(&format!("<command>{escaped}</command>")), "xml: {xml}");
    assert!(!xml.contains(raw));
}

#[test]
fn closing_tag_in_a_value_does_not_break_the_document() {
    let xml = render("pool</assignedNode><canRoam>true", "true", "true");

    assert_eq!(xml.matches("<assignedNode>").count(), 1);
    assert_eq!(xml.matches("</assignedNode>").count(), 1);
    assert!(!xml.contains("<canRoam>true"));
}

#[test]
fn declares_build_parameters() {
    let xml = render("screwdriver", "true", "true");

    for name in ["SD_BUILD_ID", "SD_CONTAINER", "SD_API", "SD_STORE", "SD_UI"] {
        assert!(xml.contains(&format!("<name>{name}</name>")), "{name} missing");
    }
    assert!(xml.contains(&format!(
        "<hudson.model.PasswordParameterDefinition>\n          <name>{TOKEN_PARAMETER}</name>"
    )));
    assert!(xml.contains(&format!("<timeoutMinutes>${{{TIMEOUT_PARAMETER}}}</timeoutMinutes>")));
}

#[test]
fn cleanup_runs_for_every_build_result() {
    let xml = render("screwdriver", "true", "docker rm -f x");

    assert!(xml.contains("<scriptOnlyIfSuccess>false</scriptOnlyIfSuccess>"));
    assert!(xml.contains("<scriptOnlyIfFailure>false</scriptOnlyIfFailure>"));
    let publishers = xml
        .find("<publishers>")
        .unwrap_or_else(|| panic!("publishers missing"));
    let cleanup = xml
        .find("<command>docker rm -f x</command>")
        .unwrap_or_else(|| panic!("cleanup missing"));
    assert!(publishers < cleanup);
}
