//! Pure link construction for the GoCD server and GitHub.
//!
//! No network calls happen here; everything is string formatting over values
//! captured when the tree was resolved.

/// Builds the value-stream-map URL for a pipeline instance.
///
/// # Arguments
///
/// * `server` - GoCD base URL, with or without a trailing slash
/// * `name` - Pipeline name
/// * `counter` - Pipeline counter
pub fn value_stream_map_url(server: &str, name: &str, counter: u32) -> String {
    let server = server.trim_end_matches('/');
    format!("{server}/go/pipelines/value_stream_map/{name}/{counter}")
}

/// Builds the URL of one stage of a pipeline instance.
pub fn stage_url(
    server: &str,
    name: &str,
    counter: u32,
    stage_name: &str,
    stage_counter: u32,
) -> String {
    let server = server.trim_end_matches('/');
    format!("{server}/go/pipelines/{name}/{counter}/{stage_name}/{stage_counter}")
}

/// Builds a browsable GitHub repository URL.
pub fn github_repo_url(org: &str, repo: &str) -> String {
    format!("https://github.com/{org}/{repo}")
}

/// Builds a browsable GitHub commit URL.
pub fn github_commit_url(org: &str, repo: &str, revision: &str) -> String {
    format!("https://github.com/{org}/{repo}/commit/{revision}")
}
