//! Domain entities built from one resolution pass, plus status aggregation.
//!
//! Everything here is immutable once constructed. Upstream pipelines are held
//! as `Arc<Pipeline>` so a diamond dependency reached through two paths shares
//! a single instance.

use std::sync::Arc;

use serde::Serialize;

use super::links;

/// A named set of pipelines, in configuration order.
#[derive(Debug)]
pub struct Group {
    pub name: String,
    pub pipelines: Vec<Arc<Pipeline>>,
}

/// One executed instance (name + counter) of a pipeline definition.
#[derive(Debug)]
pub struct Pipeline {
    pub name: String,
    pub counter: u32,
    pub stages: Vec<Stage>,
    pub git_materials: Vec<GitMaterial>,
    /// Sorted by upstream name for deterministic traversal and display.
    pub pipeline_materials: Vec<PipelineMaterial>,
    /// Base server URL captured at construction. Used only to format links,
    /// never to fetch.
    pub server: Arc<str>,
}

#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub counter: u32,
    pub result: Option<StageResult>,
}

/// Stage outcome as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StageResult {
    Passed,
    Failed,
    /// Reported by GoCD while the stage is building.
    Unknown,
    /// Any result string this client does not recognize.
    Other(String),
}

/// Derived stage status used for aggregation and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Passed,
    Running,
    Failed,
    /// No result yet: the stage has not run. Not a failure.
    Unknown,
}

/// Overall pipeline outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStatus {
    Passed,
    Running,
    Failed,
}

/// Overall group outcome label. Groups do not surface a running tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupStatus {
    Passed,
    Failed,
}

/// A git repository revision that fed a pipeline run. Identity key is `url`.
#[derive(Debug, Clone)]
pub struct GitMaterial {
    pub url: String,
    pub changed: bool,
    pub modifications: Vec<GitModification>,
    pub github: Option<GitHubRepo>,
}

/// GitHub organisation and repository, used to create links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitHubRepo {
    pub org: String,
    pub repo: String,
}

#[derive(Debug, Clone)]
pub struct GitModification {
    pub message: String,
    pub revision: String,
    pub author_name: String,
    pub author_email: Option<String>,
}

/// An upstream pipeline's output used as an input to this run.
/// Identity key is `(name, counter)`.
#[derive(Debug)]
pub struct PipelineMaterial {
    pub name: String,
    pub counter: u32,
    pub changed: bool,
    /// Shared with the resolver's memo pool: the same upstream instance
    /// reached via two different paths is the same allocation.
    pub upstream: Arc<Pipeline>,
}

impl Stage {
    pub fn status(&self) -> StageStatus {
        match &self.result {
            Some(StageResult::Passed) => StageStatus::Passed,
            Some(StageResult::Unknown) => StageStatus::Running,
            Some(StageResult::Failed) | Some(StageResult::Other(_)) => StageStatus::Failed,
            None => StageStatus::Unknown,
        }
    }

    /// A stage with no result yet counts as passed for aggregation.
    pub fn passed(&self) -> bool {
        matches!(self.status(), StageStatus::Passed | StageStatus::Unknown)
    }
}

impl StageResult {
    pub fn from_wire(result: &str) -> StageResult {
        match result {
            "Passed" => StageResult::Passed,
            "Failed" => StageResult::Failed,
            "Unknown" => StageResult::Unknown,
            other => StageResult::Other(other.to_string()),
        }
    }
}

impl Pipeline {
    pub fn passed(&self) -> bool {
        self.stages.iter().all(Stage::passed)
    }

    pub fn running(&self) -> bool {
        self.stages.iter().any(|s| s.status() == StageStatus::Running)
    }

    pub fn failed(&self) -> bool {
        self.stages.iter().any(|s| s.status() == StageStatus::Failed)
    }

    /// `Failed` if any stage failed, else `Running` if any stage is still
    /// building, else `Passed`.
    pub fn result(&self) -> PipelineStatus {
        if self.failed() {
            PipelineStatus::Failed
        } else if self.running() {
            PipelineStatus::Running
        } else {
            PipelineStatus::Passed
        }
    }

    /// First failing stage in stage order, if any.
    pub fn failed_stage(&self) -> Option<&Stage> {
        self.stages.iter().find(|s| s.status() == StageStatus::Failed)
    }

    /// First running stage in stage order, if any.
    pub fn running_stage(&self) -> Option<&Stage> {
        self.stages.iter().find(|s| s.status() == StageStatus::Running)
    }

    /// Link to this instance's value stream map on the server.
    pub fn value_stream_map_url(&self) -> String {
        links::value_stream_map_url(&self.server, &self.name, self.counter)
    }

    /// Link to one of this instance's stages on the server.
    pub fn stage_url(&self, stage: &Stage) -> String {
        links::stage_url(&self.server, &self.name, self.counter, &stage.name, stage.counter)
    }
}

impl Group {
    pub fn passed(&self) -> bool {
        self.pipelines.iter().all(|p| p.passed())
    }

    pub fn result(&self) -> GroupStatus {
        if self.passed() {
            GroupStatus::Passed
        } else {
            GroupStatus::Failed
        }
    }
}

impl GitMaterial {
    /// Display name: `org/repo` for GitHub remotes, the raw URL otherwise.
    pub fn label(&self) -> String {
        match &self.github {
            Some(gh) => format!("{}/{}", gh.org, gh.repo),
            None => self.url.clone(),
        }
    }

    /// Browsable link for the repository, when one can be constructed.
    pub fn link(&self) -> String {
        match &self.github {
            Some(gh) => links::github_repo_url(&gh.org, &gh.repo),
            None => self.url.clone(),
        }
    }
}

impl GitModification {
    /// Browsable link to the commit, for GitHub-hosted materials.
    pub fn commit_link(&self, material: &GitMaterial) -> Option<String> {
        material
            .github
            .as_ref()
            .map(|gh| links::github_commit_url(&gh.org, &gh.repo, &self.revision))
    }
}
