//! Serializable projection of a resolved pipeline tree.
//!
//! This is the handoff surface to whatever renders the dashboard: every
//! status, link, changed material, and author is precomputed here so the
//! renderer performs no traversal (and no fetching) of its own.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gocd::model::{GitHubRepo, Group, GroupStatus, Pipeline, PipelineStatus, StageStatus};
use crate::gocd::queries::{self, CommitAuthor};

#[derive(Debug, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub name: String,
    pub result: GroupStatus,
    pub pipelines: Vec<PipelineView>,
}

#[derive(Debug, Serialize)]
pub struct PipelineView {
    pub name: String,
    pub counter: u32,
    pub result: PipelineStatus,
    pub value_stream_map_url: String,
    pub failed_stage: Option<String>,
    pub running_stage: Option<String>,
    pub stages: Vec<StageView>,
    /// Changed materials only, recursively through changed upstream links.
    pub materials: Vec<MaterialView>,
    pub authors: Vec<CommitAuthor>,
}

#[derive(Debug, Serialize)]
pub struct StageView {
    pub name: String,
    pub counter: u32,
    pub status: StageStatus,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct MaterialView {
    pub url: String,
    pub label: String,
    pub link: String,
    pub github: Option<GitHubRepo>,
    pub commits: Vec<CommitView>,
}

#[derive(Debug, Serialize)]
pub struct CommitView {
    pub revision: String,
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub link: Option<String>,
}

impl DashboardSnapshot {
    /// Captures the resolved tree as plain serializable data.
    pub fn capture(groups: &[Group]) -> Self {
        Self {
            generated_at: Utc::now(),
            groups: groups.iter().map(group_view).collect(),
        }
    }
}

fn group_view(group: &Group) -> GroupView {
    GroupView {
        name: group.name.clone(),
        result: group.result(),
        pipelines: group.pipelines.iter().map(|p| pipeline_view(p)).collect(),
    }
}

fn pipeline_view(pipeline: &Pipeline) -> PipelineView {
    let materials = queries::all_git_materials(pipeline)
        .into_iter()
        .map(|material| MaterialView {
            url: material.url.clone(),
            label: material.label(),
            link: material.link(),
            github: material.github.clone(),
            commits: material
                .modifications
                .iter()
                .map(|modification| CommitView {
                    revision: modification.revision.clone(),
                    message: modification.message.clone(),
                    author_name: modification.author_name.clone(),
                    author_email: modification.author_email.clone(),
                    link: modification.commit_link(material),
                })
                .collect(),
        })
        .collect();

    PipelineView {
        name: pipeline.name.clone(),
        counter: pipeline.counter,
        result: pipeline.result(),
        value_stream_map_url: pipeline.value_stream_map_url(),
        failed_stage: pipeline.failed_stage().map(|s| s.name.clone()),
        running_stage: pipeline.running_stage().map(|s| s.name.clone()),
        stages: pipeline
            .stages
            .iter()
            .map(|stage| StageView {
                name: stage.name.clone(),
                counter: stage.counter,
                status: stage.status(),
                url: pipeline.stage_url(stage),
            })
            .collect(),
        materials,
        authors: queries::all_commit_authors(pipeline),
    }
}
