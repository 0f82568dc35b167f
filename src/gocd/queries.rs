//! Read-only traversals over a resolved pipeline tree.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::model::{GitMaterial, Pipeline};

/// A distinct commit author found in the changed portion of the graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: Option<String>,
}

/// Collects the git materials that contributed changes to this run: the
/// pipeline's own, plus (depth-first) those of every upstream material
/// flagged `changed`. Unchanged links are not traversed; whatever they carry
/// is already covered by an ancestor that did change. De-duplicated and
/// sorted by URL for stable display.
pub fn all_git_materials(pipeline: &Pipeline) -> Vec<&GitMaterial> {
    let mut by_url = BTreeMap::new();
    collect_git_materials(pipeline, &mut by_url);
    by_url.into_values().collect()
}

fn collect_git_materials<'a>(
    pipeline: &'a Pipeline,
    by_url: &mut BTreeMap<&'a str, &'a GitMaterial>,
) {
    for material in &pipeline.git_materials {
        by_url.entry(material.url.as_str()).or_insert(material);
    }
    for material in &pipeline.pipeline_materials {
        if material.changed {
            collect_git_materials(&material.upstream, by_url);
        }
    }
}

/// The distinct `(name, email)` author pairs across all modifications of
/// [`all_git_materials`], sorted for stable display.
pub fn all_commit_authors(pipeline: &Pipeline) -> Vec<CommitAuthor> {
    let mut authors = BTreeSet::new();
    for material in all_git_materials(pipeline) {
        for modification in &material.modifications {
            authors.insert(CommitAuthor {
                name: modification.author_name.clone(),
                email: modification.author_email.clone(),
            });
        }
    }
    authors.into_iter().collect()
}
