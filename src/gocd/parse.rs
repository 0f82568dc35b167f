//! Converts raw pipeline-instance documents into typed entities.
//!
//! Git materials and modifications are extracted with the same regexes GoCD
//! uses to describe them; pipeline materials are reduced to `(name, counter)`
//! stubs that the resolver turns into real upstream references. Malformed
//! documents are fatal: they indicate an incompatible or corrupted server
//! response, not something recoverable here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GoDashError, Result};

use super::model::{GitHubRepo, GitMaterial, GitModification, Stage, StageResult};
use super::types::{HistoryDoc, MaterialRevision, ModificationDoc, StageDoc};

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^URL: (.+), Branch: .+$").unwrap());
static RE_GITHUB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^git@github\.com:([\w-]+)/([\w-]+)\.git$").unwrap());
static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+) <(.+)>$").unwrap());

/// An unresolved pipeline material: enough to fetch the upstream instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStub {
    pub name: String,
    pub counter: u32,
    pub changed: bool,
}

/// Extracts the most recent counter from a pipeline's history.
pub fn latest_counter(name: &str, history: &HistoryDoc) -> Result<u32> {
    history
        .pipelines
        .first()
        .map(|entry| entry.counter)
        .ok_or_else(|| GoDashError::Parse(format!("pipeline '{name}' has no history")))
}

pub fn stage(doc: &StageDoc) -> Stage {
    Stage {
        name: doc.name.clone(),
        counter: doc.counter.unwrap_or(1),
        result: doc.result.as_deref().map(StageResult::from_wire),
    }
}

/// Splits material revisions into git materials and pipeline stubs by their
/// declared type. Any other type is fatal.
pub fn partition_revisions(
    revisions: &[MaterialRevision],
) -> Result<(Vec<GitMaterial>, Vec<PipelineStub>)> {
    let mut git = Vec::new();
    let mut pipelines = Vec::new();

    for revision in revisions {
        match revision.material.kind.as_str() {
            "Git" => git.push(git_material(revision)?),
            "Pipeline" => pipelines.push(pipeline_stub(revision)?),
            other => {
                return Err(GoDashError::Parse(format!(
                    "unknown material type '{other}'"
                )))
            }
        }
    }

    Ok((git, pipelines))
}

pub fn git_material(revision: &MaterialRevision) -> Result<GitMaterial> {
    let description = revision
        .material
        .description
        .as_deref()
        .ok_or_else(|| GoDashError::Parse("git material without description".to_string()))?;

    let url = RE_URL
        .captures(description)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| {
            GoDashError::Parse(format!("could not parse material description '{description}'"))
        })?;

    let github = RE_GITHUB.captures(&url).map(|captures| GitHubRepo {
        org: captures[1].to_string(),
        repo: captures[2].to_string(),
    });

    let modifications = revision
        .modifications
        .iter()
        .map(git_modification)
        .collect::<Result<Vec<_>>>()?;

    Ok(GitMaterial {
        url,
        changed: revision.changed,
        modifications,
        github,
    })
}

pub fn git_modification(doc: &ModificationDoc) -> Result<GitModification> {
    let message = doc
        .comment
        .clone()
        .ok_or_else(|| GoDashError::Parse("git modification without comment".to_string()))?;
    let author = doc
        .user_name
        .as_deref()
        .ok_or_else(|| GoDashError::Parse("git modification without user_name".to_string()))?;

    let (author_name, author_email) = parse_author(author);

    Ok(GitModification {
        message,
        revision: doc.revision.clone(),
        author_name,
        author_email,
    })
}

/// Splits a `"Name <email>"` author field. A string that does not match the
/// pattern becomes the whole name with no email; this is not an error.
fn parse_author(author: &str) -> (String, Option<String>) {
    match RE_AUTHOR.captures(author) {
        Some(captures) => (captures[1].to_string(), Some(captures[2].to_string())),
        None => (author.to_string(), None),
    }
}

/// Reads `(name, counter, changed)` from a pipeline material revision.
///
/// The protocol guarantees exactly one modification per pipeline-material
/// revision snapshot, with a `name/counter/stage/stage-counter` revision
/// string.
pub fn pipeline_stub(revision: &MaterialRevision) -> Result<PipelineStub> {
    let [modification] = revision.modifications.as_slice() else {
        return Err(GoDashError::Parse(format!(
            "pipeline material with {} modifications, expected exactly 1",
            revision.modifications.len()
        )));
    };

    let mut parts = modification.revision.split('/');
    let (Some(name), Some(counter)) = (parts.next(), parts.next()) else {
        return Err(GoDashError::Parse(format!(
            "malformed pipeline material revision '{}'",
            modification.revision
        )));
    };

    let counter = counter.parse().map_err(|_| {
        GoDashError::Parse(format!(
            "non-numeric counter in pipeline material revision '{}'",
            modification.revision
        ))
    })?;

    Ok(PipelineStub {
        name: name.to_string(),
        counter,
        changed: revision.changed,
    })
}
