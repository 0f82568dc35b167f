//! Wire-format documents for the GoCD pipeline API.
//!
//! These mirror the JSON bodies of `history.json` and `instance.json` and are
//! treated as a fixed external contract. Anything beyond shape validation
//! (regex extraction, type partitioning) happens in [`super::parse`].

use serde::{Deserialize, Deserializer};

/// Response body of `/go/api/pipelines/{name}/history.json`.
#[derive(Debug, Deserialize)]
pub struct HistoryDoc {
    pub pipelines: Vec<HistoryEntry>,
}

/// One run in a pipeline's history, most recent first.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "counter_from_any")]
    pub counter: u32,
}

/// Response body of `/go/api/pipelines/{name}/instance/{counter}.json`.
#[derive(Debug, Deserialize)]
pub struct InstanceDoc {
    pub name: String,
    #[serde(deserialize_with = "counter_from_any")]
    pub counter: u32,
    pub stages: Vec<StageDoc>,
    pub build_cause: BuildCause,
}

#[derive(Debug, Deserialize)]
pub struct StageDoc {
    pub name: String,
    #[serde(default, deserialize_with = "opt_counter_from_any")]
    pub counter: Option<u32>,
    /// Absent while the stage is still scheduled or building.
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildCause {
    #[serde(default)]
    pub material_revisions: Vec<MaterialRevision>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialRevision {
    pub material: MaterialDoc,
    /// Whether this material actually triggered/changed in the run.
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub modifications: Vec<ModificationDoc>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialDoc {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModificationDoc {
    pub revision: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Counters arrive as integers from most GoCD versions but as numeric
/// strings from some older ones. Accept both.
fn counter_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("non-numeric counter '{s}'"))),
    }
}

fn opt_counter_from_any<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "counter_from_any")] u32);

    Ok(Option::<Wrap>::deserialize(deserializer)?.map(|w| w.0))
}
