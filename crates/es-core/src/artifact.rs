//! JSON artifacts for probe and model state.
//!
//! Each artifact wraps its payload with a schema version and a kind tag so
//! that a model file passed where a probe is expected fails cleanly.

use std::path::Path;

use chrono::{DateTime, Utc};
use es_common::{Error, Result, SCHEMA_VERSION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logging::event_names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Probe,
    Model,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Probe => "probe",
            ArtifactKind::Model => "model",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact<T> {
    schema_version: String,
    kind: ArtifactKind,
    created_at: DateTime<Utc>,
    payload: T,
}

pub fn save<T: Serialize>(path: &Path, kind: ArtifactKind, payload: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let artifact = Artifact {
        schema_version: SCHEMA_VERSION.to_string(),
        kind,
        created_at: Utc::now(),
        payload,
    };
    let json = serde_json::to_string_pretty(&artifact)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;

    info!(
        event = event_names::ARTIFACT_SAVED,
        kind = kind.as_str(),
        path = %path.display(),
        "artifact saved"
    );
    Ok(())
}

pub fn load<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let artifact: Artifact<serde_json::Value> = serde_json::from_str(&content)?;
    if artifact.kind != kind {
        return Err(Error::InvalidRecord {
            table: "artifact".to_string(),
            message: format!(
                "{} holds a {} artifact, expected {}",
                path.display(),
                artifact.kind.as_str(),
                kind.as_str()
            ),
        });
    }
    if artifact.schema_version != SCHEMA_VERSION {
        return Err(Error::InvalidRecord {
            table: "artifact".to_string(),
            message: format!(
                "schema version {} is not supported (expected {})",
                artifact.schema_version, SCHEMA_VERSION
            ),
        });
    }
    let payload = serde_json::from_value(artifact.payload)?;
    info!(
        event = event_names::ARTIFACT_LOADED,
        kind = kind.as_str(),
        path = %path.display(),
        "artifact loaded"
    );
    Ok(payload)
}
