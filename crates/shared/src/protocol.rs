use serde::{Deserialize, Serialize};

use crate::domain::RemixParameters;

/// Multipart field key the service reads uploaded files from.
pub const UPLOAD_FIELD: &str = "file";

pub const STATUS_PATH: &str = "";
pub const HEALTH_PATH: &str = "healthz";
pub const PROCESS_URL_PATH: &str = "process_url";
pub const UPLOAD_PATH: &str = "upload";
pub const PROCESS_PATH: &str = "process";
pub const DOWNLOAD_SEPARATED_PATH: &str = "download_separated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessUrlRequest {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessUrlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocals_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accompaniment_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub tempo: i32,
    pub pitch: i32,
    #[serde(rename = "effectMix")]
    pub effect_mix: i32,
    pub files: Vec<String>,
}

impl ProcessRequest {
    pub fn new(params: &RemixParameters, files: Vec<String>) -> Self {
        Self {
            tempo: params.tempo.get(),
            pitch: params.pitch_shift.get(),
            effect_mix: params.effect_mix.get(),
            files,
        }
    }
}

/// Where a downloadable artifact lives on the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ArtifactRef {
    /// Absolute service path returned by upload, e.g. `/download/song/vocals.wav`.
    Stem(String),
    /// Path relative to the separated-output root, returned by URL ingestion.
    Separated(String),
}

impl ArtifactRef {
    pub fn path(&self) -> &str {
        match self {
            Self::Stem(path) | Self::Separated(path) => path,
        }
    }

    pub fn file_name(&self) -> &str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Path relative to the service base URL, without a leading slash.
    pub fn relative_path(&self) -> String {
        match self {
            Self::Stem(path) => path.trim_start_matches('/').to_string(),
            Self::Separated(path) => {
                format!("{DOWNLOAD_SEPARATED_PATH}/{}", path.trim_start_matches('/'))
            }
        }
    }
}

impl UploadResponse {
    pub fn artifacts(&self) -> Vec<ArtifactRef> {
        self.stems.iter().cloned().map(ArtifactRef::Stem).collect()
    }
}

impl ProcessUrlResponse {
    pub fn artifacts(&self) -> Vec<ArtifactRef> {
        [&self.vocals_path, &self.accompaniment_path]
            .into_iter()
            .flatten()
            .cloned()
            .map(ArtifactRef::Separated)
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
