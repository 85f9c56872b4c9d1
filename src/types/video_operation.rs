use serde::{Deserialize, Serialize};

/// Request body for `predictLongRunning` on a video model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerationRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

impl VideoGenerationRequest {
    /// Creates a request for a single video.
    pub fn new(
        prompt: impl Into<String>,
        resolution: impl Into<String>,
        aspect_ratio: impl Into<String>,
    ) -> Self {
        Self {
            instances: vec![VideoInstance {
                prompt: prompt.into(),
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.into(),
                resolution: resolution.into(),
                sample_count: 1,
            },
        }
    }
}

/// The prompt of a video request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInstance {
    pub prompt: String,
}

/// Output settings of a video request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    /// `16:9` or `9:16`.
    pub aspect_ratio: String,
    /// `720p` or `1080p`.
    pub resolution: String,
    /// Number of videos to produce.
    pub sample_count: u32,
}

/// Handle to a long-running video job.
///
/// Returned by the submit call and by every poll; `done` flips once the job
/// finishes, at which point exactly one of `response` and `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOperation {
    /// Resource name to poll, e.g. `models/veo/operations/abc`.
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<VideoOperationResponse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl VideoOperation {
    /// Download URI of the first generated sample.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOperationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Failure reported by a finished operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// gRPC status code.
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}
