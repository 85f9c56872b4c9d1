// Public modules
pub mod api_error_body;
pub mod chat_session;
pub mod content;
pub mod data_url;
pub mod generate_content_request;
pub mod generate_content_response;
pub mod message;
pub mod role;
pub mod video_operation;

// Re-exports
pub use api_error_body::{ApiErrorBody, ApiErrorDetail};
pub use chat_session::{ChatSession, DEFAULT_TITLE, title_from_text};
pub use content::{Content, InlineData, Part};
pub use data_url::DataUrl;
pub use generate_content_request::{GenerateContentRequest, GenerationConfig, ImageConfig};
pub use generate_content_response::{
    Candidate, GenerateContentResponse, PromptFeedback, UsageMetadata,
};
pub use message::Message;
pub use role::Role;
pub use video_operation::{
    GenerateVideoResponse, GeneratedSample, OperationError, VideoFile, VideoGenerationRequest,
    VideoInstance, VideoOperation, VideoOperationResponse, VideoParameters,
};
