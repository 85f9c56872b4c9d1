use std::env;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CHUNKS, VIDEO_POLLS,
};
use crate::progress::{self, ProgressFn};
use crate::sse::process_sse;
use crate::types::{
    ApiErrorBody, Content, DataUrl, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Message, OperationError, VideoGenerationRequest, VideoOperation,
};
use crate::utils::time::now_millis;

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const API_KEY_HEADER: &str = "x-goog-api-key";
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Environment variables consulted, in order, when no key is passed in.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Default model for streamed chat.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
/// Default model for image generation.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
/// Default model for video generation.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
/// Default interval between polls of a video job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Prefix put in front of every image prompt.
pub const IMAGE_PROMPT_PREFIX: &str = "Generate a high-quality, detailed image of: ";

/// Default system instruction for chat.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Eres 'balaAI', un asistente de inteligencia artificial de élite. \n\
Tus respuestas deben ser:\n\
1. Extremadamente precisas y bien estructuradas.\n\
2. Usar Markdown profesional (tablas, listas, negritas).\n\
3. Tener un tono servicial pero sofisticado.\n\
4. Si el usuario te pide crear una imagen o video, enfócate en describir visualmente lo que se generará.";

/// A lazily evaluated stream of chat text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A stream of raw `streamGenerateContent` chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Models and output settings used by the high-level calls.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiOptions {
    /// Model for streamed chat.
    pub chat_model: String,
    /// Model for image generation.
    pub image_model: String,
    /// Model for video generation.
    pub video_model: String,
    /// System instruction sent with every chat request.
    pub system_instruction: Option<String>,
    /// Aspect ratio of generated images.
    pub image_aspect_ratio: String,
    /// Resolution of generated videos.
    pub video_resolution: String,
    /// Aspect ratio of generated videos.
    pub video_aspect_ratio: String,
    /// Wait between polls of a video job.
    pub poll_interval: Duration,
    /// Directory downloaded videos are written to.
    pub media_dir: PathBuf,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            image_aspect_ratio: "1:1".to_string(),
            video_resolution: "720p".to_string(),
            video_aspect_ratio: "16:9".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            media_dir: env::temp_dir().join("novachat-media"),
        }
    }
}

/// Client for the Gemini API.
#[derive(Clone)]
pub struct Gemini {
    api_key: Option<String>,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
    options: GeminiOptions,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("options", &self.options)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl Gemini {
    /// Create a new Gemini client.
    ///
    /// The API key can be provided directly or read from the `GEMINI_API_KEY`
    /// or `API_KEY` environment variables. A client without a key can be
    /// built; its calls fail with an authentication error until
    /// [`set_api_key`](Self::set_api_key) is called.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.or_else(api_key_from_env);

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            options: GeminiOptions::default(),
            logger: None,
        })
    }

    /// Replace the models and output settings.
    pub fn with_generation_options(mut self, options: GeminiOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a logger that observes every API interaction.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The models and output settings in use.
    pub fn options(&self) -> &GeminiOptions {
        &self.options
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true if a non-empty API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Install or replace the API key.
    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Err(Error::authentication(
                "API key not provided and GEMINI_API_KEY environment variable not set",
            ));
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(api_key).map_err(|_| {
            Error::validation(
                "API key contains characters not allowed in a header",
                Some("api_key".to_string()),
            )
        })?;
        headers.insert(API_KEY_HEADER, key);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ApiErrorBody>(&error_body).ok();
        let status = parsed.as_ref().and_then(|b| b.error.status.clone());
        let error_message = parsed
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, status, error_message),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Issue one request and return the successful response.
    ///
    /// `body` is sent as JSON when present; otherwise the request is a GET.
    async fn execute(
        &self,
        endpoint: &str,
        body: Option<&impl serde::Serialize>,
        accept: Option<&'static str>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut headers = self.default_headers()?;
        if let Some(accept) = accept {
            headers.insert(header::ACCEPT, HeaderValue::from_static(accept));
        }
        if let Some(logger) = &self.logger {
            logger.log_request(endpoint);
        }
        tracing::debug!(endpoint, "sending request");

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let request = match body {
            Some(body) => self.client.post(&url).json(body),
            None => self.client.get(&url),
        };
        let result = request.headers(headers).send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            self.map_send_error(e)
        })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Call `generateContent` and get a non-streaming response.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let endpoint = format!("models/{model}:generateContent");
        let response = self.execute(&endpoint, Some(request), None).await?;
        let response: GenerateContentResponse = Self::parse_json(response).await?;
        if let Some(logger) = &self.logger {
            logger.log_response(&response);
        }
        Ok(response)
    }

    /// Call `streamGenerateContent` and get a stream of response chunks.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChunkStream> {
        let endpoint = format!("models/{model}:streamGenerateContent?alt=sse");
        let response = self
            .execute(&endpoint, Some(request), Some("text/event-stream"))
            .await?;
        let logger = self.logger.clone();
        Ok(Box::pin(process_sse(response.bytes_stream()).map(
            move |chunk| {
                if let (Ok(chunk), Some(logger)) = (&chunk, &logger) {
                    logger.log_stream_chunk(chunk);
                }
                chunk
            },
        )))
    }

    /// Stream a chat reply to `text`, given the prior turns of the session.
    ///
    /// Prior messages with empty content (placeholders, media-only turns)
    /// are not sent. The returned stream yields text fragments in arrival
    /// order; chunks without text are skipped.
    pub async fn stream_chat(&self, history: &[Message], text: &str) -> Result<TextStream> {
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(Content::from)
            .collect();
        contents.push(Content::user(text));
        let mut request = GenerateContentRequest::new(contents);
        if let Some(system) = &self.options.system_instruction {
            request = request.with_system_instruction(system.as_str());
        }

        let chunks = self
            .stream_generate_content(&self.options.chat_model, &request)
            .await?;
        let fragments = chunks.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => {
                    STREAM_CHUNKS.click();
                    let text = chunk.text();
                    (!text.is_empty()).then_some(Ok(text))
                }
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(fragments))
    }

    /// Generate one image and return it as a `data:` URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::new(vec![Content::user(format!(
            "{IMAGE_PROMPT_PREFIX}{prompt}"
        ))])
        .with_generation_config(GenerationConfig::image(
            self.options.image_aspect_ratio.as_str(),
        ));
        let response = self
            .generate_content(&self.options.image_model, &request)
            .await?;
        match response.first_inline_data() {
            Some(inline) => Ok(DataUrl::from(inline).to_string()),
            None => Err(Error::empty_result("No se pudo generar la imagen.")),
        }
    }

    /// Generate one video, download it, and return its `file://` URL.
    ///
    /// `on_progress` receives a start message, then one rotating status
    /// message before each wait between polls. A rejected or missing
    /// credential fails with [`Error::SelectionRequired`].
    pub async fn generate_video(
        &self,
        prompt: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<String> {
        self.run_video_job(prompt, on_progress)
            .await
            .map_err(|err| {
                if err.signals_key_selection() {
                    Error::selection_required(err.message())
                } else {
                    err
                }
            })
    }

    async fn run_video_job(
        &self,
        prompt: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<String> {
        on_progress(progress::STARTING);

        let request = VideoGenerationRequest::new(
            prompt,
            self.options.video_resolution.as_str(),
            self.options.video_aspect_ratio.as_str(),
        );
        let endpoint = format!("models/{}:predictLongRunning", self.options.video_model);
        let response = self.execute(&endpoint, Some(&request), None).await?;
        let mut operation: VideoOperation = Self::parse_json(response).await?;
        self.log_operation(&operation);

        let mut poll_count = 0;
        while !operation.done {
            on_progress(progress::video_status(poll_count));
            tokio::time::sleep(self.options.poll_interval).await;
            operation = self.get_operation(&operation.name).await?;
            poll_count += 1;
        }

        if let Some(error) = &operation.error {
            return Err(operation_error(error));
        }
        let Some(uri) = operation.video_uri() else {
            return Err(Error::empty_result(
                "No se recibió el enlace de descarga del video.",
            ));
        };
        self.download_video(uri).await
    }

    /// Fetch the current state of a long-running operation.
    pub async fn get_operation(&self, name: &str) -> Result<VideoOperation> {
        VIDEO_POLLS.click();
        tracing::debug!(operation = name, "polling video operation");
        let response = self.execute(name, None::<&()>, None).await?;
        let operation: VideoOperation = Self::parse_json(response).await?;
        self.log_operation(&operation);
        Ok(operation)
    }

    fn log_operation(&self, operation: &VideoOperation) {
        if let Some(logger) = &self.logger {
            logger.log_operation(operation);
        }
    }

    async fn download_video(&self, uri: &str) -> Result<String> {
        let mut url = url::Url::parse(uri)?;
        let mut headers = self.default_headers()?;
        headers.remove(header::ACCEPT);
        headers.remove(header::CONTENT_TYPE);
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        tracing::debug!(host = url.host_str(), "downloading video");

        CLIENT_REQUESTS.click();
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        let bytes = response.bytes().await.map_err(|e| {
            Error::streaming(format!("Failed to read video: {e}"), Some(Box::new(e)))
        })?;

        let dir = &self.options.media_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io(format!("failed to create {}", dir.display()), e))?;
        let path = dir.join(format!("{}.mp4", now_millis()));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))?;
        let path = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| Error::io(format!("failed to resolve {}", path.display()), e))?;
        url::Url::from_file_path(&path)
            .map(String::from)
            .map_err(|()| Error::url(format!("not an absolute path: {}", path.display()), None))
    }
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

/// Map the error of a finished operation, which carries a gRPC status code.
fn operation_error(error: &OperationError) -> Error {
    let message = error.message.clone();
    if message.contains(ENTITY_NOT_FOUND) {
        return Error::selection_required(message);
    }
    match error.code {
        3 => Error::bad_request(message),
        5 => Error::not_found(message),
        7 => Error::permission(message),
        8 => Error::rate_limit(message, None),
        14 => Error::service_unavailable(message, None),
        16 => Error::authentication(message),
        _ => Error::api(500, Some(format!("OPERATION_ERROR_{}", error.code)), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = Gemini::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key.as_deref(), Some("test-key"));
        assert_eq!(client.base_url, DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert!(client.has_api_key());

        let client = Gemini::with_options(
            Some("test-key".to_string()),
            Some("http://localhost:8080".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn blank_key_is_not_a_key() {
        let mut client = Gemini::new(Some("  ".to_string())).unwrap();
        assert!(!client.has_api_key());
        assert!(client.default_headers().unwrap_err().is_authentication());
        client.set_api_key("k");
        assert!(client.has_api_key());
        let headers = client.default_headers().unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "k");
    }

    #[test]
    fn debug_redacts_key() {
        let client = Gemini::new(Some("secret-key".to_string())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn operation_errors_map_by_grpc_code() {
        let err = operation_error(&OperationError {
            code: 5,
            message: "Requested entity was not found.".to_string(),
        });
        assert!(err.is_selection_required());
        let err = operation_error(&OperationError {
            code: 3,
            message: "prompt rejected".to_string(),
        });
        assert!(matches!(err, Error::BadRequest { .. }));
        assert!(!err.signals_key_selection());
        let err = operation_error(&OperationError {
            code: 13,
            message: "internal".to_string(),
        });
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn default_options() {
        let options = GeminiOptions::default();
        assert_eq!(options.chat_model, "gemini-3-flash-preview");
        assert_eq!(options.image_model, "gemini-2.5-flash-image");
        assert_eq!(options.video_model, "veo-3.1-fast-generate-preview");
        assert_eq!(options.image_aspect_ratio, "1:1");
        assert_eq!(options.video_resolution, "720p");
        assert_eq!(options.video_aspect_ratio, "16:9");
        assert_eq!(options.poll_interval, Duration::from_secs(10));
        assert!(
            options
                .system_instruction
                .as_deref()
                .is_some_and(|s| s.starts_with("Eres 'balaAI'"))
        );
    }
}
