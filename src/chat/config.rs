//! Configuration types for the chat application.
//!
//! Settings come from three layers: built-in defaults, an optional YAML file
//! named with `--config`, and command-line flags parsed by `arrrg`. Later
//! layers win.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::{
    DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_SYSTEM_INSTRUCTION,
    DEFAULT_VIDEO_MODEL, GeminiOptions,
};
use crate::error::{Error, Result};
use crate::error_panel::DEFAULT_REPORT_URL;

/// Directory name under the platform data directory.
const APP_DIR: &str = "novachat";

/// Command-line arguments for the novachat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Chat model (default: gemini-3-flash-preview)", "MODEL")]
    pub model: Option<String>,

    /// Model to use for images.
    #[arrrg(optional, "Image model (default: gemini-2.5-flash-image)", "MODEL")]
    pub image_model: Option<String>,

    /// Model to use for videos.
    #[arrrg(optional, "Video model (default: veo-3.1-fast-generate-preview)", "MODEL")]
    pub video_model: Option<String>,

    /// System instruction; an empty string sends none.
    #[arrrg(optional, "System instruction for chat", "PROMPT")]
    pub system: Option<String>,

    /// Where sessions and media are kept.
    #[arrrg(optional, "Data directory (default: $XDG_DATA_HOME/novachat)", "DIR")]
    pub data_dir: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Seconds between video job polls.
    #[arrrg(optional, "Seconds between video polls (default: 10)", "SECONDS")]
    pub poll_interval: Option<u64>,

    /// API base URL.
    #[arrrg(optional, "API base URL", "URL")]
    pub base_url: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Keep sessions in memory only.
    #[arrrg(flag, "Do not read or write saved sessions")]
    pub no_persist: bool,
}

/// The YAML configuration file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub model: Option<String>,
    pub image_model: Option<String>,
    pub video_model: Option<String>,
    pub system: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub base_url: Option<String>,
    pub report_url: Option<String>,
    pub image_aspect_ratio: Option<String>,
    pub video_resolution: Option<String>,
    pub video_aspect_ratio: Option<String>,
    pub color: Option<bool>,
    pub persist: Option<bool>,
}

impl ConfigFile {
    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("could not read config file {}: {e}", path.display()),
                e,
            )
        })?;
        Self::parse(&text)
    }

    /// Parses configuration from YAML text.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Resolved configuration for a chat run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Model for streamed chat.
    pub chat_model: String,

    /// Model for image generation.
    pub image_model: String,

    /// Model for video generation.
    pub video_model: String,

    /// System instruction sent with chat requests.
    pub system_instruction: Option<String>,

    pub image_aspect_ratio: String,
    pub video_resolution: String,
    pub video_aspect_ratio: String,

    /// Wait between polls of a video job.
    pub poll_interval: Duration,

    /// Overrides the API base URL.
    pub base_url: Option<String>,

    /// Target of the "report issue" action.
    pub report_url: String,

    /// Root of the saved sessions and downloaded media.
    pub data_dir: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether sessions are saved to `data_dir`.
    pub persist: bool,
}

impl ChatConfig {
    /// Creates a ChatConfig with default values.
    ///
    /// The data directory comes from `XDG_DATA_HOME` or `HOME`.
    pub fn new() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            image_aspect_ratio: "1:1".to_string(),
            video_resolution: "720p".to_string(),
            video_aspect_ratio: "16:9".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            base_url: None,
            report_url: DEFAULT_REPORT_URL.to_string(),
            data_dir: default_data_dir(),
            use_color: true,
            persist: true,
        }
    }

    /// Builds the configuration from parsed flags, reading `--config` if given.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let mut config = Self::new();
        if let Some(path) = args.config.as_deref() {
            config = config.merge_file(ConfigFile::load(path)?);
        }
        Ok(config.merge_args(args))
    }

    /// Applies the fields a configuration file sets.
    pub fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(model) = file.model {
            self.chat_model = model;
        }
        if let Some(model) = file.image_model {
            self.image_model = model;
        }
        if let Some(model) = file.video_model {
            self.video_model = model;
        }
        if let Some(system) = file.system {
            self = self.with_system_instruction(system);
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        if file.base_url.is_some() {
            self.base_url = file.base_url;
        }
        if let Some(url) = file.report_url {
            self.report_url = url;
        }
        if let Some(ratio) = file.image_aspect_ratio {
            self.image_aspect_ratio = ratio;
        }
        if let Some(resolution) = file.video_resolution {
            self.video_resolution = resolution;
        }
        if let Some(ratio) = file.video_aspect_ratio {
            self.video_aspect_ratio = ratio;
        }
        if let Some(color) = file.color {
            self.use_color = color;
        }
        if let Some(persist) = file.persist {
            self.persist = persist;
        }
        self
    }

    /// Applies the flags given on the command line.
    pub fn merge_args(mut self, args: ChatArgs) -> Self {
        if let Some(model) = args.model {
            self.chat_model = model;
        }
        if let Some(model) = args.image_model {
            self.image_model = model;
        }
        if let Some(model) = args.video_model {
            self.video_model = model;
        }
        if let Some(system) = args.system {
            self = self.with_system_instruction(system);
        }
        if let Some(dir) = args.data_dir {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = args.poll_interval {
            self.poll_interval = Duration::from_secs(secs);
        }
        if args.base_url.is_some() {
            self.base_url = args.base_url;
        }
        if args.no_color {
            self.use_color = false;
        }
        if args.no_persist {
            self.persist = false;
        }
        self
    }

    /// Sets the chat model.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Sets the image model.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Sets the video model.
    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    /// Sets the system instruction. A blank instruction clears it.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    /// Sets the wait between video polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the report URL.
    pub fn with_report_url(mut self, report_url: impl Into<String>) -> Self {
        self.report_url = report_url.into();
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Keeps sessions in memory only.
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Directory of the session key-value store.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Directory downloaded videos are written to.
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }

    /// The client settings this configuration selects.
    pub fn to_gemini_options(&self) -> GeminiOptions {
        GeminiOptions {
            chat_model: self.chat_model.clone(),
            image_model: self.image_model.clone(),
            video_model: self.video_model.clone(),
            system_instruction: self.system_instruction.clone(),
            image_aspect_ratio: self.image_aspect_ratio.clone(),
            video_resolution: self.video_resolution.clone(),
            video_aspect_ratio: self.video_aspect_ratio.clone(),
            poll_interval: self.poll_interval,
            media_dir: self.media_dir(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_data_dir() -> PathBuf {
    data_dir_from(
        env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        env::var_os("HOME").map(PathBuf::from),
    )
}

fn data_dir_from(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    match (xdg_data_home, home) {
        (Some(xdg), _) if xdg.is_absolute() => xdg.join(APP_DIR),
        (_, Some(home)) => home.join(".local").join("share").join(APP_DIR),
        _ => PathBuf::from(".").join(APP_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.chat_model, "gemini-3-flash-preview");
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.video_model, "veo-3.1-fast-generate-preview");
        assert!(config.system_instruction.as_deref().unwrap().contains("balaAI"));
        assert_eq!(config.image_aspect_ratio, "1:1");
        assert_eq!(config.video_resolution, "720p");
        assert_eq!(config.video_aspect_ratio, "16:9");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.report_url, "https://github.com");
        assert!(config.base_url.is_none());
        assert!(config.use_color);
        assert!(config.persist);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from_args(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gemini-2.5-pro".to_string()),
            system: Some("Sé breve.".to_string()),
            data_dir: Some("/tmp/nova".to_string()),
            poll_interval: Some(2),
            no_color: true,
            no_persist: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::from_args(args).unwrap();
        assert_eq!(config.chat_model, "gemini-2.5-pro");
        assert_eq!(config.system_instruction.as_deref(), Some("Sé breve."));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nova"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(!config.use_color);
        assert!(!config.persist);
    }

    #[test]
    fn empty_system_flag_clears_instruction() {
        let args = ChatArgs {
            system: Some(String::new()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::from_args(args).unwrap();
        assert!(config.system_instruction.is_none());
    }

    #[test]
    fn file_then_flags() {
        let file = ConfigFile::parse(
            "model: gemini-file\nvideo_resolution: 1080p\ncolor: false\nreport_url: https://example.com/issues\n",
        )
        .unwrap();
        let args = ChatArgs {
            model: Some("gemini-flag".to_string()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::new().merge_file(file).merge_args(args);
        assert_eq!(config.chat_model, "gemini-flag");
        assert_eq!(config.video_resolution, "1080p");
        assert_eq!(config.report_url, "https://example.com/issues");
        assert!(!config.use_color);
    }

    #[test]
    fn config_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novachat.yaml");
        fs::write(&path, "poll_interval_secs: 3\npersist: false\n").unwrap();
        let args = ChatArgs {
            config: Some(path.display().to_string()),
            ..ChatArgs::default()
        };
        let config = ChatConfig::from_args(args).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert!(!config.persist);
    }

    #[test]
    fn config_file_errors() {
        assert!(ConfigFile::parse("").unwrap() == ConfigFile::default());
        assert!(ConfigFile::parse("colour: true\n").is_err());
        assert!(ConfigFile::load("/nonexistent/novachat.yaml").is_err());
    }

    #[test]
    fn data_dir_resolution() {
        assert_eq!(
            data_dir_from(Some("/xdg".into()), Some("/home/u".into())),
            PathBuf::from("/xdg/novachat")
        );
        assert_eq!(
            data_dir_from(None, Some("/home/u".into())),
            PathBuf::from("/home/u/.local/share/novachat")
        );
        assert_eq!(
            data_dir_from(Some("relative".into()), None),
            PathBuf::from("./novachat")
        );
    }

    #[test]
    fn gemini_options_follow_config() {
        let config = ChatConfig::new()
            .with_chat_model("chat")
            .with_image_model("image")
            .with_video_model("video")
            .with_poll_interval(Duration::from_millis(5))
            .with_data_dir("/data");
        let options = config.to_gemini_options();
        assert_eq!(options.chat_model, "chat");
        assert_eq!(options.image_model, "image");
        assert_eq!(options.video_model, "video");
        assert_eq!(options.poll_interval, Duration::from_millis(5));
        assert_eq!(options.media_dir, PathBuf::from("/data/media"));
        assert_eq!(config.store_dir(), PathBuf::from("/data/store"));
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_system_instruction("  ")
            .with_base_url("http://localhost:9000")
            .with_report_url("https://example.com")
            .without_color()
            .without_persistence();
        assert!(config.system_instruction.is_none());
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.report_url, "https://example.com");
        assert!(!config.use_color);
        assert!(!config.persist);
    }
}
