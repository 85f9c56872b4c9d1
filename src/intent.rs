//! Classifies a user request as chat, image, or video.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static VIDEO_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(genera|crea|haz|muéstrame|dibuja) un video\b")
        .expect("video pattern should compile")
});

static IMAGE_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(genera|crea|dibuja|haz una imagen de)\b")
        .expect("image pattern should compile")
});

/// What kind of reply a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// A streamed text reply.
    Chat,
    /// One generated image.
    Image,
    /// One generated video.
    Video,
}

impl Intent {
    /// Classifies `text`.
    ///
    /// Video patterns are checked first, then image; anything else is chat.
    /// A forced intent from the tool menu overrides the patterns, except that
    /// text matching the video pattern is always a video.
    pub fn classify(text: &str, force: Force) -> Self {
        let text = text.trim();
        if force == Force::Video || VIDEO_REQUEST.is_match(text) {
            Intent::Video
        } else if force == Force::Image || IMAGE_REQUEST.is_match(text) {
            Intent::Image
        } else {
            Intent::Chat
        }
    }

    /// Lowercase name of the intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Chat => "chat",
            Intent::Image => "image",
            Intent::Video => "video",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool chosen explicitly instead of inferred from the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Force {
    #[default]
    None,
    Image,
    Video,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_requests() {
        for text in [
            "Genera un video de un gato",
            "crea un video del mar",
            "HAZ UN VIDEO corto",
            "muéstrame un video de Marte",
            "Dibuja un video animado",
        ] {
            assert_eq!(Intent::classify(text, Force::None), Intent::Video, "{text}");
        }
    }

    #[test]
    fn image_requests() {
        for text in [
            "Crea una imagen de un gato",
            "genera un paisaje",
            "Dibuja un dragón",
            "haz una imagen de la luna",
        ] {
            assert_eq!(Intent::classify(text, Force::None), Intent::Image, "{text}");
        }
    }

    #[test]
    fn chat_requests() {
        for text in [
            "hola",
            "Explica la teoría de cuerdas simplemente",
            "generador de ideas",
            "haz un resumen",
            "¿puedes generar un video?",
        ] {
            assert_eq!(Intent::classify(text, Force::None), Intent::Chat, "{text}");
        }
    }

    #[test]
    fn video_pattern_needs_word_boundary() {
        assert_eq!(
            Intent::classify("genera un videojuego", Force::None),
            Intent::Image
        );
    }

    #[test]
    fn forced_intents() {
        assert_eq!(Intent::classify("hola", Force::Image), Intent::Image);
        assert_eq!(Intent::classify("hola", Force::Video), Intent::Video);
        assert_eq!(
            Intent::classify("genera un video de olas", Force::Image),
            Intent::Video
        );
    }
}
