//! Status text shown while a video job renders.
//!
//! The remote service reports no real progress for video jobs, so the client
//! cycles through a fixed set of messages, one per poll.

/// Shown by the conversation controller as soon as a video request starts.
pub const PREPARING: &str = "Preparando entorno de renderizado...";

/// Reported by the client right before the job is submitted.
pub const STARTING: &str = "Iniciando motor de video Veo 3.1...";

/// Shown while an image is being generated.
pub const GENERATING_IMAGE: &str = "Generando imagen...";

/// Messages rotated through while polling.
pub const VIDEO_STATUSES: [&str; 5] = [
    "Esculpiendo los fotogramas...",
    "Ajustando la iluminación cinematográfica...",
    "Renderizando texturas en alta definición...",
    "Sincronizando el movimiento...",
    "Finalizando composición visual...",
];

/// Callback that receives status text while a long-running job advances.
pub type ProgressFn<'a> = dyn for<'p> FnMut(&'p str) + Send + 'a;

/// Status message for the given zero-based poll.
pub fn video_status(poll_count: usize) -> &'static str {
    VIDEO_STATUSES[poll_count % VIDEO_STATUSES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_five_messages() {
        assert_eq!(video_status(0), "Esculpiendo los fotogramas...");
        assert_eq!(video_status(4), "Finalizando composición visual...");
        assert_eq!(video_status(5), video_status(0));
        assert_eq!(video_status(12), video_status(2));
    }

    #[test]
    fn progress_callback_accepts_borrowed_statuses() {
        fn report(on_progress: &mut ProgressFn<'_>) {
            on_progress(STARTING);
            let status = format!("{} (1)", video_status(0));
            on_progress(&status);
        }

        let mut seen = Vec::new();
        report(&mut |status: &str| seen.push(status.to_string()));
        assert_eq!(
            seen,
            vec![
                STARTING.to_string(),
                "Esculpiendo los fotogramas... (1)".to_string(),
            ]
        );
    }
}
