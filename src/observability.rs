use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("novachat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("novachat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("novachat.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("novachat.stream.chunks");
pub(crate) static VIDEO_POLLS: Counter = Counter::new("novachat.video.polls");

pub(crate) static STORE_SAVES: Counter = Counter::new("novachat.store.saves");
pub(crate) static STORE_SAVE_FAILURES: Counter = Counter::new("novachat.store.save_failures");
pub(crate) static STORE_LOAD_FAILURES: Counter = Counter::new("novachat.store.load_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&VIDEO_POLLS);

    collector.register_counter(&STORE_SAVES);
    collector.register_counter(&STORE_SAVE_FAILURES);
    collector.register_counter(&STORE_LOAD_FAILURES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_with_collector() {
        register_biometrics(Collector::new());
    }
}
