//! Tracing hooks for instance lifecycle events.
//!
//! Kept free of telemetry stacks; a subscriber in the embedding binary
//! decides where these go.

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "dagc", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "metric");
    }
}
