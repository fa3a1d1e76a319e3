use tracing::debug;

/// Voice output is a passthrough: the client narrates instructions with
/// on-device text-to-speech, so the server returns the text unchanged.
pub fn synthesize(text: &str) -> String {
    let preview: String = text.chars().take(60).collect();
    debug!("TTS passthrough: '{}'", preview);
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_returns_input_unchanged() {
        assert_eq!(synthesize("Pause. Person ahead."), "Pause. Person ahead.");
    }

    #[test]
    fn long_text_does_not_panic_on_log_truncation() {
        let long = "a".repeat(500);
        assert_eq!(synthesize(&long), long);
    }
}
