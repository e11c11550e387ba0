use std::panic;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 7] = [
    "token", "jwt", "bearer", "password", "secret", "apikey", "api_key",
];

/// Scrubs whitespace-separated fragments that look like credentials.
pub fn redact_text(input: &str) -> String {
    input
        .split_whitespace()
        .map(|chunk| {
            if is_sensitive(chunk) {
                REDACTED
            } else {
                chunk
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Panic messages may embed a session payload; strip it before printing.
pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        match panic_info.location() {
            Some(location) => eprintln!(
                "hente panic: {scrubbed} at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            ),
            None => eprintln!("hente panic: {scrubbed}"),
        }
    }));
}

fn is_sensitive(chunk: &str) -> bool {
    let lowered = chunk.to_ascii_lowercase();

    SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_jwt(chunk)
}

// header.payload.signature, base64url segments.
fn looks_like_jwt(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.'));
    let segments: Vec<&str> = cleaned.split('.').collect();

    segments.len() == 3
        && segments.iter().all(|segment| {
            segment.len() >= 4
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        })
}
