use serde::Deserialize;

/// Standard error envelope returned by the community backend.
///
/// Every field is optional on the wire; the client only uses it to give
/// failed requests a readable log line.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    /// Best-effort description of an error body. Falls back to a trimmed
    /// excerpt of the raw text when it isn't the JSON envelope.
    pub fn describe(body: &[u8]) -> String {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(parsed) if !parsed.message.is_empty() && !parsed.code.is_empty() => {
                format!("{} ({})", parsed.message, parsed.code)
            }
            Ok(parsed) if !parsed.message.is_empty() => parsed.message,
            _ => {
                let text = String::from_utf8_lossy(body);
                let excerpt: String = text.trim().chars().take(200).collect();
                if excerpt.is_empty() {
                    "empty response body".to_string()
                } else {
                    excerpt
                }
            }
        }
    }
}
