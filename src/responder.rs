use randcaps_channels::message_stream::MessageStream;
use randcaps_core::error::RandCapsError;

pub const NOT_FOUND_TEXT: &str = "NO SCREAMING FOUND";

/// Wrap the pick (or the not-found text) in a code fence so whitespace and
/// casing render exactly as stored.
pub fn format_reply(choice: Option<&str>) -> String {
    format!("```\n{}\n```", choice.unwrap_or(NOT_FOUND_TEXT))
}

pub async fn respond(
    stream: &dyn MessageStream,
    room_id: &str,
    choice: Option<&str>,
) -> Result<(), RandCapsError> {
    match stream.send_text(room_id, &format_reply(choice)).await {
        Ok(()) => Ok(()),
        Err(RandCapsError::PublishFailed(e)) => Err(RandCapsError::PublishFailed(e)),
        Err(other) => Err(RandCapsError::PublishFailed(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_found() {
        assert_eq!(
            format_reply(Some("HELLO WORLD THIS IS FINE")),
            "```\nHELLO WORLD THIS IS FINE\n```"
        );
    }

    #[test]
    fn test_format_not_found() {
        assert_eq!(format_reply(None), "```\nNO SCREAMING FOUND\n```");
    }

    #[test]
    fn test_format_preserves_whitespace() {
        assert_eq!(
            format_reply(Some("  SPACED   OUT\nTWO LINES ")),
            "```\n  SPACED   OUT\nTWO LINES \n```"
        );
    }
}
