use serde::Deserialize;
use sse::Message;

/// Body of a publish request.
#[derive(Debug, Deserialize)]
pub(crate) struct PublishParams {
    /// Event id; generated by the server when omitted.
    pub(crate) id: Option<String>,
    /// SSE event name
    pub(crate) event: Option<String>,
    pub(crate) data: String,
}

impl PublishParams {
    pub(crate) fn into_message(self) -> Message {
        let message = match self.id {
            Some(id) => Message::new(id, self.data),
            None => Message::simple(self.data),
        };
        match self.event {
            Some(event) => message.with_event(event),
            None => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_message_keeps_explicit_id_and_event() {
        let params: PublishParams =
            serde_json::from_str(r#"{"id":"7","event":"score","data":"3-1"}"#).unwrap();

        let message = params.into_message();

        assert_eq!(message.id(), "7");
        assert_eq!(message.event(), Some("score"));
        assert_eq!(message.data(), "3-1");
    }

    #[test]
    fn test_into_message_generates_missing_id() {
        let params: PublishParams = serde_json::from_str(r#"{"data":"hello"}"#).unwrap();

        let message = params.into_message();

        assert!(!message.id().is_empty());
        assert_eq!(message.event(), None);
    }
}
