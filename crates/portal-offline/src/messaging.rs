//! Control messages posted by pages.

use portal_core::messages::ControlMessage;
use serde_json::Value;
use tracing::debug;

/// What the host should do after delivering a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Activate the waiting worker now.
    SkipWaiting,
    /// Nothing to do.
    Ignored,
}

/// Interpret a posted message. Unknown or malformed messages are ignored.
pub fn handle_message(message: &Value) -> MessageOutcome {
    match ControlMessage::from_value(message) {
        Some(ControlMessage::SkipWaiting) => MessageOutcome::SkipWaiting,
        None => {
            debug!(message = %message, "Ignoring unrecognised message");
            MessageOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skip_waiting() {
        assert_eq!(
            handle_message(&json!({"type": "SKIP_WAITING"})),
            MessageOutcome::SkipWaiting
        );
    }

    #[test]
    fn test_other_messages_ignored() {
        assert_eq!(handle_message(&json!({"type": "skip_waiting"})), MessageOutcome::Ignored);
        assert_eq!(handle_message(&json!({"kind": "SKIP_WAITING"})), MessageOutcome::Ignored);
        assert_eq!(handle_message(&json!(42)), MessageOutcome::Ignored);
    }
}
