//! Normalisation of user-supplied message bodies and room names.

use crate::error::ChatError;

pub const MAX_BODY_CHARS: usize = 4000;
pub const MAX_ROOM_NAME_CHARS: usize = 100;

/// Trim a message body and reject empty or oversized ones.
pub fn message_body(body: &str) -> Result<&str, ChatError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ChatError::InvalidRequest("Message cannot be empty".into()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ChatError::InvalidRequest(format!(
            "Message must be at most {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(body)
}

/// Trim a room name and reject empty or oversized ones.
pub fn room_name(room: &str) -> Result<&str, ChatError> {
    let room = room.trim();
    if room.is_empty() {
        return Err(ChatError::InvalidRequest("Room name cannot be empty".into()));
    }
    if room.chars().count() > MAX_ROOM_NAME_CHARS {
        return Err(ChatError::InvalidRequest(format!(
            "Room name must be at most {MAX_ROOM_NAME_CHARS} characters"
        )));
    }
    Ok(room)
}
