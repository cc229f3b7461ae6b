use serde_json::Value;

use crate::message_stream::{StreamEvent, SyncBatch};
use randcaps_core::error::RandCapsError;

/// Flatten a client-server `/sync` response into timeline events of joined
/// rooms. Events with no sender are dropped.
pub fn parse_sync_response(payload: &Value) -> Result<SyncBatch, RandCapsError> {
    let next_batch = payload
        .get("next_batch")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| RandCapsError::Sync("response missing next_batch".into()))?;

    let mut events = Vec::new();

    let Some(joined_rooms) = payload.pointer("/rooms/join").and_then(|v| v.as_object()) else {
        return Ok(SyncBatch { next_batch, events });
    };

    for (room_id, room_data) in joined_rooms {
        let Some(timeline) = room_data
            .pointer("/timeline/events")
            .and_then(|v| v.as_array())
        else {
            continue;
        };

        for event in timeline {
            let sender = str_field(event, "/sender");
            if sender.trim().is_empty() {
                continue;
            }
            events.push(StreamEvent {
                event_id: str_field(event, "/event_id"),
                room_id: room_id.clone(),
                sender,
                event_type: str_field(event, "/type"),
                msgtype: event
                    .pointer("/content/msgtype")
                    .and_then(|v| v.as_str())
                    .map(ToOwned::to_owned),
                body: str_field(event, "/content/body"),
            });
        }
    }

    Ok(SyncBatch { next_batch, events })
}

fn str_field(event: &Value, pointer: &str) -> String {
    event
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
