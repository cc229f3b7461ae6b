//! Message-stream seam between the session loop and a chat protocol.

pub mod message_stream;
pub mod sync_parse;
