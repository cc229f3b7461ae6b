pub mod candidate_filter;
pub mod channels;
pub mod config;
pub mod pipeline;
pub mod responder;
pub mod runtime;
pub mod selector;
pub mod session;
pub mod signal;

pub use randcaps_app::logging;
pub use randcaps_channels::message_stream;
pub use randcaps_core::error;
pub use randcaps_core::text;
pub use randcaps_storage::corpus;
pub use randcaps_storage::handled;
