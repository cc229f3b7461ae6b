//! Shared error taxonomy and text classification for randcaps.

pub mod error;
pub mod text;
