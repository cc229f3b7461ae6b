//! Process-level setup shared by the randcaps binary.

pub mod logging;
