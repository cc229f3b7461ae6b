//! Corpus sampling and handled-event persistence for randcaps.

pub mod corpus;
pub mod handled;
