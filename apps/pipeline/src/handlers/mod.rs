//! Job handlers, one per queue name.

pub mod resume_parse;
