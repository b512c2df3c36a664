//! Commands of the `hedge` tool, exposed as a library so they can be tested without spawning it.

pub mod commands;
