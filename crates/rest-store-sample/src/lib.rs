//! # Rest Store Sample
//!
//! A blog reader built on `rest-store`: posts link to their author and their tags, and the
//! sample waits for the whole graph to settle before reading it.

pub mod blog;
pub mod model;
