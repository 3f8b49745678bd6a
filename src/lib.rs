//! Fan a kubectl command out to several cluster contexts at once.
//!
//! The saved selection (clusters plus an optional namespace) lives in a small
//! YAML file so repeated runs skip the picker.

pub mod cli;
pub mod config;
pub mod exec;
pub mod fanout;
pub mod select;
