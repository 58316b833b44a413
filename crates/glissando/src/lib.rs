//! Command-line front end for glissando trajectory smoothing.

pub mod cli;
pub mod config;
pub mod document;
