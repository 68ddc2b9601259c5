//! Panel internals.
//!
//! - run.rs: fan-out over judges, consensus
//! - client.rs: one judge call + timeout + parse boundary

pub(crate) mod client;
pub(crate) mod run;

#[cfg(test)]
mod tests;
