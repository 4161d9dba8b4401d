//! Cross-module test suites for the command engine.

mod dispatch_behaviour;
pub(crate) mod support;
