//! Lifecycle tests run against an in-process fake service.

mod behaviour;
mod support;
