//! Helpers shared by the runtime components

mod backoff;

pub use backoff::{DefaultBackoff, JitteredBackoff, ResettableBackoff};
