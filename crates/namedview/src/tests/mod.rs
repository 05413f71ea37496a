//! Session-level tests driving [`crate::ViewServer`] over in-memory channels.

mod support;
