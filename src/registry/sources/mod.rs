//! Concrete [`EventSource`](super::EventSource) implementations.
//!
//! [`file::FileSource`] polls a services file and diffs it between
//! versions; [`channel::ChannelSource`] lets in-process code (a container
//! engine client, tests) publish events directly.

pub mod channel;
pub mod file;

pub use channel::ChannelSource;
pub use file::FileSource;
