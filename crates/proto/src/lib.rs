//! hostwatch-proto - the private TCP protocol spoken between the hostwatch
//! service and its clients.
//!
//! Every message is a [`frame`]: a little-endian `u32` length followed by a
//! zlib-compressed UTF-8 JSON document. The JSON documents themselves are
//! described in [`envelope`].

pub mod envelope;
pub mod frame;

pub use envelope::{Credentials, ObjectKind, Request, Response, ResponseCode, Verb};
pub use frame::{FrameError, FrameReader, decompress, encode, write_frame};

/// Default time a peer may sit silent in the middle of a frame.
pub const DEFAULT_STALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
