//! Async streaming support for framed decoding.
//!
//! This module drives a decode stage from a `futures-io::AsyncRead`,
//! making it runtime-agnostic and compatible with tokio, async-std, smol,
//! and other async runtimes.
//!
//! - [`decode_async`] - Creates an async stream of decoded units from an async reader
//!
//! This module requires the `async-io` feature to be enabled.

mod reader;

pub use reader::{FramedRead, decode_async};
