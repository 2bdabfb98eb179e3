//! The network side of a probe cycle: request types, the HTTP transport
//! and the sampler that times them.

pub mod client;
pub mod requests;
pub mod sampler;

pub use client::{Client, Transfer, Transport};
pub use sampler::{DownloadTrial, Sampler, UploadTrial};
