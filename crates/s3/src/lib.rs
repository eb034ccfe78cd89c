//! ferry-s3: S3 backend for ferry
//!
//! This crate implements the `Client` trait from ferry-core on top of the
//! aws-sdk-s3 crate. It is the only crate that directly depends on the
//! AWS SDK.

pub mod client;
pub mod multipart;
pub mod post_policy;

pub use client::S3Client;
pub use multipart::MultipartConfig;
