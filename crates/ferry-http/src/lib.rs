#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

//! HTTP implementation of the transport contract.
//!
//! Layout: `client.rs` (reqwest-backed transport and problem-body classification).

pub mod client;

pub use client::{
    DEFAULT_REQUEST_TIMEOUT, HEADER_API_KEY, HEADER_REQUEST_ID, HttpSetupError, HttpTransport,
    HttpTransportConfig,
};
