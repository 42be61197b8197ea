#![doc = "up-print-core: core logic library for up-print."]

//! This crate holds the Universal Print submission protocol: endpoint scopes,
//! printer defaults, share discovery, the document attachment strategies,
//! chunked upload, status polling and diagnostics.
//! HTTP, authentication and terminal output are not included here; they come
//! in through the traits in [`contract`].
//!
//! # Usage
//! Build a [`config::GraphConfig`], hand a [`contract::GraphTransport`] to
//! [`submit::JobSubmitter`] and call `submit`.

pub mod config;
pub mod content_type;
pub mod contract;
pub mod diagnostics;
pub mod endpoint;
pub mod error;
pub mod graph_error;
pub mod poll;
pub mod printer;
pub mod share;
pub mod strategy;
pub mod submit;
pub mod uploader;
