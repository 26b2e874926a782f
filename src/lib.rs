//! Playlist reconciliation library - shared modules for all binaries.

pub mod config;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod provider;
pub mod query;
pub mod reconcile;
pub mod resolver;
pub mod safety;
pub mod scoring;
pub mod similarity;
pub mod sink;
pub mod source;
