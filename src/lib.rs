//! Prism: a read-only bridge over heterogeneous package registries.
//!
//! Each facade process re-shapes one upstream registry (npm, PyPI, Maven
//! Central, an OCI registry, or an MCP listing) into the uniform registry
//! path space; the bridge binary fronts a set of facades, routing by
//! group type and rewriting URLs so clients only ever see one origin.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod ecosystems;
pub mod entity_store;
pub mod facade;
pub mod handlers;
pub mod pagination;
pub mod server;
pub mod sorting;
pub mod state;
