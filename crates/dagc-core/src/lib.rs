#![forbid(unsafe_code)]
//! dagc-core: the operator model shared by every stage of the compiler.
//!
//! Contents:
//! - `dag`: operators, ports, arguments and declared attributes.
//! - `graph`: the arena graph that owns operators and their connections.
//! - `schema`: data models (plain / joined / summarized) and the reflector.
//! - `types`: runtime values and records.
//! - `logic`: user-logic references, their shapes, and the resolver seam.
//! - `table`: keyed side-tables handed to units at run time.
//! - `hash`, `id`, `config`, `manifest`, `error`: ambient plumbing.
//!
//! Nothing in here generates or executes code; see `dagc-codegen` and
//! `dagc-exec` for that.

pub mod config;
pub mod dag;
pub mod error;
pub mod graph;
pub mod hash;
pub mod id;
pub mod logic;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod table;
pub mod types;

pub use error::{Diagnostics, Error, Result};

/// Compiler version string recorded in manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
