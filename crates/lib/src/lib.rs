//! kiln-lib: incremental build graph and device synchronization
//!
//! This crate provides the engine behind kiln:
//! - `Source`: declarative references to files, resolved against an `Environment`
//! - `FileHashStore`: content hashes persisted between runs
//! - `BuildSystem`: targets with stamps, built in dependency order
//! - `DevFs`: pushes changed content to a device file system over a bounded uploader

pub mod build;
pub mod consts;
pub mod devfs;
pub mod environment;
pub mod filestore;
pub mod source;
pub mod util;
