//! s3h-core: Core library for the s3-helper client
//!
//! This crate provides the folder-oriented layer over a flat object store:
//! - Configuration management
//! - Path parsing and key translation
//! - ObjectStore trait for S3 operations
//! - Listing, transfer and rename engines
//! - The [`S3Helper`] façade tying them together
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing for easy testing through [`MemoryStore`].

pub mod config;
pub mod error;
pub mod helper;
pub mod listing;
pub mod memory;
pub mod path;
pub mod progress;
pub mod rename;
pub mod traits;
pub mod transfer;

pub use config::{Config, ConfigManager, Credentials, Defaults};
pub use error::{Error, ItemFailure, Result};
pub use helper::{HelperConfig, S3Helper};
pub use listing::{Listing, MissingFolderPolicy};
pub use memory::MemoryStore;
pub use path::{ParsedPath, RemotePath, parse_path};
pub use progress::{FnObserver, ProgressEvent, ProgressObserver};
pub use traits::{ListOptions, ListResult, ObjectInfo, ObjectStore};
pub use transfer::{TransferOptions, TransferOutcome, TransferReport};
