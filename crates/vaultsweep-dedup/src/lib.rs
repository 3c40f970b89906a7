//! Duplicate cipher detection and cleanup.
//!
//! Flow: [`DeDuplicateService`] fetches ciphers, [`DuplicateFinder`] buckets
//! them by the keys [`KeyExtractor`] derives from [`uri::parse`] output, a
//! [`DuplicateReviewer`] picks what to delete, and the service deletes it in
//! batches through a [`CipherStore`].

pub mod collaborators;
pub mod domain;
pub mod error;
pub mod finder;
pub mod local;
pub mod review;
pub mod service;
pub mod strategy;
pub mod uri;
pub mod warnings;

pub use collaborators::{CipherAuthorization, CipherStore, DuplicateReviewer};
pub use domain::{DomainResolver, PslDomainResolver};
pub use error::{DedupError, Result};
pub use finder::{DuplicateFinder, DuplicateSet, GroupingKind};
pub use local::LocalCipherAuthorization;
pub use review::{KeepFirstReviewer, ReviewDecision};
pub use service::{DeDuplicateService, DuplicateOperationResult, DuplicateOptions, DuplicateScan};
pub use strategy::KeyExtractor;
pub use uri::{ParsedUri, UriKind, WebLocation};
pub use warnings::{DuplicateOperationWarnings, WarningAccumulator};
