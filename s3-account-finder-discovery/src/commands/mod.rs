//! Commands module - service layer for S3 Account Finder operations

pub(crate) mod service;

pub use service::{AccountFinderService, ServiceOptions};
