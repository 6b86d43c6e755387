//! Arca Storage collaborator surface shared by the MCP server and its tests.
//!
//! Defines the `StorageBackend` trait the protocol dispatcher calls into, the
//! typed records its operations return, and the authenticated REST client that
//! implements the trait against the Arca Storage API.
mod client;
mod types;

pub use client::{ArcaStorageClient, ArcaStorageConfig};
pub use types::{
    DirectoryReceipt, DirectoryRecord, FileRecord, FileUploadReceipt, StorageBackend, StorageError,
};
