use clap::ValueEnum;
use md5::Md5;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::sync::Arc;

use crate::audit::AuditLog;
use crate::catalog::CatalogProvider;
use crate::models::AppId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashAlgorithm {
    Md5,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    // Lower-case hex digest
    pub fn hex_digest(&self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
            HashAlgorithm::Sha224 => hex::encode(Sha224::digest(bytes)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }
}

/// Checks that the client built its view from the same catalog we have.
///
/// The digest is recomputed from the current catalog on every call. A missing
/// or unreadable catalog hashes as empty input, so clients see a mismatch
/// rather than an error.
pub struct HashValidator {
    catalog: Arc<dyn CatalogProvider>,
    algorithm: HashAlgorithm,
    audit: AuditLog,
}

impl HashValidator {
    pub fn new(catalog: Arc<dyn CatalogProvider>, algorithm: HashAlgorithm, audit: AuditLog) -> Self {
        Self {
            catalog,
            algorithm,
            audit,
        }
    }

    pub async fn catalog_hash(&self) -> String {
        match self.catalog.load().await {
            Ok(catalog) => {
                let hash = self.algorithm.hex_digest(&catalog.content);
                tracing::debug!(%hash, refreshed_at = ?catalog.refreshed_at, "catalog hash computed");
                self.audit.record(format!("computed catalog hash: {}", hash));
                hash
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog unavailable, hashing empty content");
                self.audit.record(format!("warning: {}", e));
                self.algorithm.hex_digest(b"")
            }
        }
    }

    pub async fn validate(&self, client_hash: &str) -> bool {
        let server_hash = self.catalog_hash().await;
        if client_hash == server_hash {
            self.audit.record(format!("hash verification succeeded: {}", client_hash));
            true
        } else {
            tracing::info!(client = %client_hash, server = %server_hash, "hash mismatch");
            self.audit.record(format!(
                "hash verification failed: client={}, server={}",
                client_hash, server_hash
            ));
            false
        }
    }
}

// Looks for the literal `ID=<id>` marker in the catalog
pub struct AppValidator {
    catalog: Arc<dyn CatalogProvider>,
    audit: AuditLog,
}

impl AppValidator {
    pub fn new(catalog: Arc<dyn CatalogProvider>, audit: AuditLog) -> Self {
        Self { catalog, audit }
    }

    pub async fn exists(&self, app_id: &AppId) -> bool {
        let catalog = match self.catalog.load().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(error = %e, %app_id, "catalog unavailable, cannot validate app id");
                self.audit.record(format!("warning: cannot validate app id {}: {}", app_id, e));
                return false;
            }
        };

        let marker = format!("ID=<{}>", app_id);
        let found = contains(&catalog.content, marker.as_bytes());
        if found {
            self.audit.record(format!("app id validated: {}", app_id));
        } else {
            self.audit.record(format!("app id not in catalog: {}", app_id));
        }
        found
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
