//! Encrypted file container.
//!
//! A container pairs the ciphertext of a file with its original name and
//! the time it was encrypted. It is stored as a JSON record with the
//! ciphertext in base64. The cipher parameters are never stored.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cellcrypt_common::{Error, Result};

/// Record type tag written into every container.
pub const RECORD_TYPE: &str = "cellcrypt.encrypted-file";

/// Container format version.
pub const CONTAINER_VERSION: u32 = 1;

/// An encrypted file and its metadata. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContainer {
    original_name: String,
    created_at: DateTime<Utc>,
    ciphertext: Vec<u8>,
}

/// On-disk representation.
#[derive(Serialize, Deserialize)]
struct ContainerRecord {
    record_type: String,
    version: u32,
    original_name: String,
    created_at: DateTime<Utc>,
    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

impl EncryptedContainer {
    /// Create a container stamped with the current time.
    pub fn create(original_name: impl Into<String>, ciphertext: Vec<u8>) -> Self {
        Self::from_parts(original_name, Utc::now(), ciphertext)
    }

    /// Create a container with an explicit timestamp.
    pub fn from_parts(
        original_name: impl Into<String>,
        created_at: DateTime<Utc>,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            created_at,
            ciphertext,
        }
    }

    /// Name (or path) of the file that was encrypted.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// When the file was encrypted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Encrypted file contents.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Consume the container, returning the ciphertext.
    pub fn into_ciphertext(self) -> Vec<u8> {
        self.ciphertext
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let record = ContainerRecord {
            record_type: RECORD_TYPE.to_string(),
            version: CONTAINER_VERSION,
            original_name: self.original_name.clone(),
            created_at: self.created_at,
            ciphertext: self.ciphertext.clone(),
        };
        serde_json::to_vec_pretty(&record).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    ///
    /// # Errors
    /// - `MalformedContainer` if the bytes are not a valid record, the
    ///   record type is wrong, or the version is unsupported
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: ContainerRecord = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedContainer(e.to_string()))?;

        if record.record_type != RECORD_TYPE {
            return Err(Error::MalformedContainer(format!(
                "Unexpected record type: {}",
                record.record_type
            )));
        }
        if record.version != CONTAINER_VERSION {
            return Err(Error::MalformedContainer(format!(
                "Unsupported container version: {}",
                record.version
            )));
        }

        Ok(Self {
            original_name: record.original_name,
            created_at: record.created_at,
            ciphertext: record.ciphertext,
        })
    }

    /// Write the container to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read a container from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
