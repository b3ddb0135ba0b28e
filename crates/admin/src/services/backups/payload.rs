//! Backup file format.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "created_at": "2024-06-01T12:00:00Z",
//!   "kind": "full",
//!   "checksum": "<sha256 hex of `data`>",
//!   "data": { "sales": [...], "resellers": [...], "inventory": [...], "users": [...] }
//! }
//! ```
//!
//! Users are exported without password hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use agencia_check_core::BackupKind;

use crate::models::{InventoryItem, Reseller, Sale, UserView};
use crate::services::data_store::DataSnapshot;

/// Format version written and accepted.
pub const PAYLOAD_VERSION: &str = "1.0";

/// MIME type of backup files.
pub const CONTENT_TYPE: &str = "application/json";

/// Errors reading a backup file.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Not valid JSON, or not the expected shape.
    #[error("arquivo de backup inválido: {0}")]
    Parse(#[from] serde_json::Error),

    /// Written by an incompatible version.
    #[error("versão de backup não suportada: {0}")]
    UnsupportedVersion(String),

    /// Content does not match the recorded checksum.
    #[error("checksum não confere (esperado {expected}, calculado {actual})")]
    ChecksumMismatch {
        /// Checksum stored in the file.
        expected: String,
        /// Checksum of the content.
        actual: String,
    },

    /// A section the kind requires is absent.
    #[error("seção {0} ausente no backup")]
    MissingSection(&'static str),
}

/// The captured sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<Vec<Sale>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resellers: Option<Vec<Reseller>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserView>>,
}

/// Record counts per section, `None` for sections not present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionCounts {
    pub sales: Option<usize>,
    pub resellers: Option<usize>,
    pub inventory: Option<usize>,
    pub users: Option<usize>,
}

/// A complete backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub kind: BackupKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub data: BackupData,
}

impl BackupPayload {
    /// Capture the sections `kind` covers and stamp the checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be serialized.
    pub fn capture(
        kind: BackupKind,
        created_at: DateTime<Utc>,
        snapshot: DataSnapshot,
        users: Vec<UserView>,
    ) -> Result<Self, PayloadError> {
        let data = BackupData {
            sales: kind.includes(BackupKind::Sales).then_some(snapshot.sales),
            resellers: kind.includes(BackupKind::Resellers).then_some(snapshot.resellers),
            inventory: kind.includes(BackupKind::Inventory).then_some(snapshot.inventory),
            users: kind.includes(BackupKind::Users).then_some(users),
        };
        let checksum = checksum(&data)?;
        Ok(Self {
            version: PAYLOAD_VERSION.to_string(),
            created_at,
            kind,
            checksum: Some(checksum),
            data,
        })
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse and validate a backup file. A missing checksum is accepted; a
    /// wrong one is not.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, an unknown version, a checksum
    /// mismatch or a missing section.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let payload: Self = serde_json::from_slice(bytes)?;
        if payload.version != PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(payload.version));
        }

        if let Some(expected) = &payload.checksum {
            let actual = checksum(&payload.data)?;
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(PayloadError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        payload.check_sections()?;
        Ok(payload)
    }

    fn check_sections(&self) -> Result<(), PayloadError> {
        let required = [
            (BackupKind::Sales, "sales", self.data.sales.is_some()),
            (BackupKind::Resellers, "resellers", self.data.resellers.is_some()),
            (BackupKind::Inventory, "inventory", self.data.inventory.is_some()),
            (BackupKind::Users, "users", self.data.users.is_some()),
        ];
        for (section, name, present) in required {
            if self.kind.includes(section) && !present {
                return Err(PayloadError::MissingSection(name));
            }
        }
        Ok(())
    }

    /// Record counts per section.
    #[must_use]
    pub fn section_counts(&self) -> SectionCounts {
        SectionCounts {
            sales: self.data.sales.as_ref().map(Vec::len),
            resellers: self.data.resellers.as_ref().map(Vec::len),
            inventory: self.data.inventory.as_ref().map(Vec::len),
            users: self.data.users.as_ref().map(Vec::len),
        }
    }
}

/// SHA-256 over the canonical JSON of `data`, hex encoded.
///
/// # Errors
///
/// Returns an error if `data` cannot be serialized.
pub fn checksum(data: &BackupData) -> Result<String, PayloadError> {
    let bytes = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Human-readable size, e.g. `1.5 KB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let label = UNITS.get(unit).copied().unwrap_or("B");
    if unit == 0 {
        format!("{bytes} {label}")
    } else {
        format!("{size:.1} {label}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agencia_check_core::{Money, PaymentMethod, SaleId, SaleStatus};
    use chrono::TimeZone;

    fn snapshot() -> DataSnapshot {
        DataSnapshot {
            sales: vec![Sale {
                id: SaleId::new(1),
                value: Money::from_cents(12_345),
                date: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
                status: SaleStatus::Paid,
                reseller_id: None,
                customer: Some("cliente".into()),
                product_id: None,
                quantity: 1,
                payment_method: PaymentMethod::Pix,
                delivered_at: None,
            }],
            ..DataSnapshot::default()
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_kind_selects_sections() {
        let payload =
            BackupPayload::capture(BackupKind::Sales, created(), snapshot(), vec![]).unwrap();
        let counts = payload.section_counts();
        assert_eq!(counts.sales, Some(1));
        assert_eq!(counts.resellers, None);
        assert_eq!(counts.users, None);

        let full = BackupPayload::capture(BackupKind::Full, created(), snapshot(), vec![]).unwrap();
        assert_eq!(full.section_counts().users, Some(0));
    }

    #[test]
    fn test_file_verifies() {
        let payload =
            BackupPayload::capture(BackupKind::Full, created(), snapshot(), vec![]).unwrap();
        let bytes = payload.to_bytes().unwrap();
        assert_eq!(BackupPayload::from_slice(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_tampered_file_rejected() {
        let payload =
            BackupPayload::capture(BackupKind::Sales, created(), snapshot(), vec![]).unwrap();
        let text = String::from_utf8(payload.to_bytes().unwrap()).unwrap();
        let tampered = text.replace("123.45", "999.99");
        assert_ne!(text, tampered);

        let result = BackupPayload::from_slice(tampered.as_bytes());
        assert!(matches!(result, Err(PayloadError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut payload =
            BackupPayload::capture(BackupKind::Sales, created(), snapshot(), vec![]).unwrap();
        payload.version = "2.0".into();
        let result = BackupPayload::from_slice(&payload.to_bytes().unwrap());
        assert!(matches!(result, Err(PayloadError::UnsupportedVersion(v)) if v == "2.0"));
    }

    #[test]
    fn test_missing_section_rejected() {
        let json = r#"{"version":"1.0","created_at":"2024-06-02T00:00:00Z","kind":"inventory","data":{}}"#;
        let result = BackupPayload::from_slice(json.as_bytes());
        assert!(matches!(result, Err(PayloadError::MissingSection("inventory"))));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
