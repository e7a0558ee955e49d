use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the ledger. `name` is the join key between ledger rows and
/// indexed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub name: String,
    pub pdf_path: String,
    pub txt_path: String,
    pub indexed: bool,
}

impl LedgerEntry {
    /// A freshly extracted document, not yet visible in the index.
    pub fn extracted(
        name: impl Into<String>,
        pdf_path: impl Into<String>,
        txt_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pdf_path: pdf_path.into(),
            txt_path: txt_path.into(),
            indexed: false,
        }
    }
}
