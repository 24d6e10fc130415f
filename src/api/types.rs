//! Wire types returned by the signature API.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Summary of one signature transaction, as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureRecord {
    /// Remote signature identifier.
    pub id: String,
    /// Creation timestamp, kept verbatim for the download log.
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    /// Documents bundled in this signature.
    #[serde(default, deserialize_with = "null_as_default")]
    pub documents: Vec<DocumentRef>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// One document attached to a signature.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRef {
    /// Remote document identifier.
    pub id: String,
    /// File information, when the API includes it.
    #[serde(default)]
    pub file: Option<DocumentFile>,
}

/// File information for a document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFile {
    /// Name of the file as uploaded.
    #[serde(default)]
    pub name: Option<String>,
}

impl DocumentRef {
    /// Name of the uploaded file, or `<document_id>.pdf` when the API omits it.
    #[must_use]
    pub fn original_filename(&self) -> String {
        self.file
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| format!("{}.pdf", self.id), str::to_string)
    }
}

/// Full detail payload for one signature.
#[derive(Debug, Clone)]
pub struct DetailRecord {
    /// Signature the payload belongs to.
    pub signature_id: String,
    /// The payload as returned by the API.
    pub payload: Value,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_record_parses_listing_entry() {
        let json = r#"{
            "id": "sig-1",
            "created_at": "2024-03-04T10:00:00+0000",
            "status": "completed",
            "documents": [
                {"id": "doc-1", "file": {"name": "contract.pdf", "pages": 3}},
                {"id": "doc-2"}
            ]
        }"#;
        let record: SignatureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "sig-1");
        assert_eq!(record.created_at, "2024-03-04T10:00:00+0000");
        assert_eq!(record.documents.len(), 2);
        assert_eq!(record.documents[0].original_filename(), "contract.pdf");
        assert_eq!(record.documents[1].original_filename(), "doc-2.pdf");
        assert_eq!(record.metadata.get("status").unwrap(), "completed");
    }

    #[test]
    fn test_signature_record_null_documents_is_empty() {
        let record: SignatureRecord =
            serde_json::from_str(r#"{"id": "sig-2", "documents": null, "created_at": null}"#)
                .unwrap();
        assert!(record.documents.is_empty());
        assert!(record.created_at.is_empty());
    }

    #[test]
    fn test_blank_file_name_falls_back_to_document_id() {
        let doc: DocumentRef =
            serde_json::from_str(r#"{"id": "d9", "file": {"name": "   "}}"#).unwrap();
        assert_eq!(doc.original_filename(), "d9.pdf");
    }
}
