use bytes::Bytes;
use serde::Serialize;

/// Raw upload as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub data: Bytes,
}

impl UploadedFile {
    /// Build an upload, filling a missing or generic MIME type from the
    /// file extension the way browsers populate `File.type`.
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let data = data.into();

        let mime_type = match mime_type.map(str::trim) {
            Some(m) if !m.is_empty() && m != "application/octet-stream" => m.to_string(),
            _ => mime_guess::from_path(&name)
                .first()
                .map(|m| m.essence_str().to_string())
                .unwrap_or_default(),
        };

        Self {
            size_bytes: data.len() as u64,
            name,
            mime_type,
            data,
        }
    }

    /// Lowercase text after the last `.`; the whole name when there is no dot.
    /// Dotfiles such as `.env` resolve to `env`.
    pub fn extension(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Normalized text of one successfully processed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub name: String,
    /// Extracted text, trimmed and never empty.
    pub content: String,
    pub source_type: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_mime_is_kept() {
        let file = UploadedFile::new("report.bin", Some("application/pdf"), vec![1u8, 2, 3]);
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size_bytes, 3);
    }

    #[test]
    fn test_missing_mime_is_guessed_from_extension() {
        let file = UploadedFile::new("notes.txt", None, "hi");
        assert_eq!(file.mime_type, "text/plain");

        let file = UploadedFile::new("doc.pdf", Some("application/octet-stream"), "x");
        assert_eq!(file.mime_type, "application/pdf");

        let file = UploadedFile::new("blob", Some(""), "x");
        assert_eq!(file.mime_type, "");
    }

    #[test]
    fn test_extension_is_lowercase() {
        assert_eq!(UploadedFile::new("Deck.PPTX", None, "x").extension(), "pptx");
        assert_eq!(UploadedFile::new("Makefile", None, "x").extension(), "makefile");
        assert_eq!(UploadedFile::new("archive.tar.GZ", None, "x").extension(), "gz");
        assert_eq!(UploadedFile::new(".env", None, "x").extension(), "env");
        assert_eq!(UploadedFile::new(".gitignore", None, "x").extension(), "gitignore");
    }
}
