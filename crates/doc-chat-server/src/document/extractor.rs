use tracing::{debug, info, instrument};

use super::format::FileFormat;
use super::parser::DocumentParser;
use super::record::{DocumentRecord, UploadedFile};
use crate::utils::error::ExtractionError;

/// Batch entry point of the extraction pipeline.
///
/// Files are processed strictly one after another. The first failing file
/// aborts the batch and no partial result is returned.
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn extract(files: &[UploadedFile]) -> Result<Vec<DocumentRecord>, ExtractionError> {
        let mut records = Vec::with_capacity(files.len());

        for file in files {
            records.push(Self::extract_one(file)?);
        }

        info!("Extracted {} document(s)", records.len());
        Ok(records)
    }

    #[instrument(skip(file), fields(file = %file.name, size = file.size_bytes))]
    pub fn extract_one(file: &UploadedFile) -> Result<DocumentRecord, ExtractionError> {
        let extension = file.extension();
        let format = FileFormat::classify(&extension, &file.mime_type);
        debug!("Dispatching as {}", format.label());

        let raw = match &format {
            FileFormat::Pdf => DocumentParser::parse_pdf(&file.data),
            FileFormat::WordDocument => DocumentParser::parse_docx(&file.data),
            FileFormat::Spreadsheet => DocumentParser::parse_excel(&file.data),
            FileFormat::Presentation => DocumentParser::parse_pptx(&file.data),
            FileFormat::PlainText => DocumentParser::parse_text(&file.data),
            FileFormat::Legacy(ext) => {
                return Err(ExtractionError::UnsupportedFormat {
                    file_name: file.name.clone(),
                    reason: format!(
                        "Legacy .{} files are not supported. Please save as .pptx or .docx first.",
                        ext
                    ),
                });
            }
            FileFormat::Unsupported(ext) => {
                return Err(ExtractionError::UnsupportedFormat {
                    file_name: file.name.clone(),
                    reason: format!("The file extension .{} is not supported yet.", ext),
                });
            }
        }
        .map_err(|cause| ExtractionError::ExtractionFailure {
            file_name: file.name.clone(),
            cause,
        })?;

        let content = raw.trim();
        if content.is_empty() {
            return Err(ExtractionError::EmptyExtraction {
                file_name: file.name.clone(),
            });
        }

        let source_type = if file.mime_type.is_empty() {
            extension
        } else {
            file.mime_type.clone()
        };

        Ok(DocumentRecord {
            name: file.name.clone(),
            content: content.to_string(),
            source_type,
            size_bytes: file.size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parser::fixtures;

    fn upload(name: &str, data: Vec<u8>) -> UploadedFile {
        UploadedFile::new(name, None, data)
    }

    #[test]
    fn test_every_supported_format_yields_one_record() {
        let files = vec![
            upload("report.pdf", fixtures::pdf(&["Summary page"])),
            upload("memo.docx", fixtures::docx(&["Hello team"])),
            upload("budget.xlsx", fixtures::xlsx(&[("Sheet1", &[&["a", "b"]])])),
            upload(
                "deck.pptx",
                fixtures::zip_package(&[("ppt/slides/slide1.xml", fixtures::slide_xml(&["Intro"]).as_str())]),
            ),
            upload("main.rs", b"fn main() {}".to_vec()),
            upload(".env", b"API_URL=http://localhost".to_vec()),
            UploadedFile::new("Dockerfile", Some("text/x-dockerfile"), b"FROM rust".to_vec()),
        ];

        for file in &files {
            let records = DocumentExtractor::extract(std::slice::from_ref(file)).unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].name, file.name);
            assert!(!records[0].content.is_empty());
            assert_eq!(records[0].content, records[0].content.trim());
        }
    }

    #[test]
    fn test_legacy_formats_always_fail() {
        for name in ["old.doc", "old.ppt", "OLD.DOC"] {
            let err = DocumentExtractor::extract(&[upload(name, b"plain words".to_vec())]).unwrap_err();
            match err {
                ExtractionError::UnsupportedFormat { file_name, reason } => {
                    assert_eq!(file_name, name);
                    assert!(reason.contains("Legacy"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = DocumentExtractor::extract(&[upload("tool.exe", vec![0x4d, 0x5a])]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error with tool.exe: The file extension .exe is not supported yet."
        );
    }

    #[test]
    fn test_text_mime_without_known_extension() {
        let file = UploadedFile::new("Dockerfile", Some("text/plain"), "FROM rust");
        let records = DocumentExtractor::extract(&[file]).unwrap();
        assert_eq!(records[0].content, "FROM rust");
        assert_eq!(records[0].source_type, "text/plain");
    }

    #[test]
    fn test_dotfile_is_read_as_text() {
        let records =
            DocumentExtractor::extract(&[upload(".env", b"API_URL=http://localhost\n".to_vec())]).unwrap();
        assert_eq!(records[0].name, ".env");
        assert_eq!(records[0].content, "API_URL=http://localhost");
        assert_eq!(records[0].source_type, "env");
    }

    #[test]
    fn test_dotless_name_without_text_mime_is_unsupported() {
        let err = DocumentExtractor::extract(&[upload("LICENSE", b"MIT".to_vec())]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error with LICENSE: The file extension .license is not supported yet."
        );
    }

    #[test]
    fn test_whitespace_only_file_is_an_error() {
        let err = DocumentExtractor::extract(&[upload("blank.txt", b"  \n\t ".to_vec())]).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyExtraction { ref file_name } if file_name == "blank.txt"));
    }

    #[test]
    fn test_batch_aborts_on_first_failure() {
        let files = vec![
            upload("a.txt", b"first".to_vec()),
            upload("broken.pptx", b"not a zip".to_vec()),
            upload("c.txt", b"third".to_vec()),
        ];
        let err = DocumentExtractor::extract(&files).unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailure { .. }));
        assert_eq!(err.file_name(), "broken.pptx");
    }

    #[test]
    fn test_source_type_falls_back_to_extension() {
        let file = UploadedFile {
            name: "notes.md".to_string(),
            mime_type: String::new(),
            size_bytes: 4,
            data: bytes::Bytes::from_static(b"# hi"),
        };
        let records = DocumentExtractor::extract(&[file]).unwrap();
        assert_eq!(records[0].source_type, "md");
        assert_eq!(records[0].size_bytes, 4);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let file = upload("budget.xlsx", fixtures::xlsx(&[("Q1", &[&["Rent", "1200"]])]));
        let first = DocumentExtractor::extract(std::slice::from_ref(&file)).unwrap();
        let second = DocumentExtractor::extract(std::slice::from_ref(&file)).unwrap();
        assert_eq!(first[0].content, second[0].content);
    }
}
