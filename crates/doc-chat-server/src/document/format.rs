/// Extensions read verbatim as text.
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    // Prose / data
    "txt", "md", "markdown", "csv", "tsv", "json", "log",
    // Code
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "java", "rs", "go", "c", "h", "cpp", "hpp",
    "cs", "rb", "php", "swift", "kt", "sql", "sh", "bash",
    // Web
    "html", "htm", "css", "scss", "xml",
    // Config
    "yaml", "yml", "toml", "ini", "cfg", "conf", "env",
];

/// Every format the dispatcher knows how to handle, plus the rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    WordDocument,
    Spreadsheet,
    Presentation,
    /// `.doc` / `.ppt` binaries, never attempted.
    Legacy(String),
    PlainText,
    Unsupported(String),
}

impl FileFormat {
    /// Resolve the format from extension and declared MIME type.
    /// Rules are ordered, first match wins.
    pub fn classify(extension: &str, mime_type: &str) -> Self {
        let ext = extension.to_lowercase();
        let mime = mime_type.to_lowercase();

        if ext == "pdf" || mime == "application/pdf" {
            return Self::Pdf;
        }

        match ext.as_str() {
            "docx" => Self::WordDocument,
            "xlsx" | "xls" => Self::Spreadsheet,
            "pptx" => Self::Presentation,
            "ppt" | "doc" => Self::Legacy(ext),
            _ if PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("text/") => {
                Self::PlainText
            }
            _ => Self::Unsupported(ext),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::WordDocument => "docx",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "pptx",
            Self::Legacy(_) => "legacy",
            Self::PlainText => "text",
            Self::Unsupported(_) => "unsupported",
        }
    }
}
