pub mod extractor;
pub mod format;
pub mod parser;
pub mod record;

pub use extractor::DocumentExtractor;
pub use format::FileFormat;
pub use parser::DocumentParser;
pub use record::{DocumentRecord, UploadedFile};
