use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use encoding_rs::UTF_8;
use lopdf::Document as PdfDocument;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use regex::Regex;
use std::cmp::Ordering;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

const SLIDE_ENTRY_PREFIX: &str = "ppt/slides/slide";
const WORD_BODY_ENTRY: &str = "word/document.xml";

static FIRST_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Format-specific text extractors. Every function works on the raw upload
/// bytes and returns untrimmed text; normalization happens in the dispatcher.
pub struct DocumentParser;

impl DocumentParser {
    /// PDF via lopdf. Pages in physical order, each prefixed with `[PAGE i]`.
    pub fn parse_pdf(data: &[u8]) -> Result<String> {
        let doc = PdfDocument::load_mem(data).context("Failed to load PDF file")?;
        let pages = doc.get_pages();
        debug!("PDF has {} pages", pages.len());

        let mut content = String::new();

        for page_num in pages.keys() {
            let text = match doc.extract_text(&[*page_num]) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to extract text from page {}: {}", page_num, e);
                    String::new()
                }
            };

            content.push_str(&format!("[PAGE {}]\n{}\n\n", page_num, text.trim()));
        }

        Ok(content)
    }

    /// DOCX raw text: paragraphs become blank-line separated blocks, styling is dropped.
    pub fn parse_docx(data: &[u8]) -> Result<String> {
        let xml = Self::read_zip_entry(data, WORD_BODY_ENTRY).context("Failed to read DOCX body")?;

        let mut reader = XmlReader::from_str(&xml);
        let mut text = String::new();
        let mut in_run = false;
        let mut in_text = false;

        loop {
            match reader.read_event().context("Malformed DOCX XML")? {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:r" => in_run = true,
                    b"w:t" => in_text = true,
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"w:r" => in_run = false,
                    b"w:t" => in_text = false,
                    b"w:p" => text.push_str("\n\n"),
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:tab" if in_run => text.push('\t'),
                    b"w:br" | b"w:cr" if in_run => text.push('\n'),
                    b"w:p" => text.push_str("\n\n"),
                    _ => {}
                },
                Event::Text(t) if in_text => {
                    text.push_str(&t.unescape().context("Bad entity in DOCX text")?);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(text)
    }

    /// XLSX / XLS via calamine. Every sheet in workbook order, serialized as CSV.
    pub fn parse_excel(data: &[u8]) -> Result<String> {
        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(data)).context("Failed to open spreadsheet")?;

        let mut content = String::new();

        for sheet_name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .with_context(|| format!("Failed to read sheet '{}'", sheet_name))?;

            debug!("Sheet '{}' spans {:?}", sheet_name, range.get_size());

            content.push_str(&format!("### SHEET: {}\n", sheet_name));
            content.push_str(&Self::range_to_csv(&range)?);
            content.push_str("\n\n");
        }

        Ok(content)
    }

    /// PPTX: slide parts sorted by slide number, `a:t` runs joined by spaces,
    /// blank slides skipped and the rest numbered by emission order.
    pub fn parse_pptx(data: &[u8]) -> Result<String> {
        let mut archive =
            ZipArchive::new(Cursor::new(data)).context("Failed to open PPTX as ZIP archive")?;

        let mut slide_files: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with(SLIDE_ENTRY_PREFIX) && name.ends_with(".xml"))
            .map(str::to_string)
            .collect();

        if slide_files.is_empty() {
            warn!("No slide files found in PPTX archive");
        }

        slide_files.sort_by(|a, b| Self::compare_slide_entries(a, b));

        let mut content = String::new();
        let mut emitted = 0usize;

        for slide_name in slide_files {
            let mut entry = archive
                .by_name(&slide_name)
                .with_context(|| format!("Missing slide part {}", slide_name))?;
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .with_context(|| format!("Failed to read {}", slide_name))?;

            let text = Self::slide_text(&xml).with_context(|| format!("Malformed {}", slide_name))?;
            if text.trim().is_empty() {
                debug!("Skipping blank slide {}", slide_name);
                continue;
            }

            emitted += 1;
            content.push_str(&format!("### SLIDE {}\n{}\n\n", emitted, text));
        }

        Ok(content)
    }

    /// Plain text / code, decoded as UTF-8 (BOM aware, invalid bytes replaced).
    pub fn parse_text(data: &[u8]) -> Result<String> {
        let (text, encoding, had_errors) = UTF_8.decode(data);
        if had_errors {
            warn!("Replaced invalid {} sequences while decoding text", encoding.name());
        }
        Ok(text.into_owned())
    }

    /// Sort key for slide parts: the first integer embedded in the entry
    /// name. Names without digits sort after every numbered slide.
    pub fn slide_sort_key(entry_name: &str) -> Option<u64> {
        FIRST_INTEGER
            .find(entry_name)
            .and_then(|m| m.as_str().parse::<u64>().ok())
    }

    fn compare_slide_entries(a: &str, b: &str) -> Ordering {
        match (Self::slide_sort_key(a), Self::slide_sort_key(b)) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }

    fn slide_text(xml: &str) -> Result<String> {
        let mut reader = XmlReader::from_str(xml);
        let mut runs: Vec<String> = Vec::new();
        let mut current: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.name().as_ref() == b"a:t" => current = Some(String::new()),
                Event::Empty(e) if e.name().as_ref() == b"a:t" => runs.push(String::new()),
                Event::Text(t) => {
                    if let Some(buf) = current.as_mut() {
                        buf.push_str(&t.unescape()?);
                    }
                }
                Event::End(e) if e.name().as_ref() == b"a:t" => {
                    if let Some(buf) = current.take() {
                        runs.push(buf);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(runs.join(" "))
    }

    fn range_to_csv(range: &Range<Data>) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());

        for row in range.rows() {
            writer.write_record(row.iter().map(Self::cell_to_string))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV writer: {}", e))?;
        let csv = String::from_utf8(bytes).context("CSV output is not UTF-8")?;

        Ok(csv.trim_end_matches('\n').to_string())
    }

    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string().to_uppercase(),
            Data::Error(e) => e.to_string(),
            Data::Empty => String::new(),
            Data::DateTime(d) => d
                .as_datetime()
                .map(|dt| dt.to_string())
                .unwrap_or_else(|| d.as_f64().to_string()),
            Data::DateTimeIso(d) => d.clone(),
            Data::DurationIso(d) => d.clone(),
        }
    }

    fn read_zip_entry(data: &[u8], entry_name: &str) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(data)).context("Not a valid ZIP package")?;
        let mut entry = archive
            .by_name(entry_name)
            .with_context(|| format!("Missing {}", entry_name))?;

        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        Ok(xml)
    }
}
