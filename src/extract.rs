//! Text extraction for uploaded documents.
//!
//! The format is chosen from the file extension. PDF goes through
//! `pdf-extract`; DOCX, PPTX and XLSX are ZIP containers whose XML parts
//! are read with `quick-xml`. Plain text and Markdown are decoded as UTF-8.
//! Extraction never panics on malformed input; it returns an
//! [`ExtractError`] and the loader reports that one file as failed.

use quick_xml::events::Event;
use std::any::Any;
use std::io::{Cursor, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes read from one ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    PlainText,
}

impl DocumentFormat {
    /// Format for a path's extension (case-insensitive), if supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            "txt" | "md" | "markdown" => Some(Self::PlainText),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

impl ExtractError {
    fn ooxml(e: impl ToString) -> Self {
        Self::Ooxml(e.to_string())
    }
}

/// Read a file and extract its text.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| ExtractError::Unsupported(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    extract_text(&bytes, format)
}

/// Extract plain UTF-8 text from a document's bytes.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Xlsx => extract_xlsx(bytes),
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// pdf-extract panics on some malformed files (undefined font resources,
/// fonts without a subtype); such a panic is reported as a parse error.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(payload) => Err(ExtractError::Pdf(format!(
            "pdf parser panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown cause"
    }
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ExtractError::ooxml)
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ExtractError::ooxml)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ExtractError::ooxml)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Entries under `prefix` named `<prefix>N.xml`, in numeric order.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Concatenate every `<t>` run, starting a new line at each closing `<p>`.
///
/// Word (`w:t` in `w:p`) and DrawingML (`a:t` in `a:p`) share this shape.
fn paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_t = true,
            Ok(Event::Text(te)) if in_t => {
                out.push_str(te.unescape().map_err(ExtractError::ooxml)?.as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" if !out.is_empty() && !out.ends_with('\n') => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    if archive.index_for_name("word/document.xml").is_none() {
        return Err(ExtractError::Ooxml(
            "word/document.xml not found".to_string(),
        ));
    }
    let xml = read_entry(&mut archive, "word/document.xml")?;
    paragraph_text(&xml)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let text = paragraph_text(&read_entry(&mut archive, &name)?)?;
        if !text.is_empty() {
            slides.push(text);
        }
    }
    Ok(slides.join("\n\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = if archive.index_for_name("xl/sharedStrings.xml").is_some() {
        shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)?
    } else {
        Vec::new()
    };
    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let text = sheet_cells(&read_entry(&mut archive, &name)?, &shared)?;
        if !text.is_empty() {
            sheets.push(text);
        }
    }
    Ok(sheets.join("\n\n"))
}

/// Each `<si>` item's text; rich-text runs inside one item are joined.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().map_err(ExtractError::ooxml)?.as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One line per row; shared-string and literal cell values separated by spaces.
fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut shared_cell = false;
    let mut cells = 0usize;
    while cells < XLSX_MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_v => {
                let raw = te.unescape().map_err(ExtractError::ooxml)?;
                let value = raw.trim();
                let text = if shared_cell {
                    value.parse::<usize>().ok().and_then(|i| shared.get(i)).cloned()
                } else {
                    Some(value.to_string())
                };
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    row.push(text);
                    cells += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => shared_cell = false,
                b"row" if !row.is_empty() => rows.push(std::mem::take(&mut row).join(" ")),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::ooxml(e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/Report.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes.md")),
            Some(DocumentFormat::PlainText)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("image.png")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_panic_payloads_become_messages() {
        let literal = catch_unwind(|| panic!("F2")).unwrap_err();
        assert_eq!(panic_message(literal.as_ref()), "F2");
        let formatted = catch_unwind(|| panic!("font {} missing", 2)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "font 2 missing");
        let opaque = catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(opaque.as_ref()), "unknown cause");
    }

    #[test]
    fn test_invalid_zip_returns_error() {
        let err = extract_text(b"not a zip", DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
<w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>
</w:body></w:document>"#;
        let bytes = zip_with(&[("word/document.xml", xml)]);
        let text = extract_text(&bytes, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "Hello world\nSecond & last");
    }

    #[test]
    fn test_docx_without_body_part() {
        let bytes = zip_with(&[("other.xml", "<x/>")]);
        let err = extract_text(&bytes, DocumentFormat::Docx).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |t: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#,
                t
            )
        };
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let text = extract_text(&bytes, DocumentFormat::Pptx).unwrap();
        assert_eq!(text, "one\n\ntwo\n\nten");
    }

    #[test]
    fn test_xlsx_shared_and_literal_cells() {
        let shared = r#"<sst><si><t>Name</t></si><si><r><t>Ad</t></r><r><t>a</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
<row><c t="s"><v>0</v></c><c><v>42</v></c></row>
<row><c t="s"><v>1</v></c></row>
</sheetData></worksheet>"#;
        let bytes = zip_with(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let text = extract_text(&bytes, DocumentFormat::Xlsx).unwrap();
        assert_eq!(text, "Name 42\nAda");
    }

    #[test]
    fn test_plain_text_is_lossy_utf8() {
        let text = extract_text(b"caf\xc3\xa9 \xff", DocumentFormat::PlainText).unwrap();
        assert!(text.starts_with("café"));
    }

    #[test]
    fn test_extract_file_unsupported_extension() {
        let err = extract_file(Path::new("photo.jpg")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }
}
