//! Document formats end to end: extraction, directory scanning, and the
//! `dk` binary.

use deepknowledge::extract::{extract_file, DocumentFormat};
use deepknowledge::loader::{load_documents, scan_directory, DocumentFile};
use deepknowledge_core::models::SourceKind;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Minimal valid PDF containing the text "pdf test phrase".
fn minimal_pdf_with_phrase() -> Vec<u8> {
    pdf_with_content(b"BT /F1 12 Tf 100 700 Td (pdf test phrase) Tj ET")
}

/// One-page PDF whose only font resource is `/F1`.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn pdf_with_content(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx: one `word/document.xml` with a paragraph per phrase.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn write(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

#[test]
fn pdf_text_is_extracted() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "report.pdf", &minimal_pdf_with_phrase());

    let text = extract_file(&tmp.path().join("report.pdf")).unwrap();
    assert!(text.contains("pdf test phrase"), "got: {text:?}");
}

#[test]
fn docx_paragraphs_are_extracted_in_order() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "memo.docx",
        &minimal_docx(&["office test phrase", "second paragraph"]),
    );

    let text = extract_file(&tmp.path().join("memo.docx")).unwrap();
    assert_eq!(text, "office test phrase\nsecond paragraph");
    assert_eq!(
        DocumentFormat::from_path(&tmp.path().join("memo.docx")),
        Some(DocumentFormat::Docx)
    );
}

#[test]
fn long_document_becomes_numbered_records() {
    let tmp = TempDir::new().unwrap();
    let paragraphs: Vec<String> = (0..40)
        .map(|i| format!("Paragraph {} talks about the quarterly numbers in some detail.", i))
        .collect();
    let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
    write(tmp.path(), "long.docx", &minimal_docx(&refs));

    // 50 tokens ≈ 200 chars per record.
    let report = load_documents(&[DocumentFile::from_path(tmp.path().join("long.docx"))], 50);

    assert!(report.failures.is_empty());
    assert!(report.records.len() > 1);
    for (i, record) in report.records.iter().enumerate() {
        assert_eq!(record.kind, SourceKind::Document);
        assert_eq!(record.source_ref, "long.docx");
        assert_eq!(record.id, format!("long.docx#{}", i));
        assert!(record.text.len() <= 200);
    }
    let joined: String = report.records.iter().map(|r| r.text.as_str()).collect();
    assert!(joined.contains("Paragraph 0 "));
    assert!(joined.contains("Paragraph 39 "));
}

#[test]
fn corrupt_file_is_skipped_without_aborting_batch() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "good.docx", &minimal_docx(&["fine"]));
    write(tmp.path(), "bad.docx", b"PK not really a zip");
    write(tmp.path(), "bad.pdf", b"not a pdf at all");

    let files = scan_directory(tmp.path(), &["**/*.docx".to_string(), "**/*.pdf".to_string()])
        .unwrap();
    let report = load_documents(&files, 700);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].source_ref, "good.docx");
    let failed: Vec<&str> = report
        .failures
        .iter()
        .filter_map(|e| e.source_ref())
        .collect();
    assert_eq!(failed, vec!["bad.docx", "bad.pdf"]);
    assert!(report.failures.iter().all(|e| e.kind() == "fetch_failed"));
}

#[test]
fn pdf_parser_panic_is_a_per_file_failure() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a_notes.txt", b"plain notes");
    write(tmp.path(), "b_report.pdf", &minimal_pdf_with_phrase());
    // Text shown with a font missing from the page resources.
    write(
        tmp.path(),
        "c_broken.pdf",
        &pdf_with_content(b"BT /F2 12 Tf 100 700 Td (orphan text) Tj ET"),
    );
    write(tmp.path(), "d_memo.docx", &minimal_docx(&["still loaded"]));

    let files = scan_directory(
        tmp.path(),
        &["**/*.txt".to_string(), "**/*.pdf".to_string(), "**/*.docx".to_string()],
    )
    .unwrap();
    let report = load_documents(&files, 700);

    let loaded: Vec<&str> = report.records.iter().map(|r| r.source_ref.as_str()).collect();
    assert_eq!(loaded, vec!["a_notes.txt", "b_report.pdf", "d_memo.docx"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind(), "fetch_failed");
    assert_eq!(report.failures[0].source_ref(), Some("c_broken.pdf"));
}

#[test]
fn nested_documents_keep_relative_refs() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "2024/q1/notes.md", b"first quarter");
    write(tmp.path(), "2024/q2/notes.md", b"second quarter");

    let files = scan_directory(tmp.path(), &["**/*.md".to_string()]).unwrap();
    let refs: Vec<&str> = files.iter().map(|f| f.source_ref.as_str()).collect();
    assert_eq!(refs, vec!["2024/q1/notes.md", "2024/q2/notes.md"]);

    let report = load_documents(&files, 700);
    assert_eq!(report.records.len(), 2);
}

// ─── Binary ─────────────────────────────────────────────────────────

fn dk(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dk"));
    cmd.arg("--config")
        .arg(config)
        .env("OPENAI_API_KEY", "sk-test")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn dk_sources_on_empty_knowledge_base() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("dk.toml");
    fs::write(
        &config,
        "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
    )
    .unwrap();

    let output = dk(&config).arg("sources").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Knowledge base is empty."));
}

#[test]
fn dk_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("dk.toml");
    fs::write(&config, "[retrieval]\nmin_score = 3.0\n").unwrap();

    let output = dk(&config).arg("sources").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("retrieval.min_score"));
}
