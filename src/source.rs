use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use tracing::info;

const DOCUMENT_PART: &str = "word/document.xml";

/// Read the ordered paragraph texts of an input document.
///
/// `.docx` files are read as word-processing packages; anything else is
/// treated as plain text with one paragraph per line.
pub fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
    let is_docx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));

    let paragraphs = if is_docx {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        read_docx_paragraphs(BufReader::new(file))
            .with_context(|| format!("Failed to read {} as a Word document", path.display()))?
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        text.lines().map(str::to_string).collect()
    };

    info!("Loaded {} paragraphs from {}", paragraphs.len(), path.display());
    Ok(paragraphs)
}

/// Join non-empty trimmed paragraphs with single spaces.
pub fn flatten(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body-level paragraphs of a `.docx` package, in document order.
///
/// Paragraphs nested in tables are skipped. Line breaks inside a paragraph
/// come back as `'\n'`, tabs as `'\t'`.
pub fn read_docx_paragraphs<R: Read + Seek>(reader: R) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .with_context(|| format!("Package has no {}", DOCUMENT_PART))?
        .read_to_string(&mut xml)?;
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut table_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" if table_depth == 0 => current = Some(String::new()),
                b"w:t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match (e.name().as_ref(), current.as_mut()) {
                (b"w:p", None) if table_depth == 0 => paragraphs.push(String::new()),
                (b"w:br" | b"w:cr", Some(p)) => p.push('\n'),
                (b"w:tab", Some(p)) => p.push('\t'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&e.unescape()?);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" => {
                    if let Some(p) = current.take() {
                        paragraphs.push(p);
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    fn docx_with_body(body: &str) -> Cursor<Vec<u8>> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_PART, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn flatten_skips_blank_paragraphs() {
        let paragraphs = vec![
            "  Title: A ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "Date: B".to_string(),
        ];
        assert_eq!(flatten(&paragraphs), "Title: A Date: B");
    }

    #[test]
    fn docx_paragraphs_with_breaks() {
        let body = r#"<w:p><w:r><w:t>Title: Test Entry</w:t><w:br/><w:t xml:space="preserve">Date: 2024-01-01 </w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>x</w:t></w:r></w:p>"#;
        let paragraphs = read_docx_paragraphs(docx_with_body(body)).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Title: Test Entry\nDate: 2024-01-01 ", "", "Tom & Jerry\tx"]
        );
    }

    #[test]
    fn docx_table_paragraphs_skipped() {
        let body = r#"<w:p><w:r><w:t>before</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>after</w:t></w:r></w:p>"#;
        let paragraphs = read_docx_paragraphs(docx_with_body(body)).unwrap();
        assert_eq!(paragraphs, vec!["before", "after"]);
    }

    #[test]
    fn docx_entry_parses() {
        let body = r#"<w:p><w:r><w:t>Title: Test Entry</w:t><w:br/><w:t>Date: 2024-01-01</w:t><w:br/><w:t>Country: Testland</w:t><w:br/><w:t>Summary: This is a summary.</w:t><w:br/><w:t>Key Aspects:</w:t><w:br/><w:t>- Aspect 1</w:t><w:br/><w:t>- Aspect 2</w:t><w:br/><w:t>Link: http://example.com</w:t><w:br/><w:t>Availability: Public</w:t></w:r></w:p>"#;
        let paragraphs = read_docx_paragraphs(docx_with_body(body)).unwrap();
        let out = crate::parser::extract_entries(&flatten(&paragraphs));
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].title, "Test Entry");
        assert!(out.entries[0].key_aspects.contains(&"Aspect 1".to_string()));
    }

    #[test]
    fn not_a_package() {
        assert!(read_docx_paragraphs(Cursor::new(b"plain text".to_vec())).is_err());
    }

    #[test]
    fn text_file_lines() {
        let paragraphs = read_paragraphs(Path::new("tests/fixtures/digest.txt")).unwrap();
        assert!(paragraphs[0].starts_with("Regulatory Watch"));
        assert!(paragraphs.iter().any(|p| p.is_empty()));
    }

    #[test]
    fn missing_input() {
        let err = read_paragraphs(Path::new("tests/fixtures/nope.docx")).unwrap_err();
        assert!(err.to_string().contains("nope.docx"));
    }
}
