//! Degraded last-resort outputs.
//!
//! When nothing could extract real content, these write a minimal, valid,
//! non-empty file that tells the reader what happened. A success from either
//! strategy is reported as [`crate::ConversionStatus::Degraded`].

use super::{AttemptContext, ChainState, Step, Strategy};
use crate::error::AttemptError;
use crate::format::Format;
use async_trait::async_trait;
use std::io::{Cursor, Write};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Page count plus guidance text, for PDFs without a usable text layer.
#[derive(Debug, Clone, Copy)]
pub struct TextPlaceholder;

#[async_trait]
impl Strategy for TextPlaceholder {
    fn name(&self) -> &str {
        "text-placeholder"
    }

    fn engine(&self) -> &str {
        "pdfium"
    }

    fn degraded(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let input = state.require(Format::Pdf)?;
        let pages = match ctx.engines.library.inspect(input, None).await {
            Ok(info) => Some(info.page_count),
            Err(e) => {
                warn!("Page count unavailable for placeholder: {}", e);
                None
            }
        };
        let out = ctx.output_path(&ChainState::stem_of(input), "placeholder");
        tokio::fs::write(&out, text_placeholder(pages)).await?;
        Ok(Step::Produced)
    }
}

pub fn text_placeholder(pages: Option<usize>) -> String {
    let header = match pages {
        Some(1) => "Extracted from PDF (1 page)".to_string(),
        Some(n) => format!("Extracted from PDF ({n} pages)"),
        None => "Extracted from PDF".to_string(),
    };
    format!(
        "{header}\n\n\
         No text layer could be extracted from this document.\n\
         For better results, convert again with OCR enabled or convert to DOCX.\n"
    )
}

/// Empty spreadsheet shell for PDFs no engine could tabulate.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetPlaceholder;

#[async_trait]
impl Strategy for SpreadsheetPlaceholder {
    fn name(&self) -> &str {
        "spreadsheet-placeholder"
    }

    fn engine(&self) -> &str {
        "native"
    }

    fn degraded(&self) -> bool {
        true
    }

    async fn attempt(
        &self,
        ctx: &AttemptContext<'_>,
        state: &mut ChainState,
    ) -> Result<Step, AttemptError> {
        let original = state
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let note = format!("No tables could be extracted from {original}.");
        let bytes = match ctx.target {
            Format::Xlsx => minimal_xlsx(&note)?,
            Format::Xls => minimal_xls(&note).into_bytes(),
            other => {
                return Err(AttemptError::Unsupported(format!(
                    "{other} is not a spreadsheet"
                )))
            }
        };
        let out = ctx.output_path(&ChainState::stem_of(&state.input), "placeholder");
        tokio::fs::write(&out, bytes).await?;
        Ok(Step::Produced)
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// A one-sheet workbook with `note` in A1.
pub fn minimal_xlsx(note: &str) -> std::io::Result<Vec<u8>> {
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{}</t></is></c></row></sheetData></worksheet>"#,
        xml_escape(note)
    );

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.finish()?;
    Ok(buffer)
}

/// Legacy `.xls` placeholder: an HTML table, which spreadsheet applications
/// open under that extension.
pub fn minimal_xls(note: &str) -> String {
    format!(
        "<html><head><meta charset=\"utf-8\"></head><body><table><tr><td>{}</td></tr></table></body></html>\n",
        xml_escape(note)
    )
}
