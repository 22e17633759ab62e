//! Supported document formats and the facts the strategy selector needs
//! about them: which family a format belongs to, which office-engine filter
//! names disambiguate it, and which extensions an engine may emit for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A document format, identified by its canonical file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Xls,
    Xlsx,
    Pptx,
    Rtf,
    Txt,
    Html,
    Jpg,
    Jpeg,
    Png,
}

/// Formats accepted as conversion input.
pub const SUPPORTED_INPUT_FORMATS: &[Format] = &[
    Format::Pdf,
    Format::Docx,
    Format::Xlsx,
    Format::Pptx,
    Format::Rtf,
    Format::Txt,
    Format::Html,
    Format::Jpg,
    Format::Jpeg,
    Format::Png,
];

/// Formats that can be requested as conversion output.
pub const SUPPORTED_OUTPUT_FORMATS: &[Format] = &[
    Format::Pdf,
    Format::Docx,
    Format::Xls,
    Format::Xlsx,
    Format::Pptx,
    Format::Rtf,
    Format::Txt,
    Format::Html,
    Format::Jpg,
    Format::Jpeg,
    Format::Png,
];

/// Broad category used by the chain decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    /// Fixed-layout paginated document (PDF).
    Paginated,
    /// Word-processor document.
    Word,
    /// Spreadsheet.
    Spreadsheet,
    /// Slide deck.
    Presentation,
    /// Plain text.
    Text,
    /// HTML markup.
    Markup,
    /// Raster image.
    Image,
}

impl Format {
    /// Canonical lowercase extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Xls => "xls",
            Format::Xlsx => "xlsx",
            Format::Pptx => "pptx",
            Format::Rtf => "rtf",
            Format::Txt => "txt",
            Format::Html => "html",
            Format::Jpg => "jpg",
            Format::Jpeg => "jpeg",
            Format::Png => "png",
        }
    }

    /// Every extension an engine may legitimately write for this format.
    ///
    /// Rasterisers disagree on `jpg` vs `jpeg`, so the two alias each other.
    pub fn artifact_extensions(self) -> &'static [&'static str] {
        match self {
            Format::Jpg => &["jpg", "jpeg"],
            Format::Jpeg => &["jpeg", "jpg"],
            Format::Html => &["html", "htm"],
            Format::Pdf => &["pdf"],
            Format::Docx => &["docx"],
            Format::Xls => &["xls"],
            Format::Xlsx => &["xlsx"],
            Format::Pptx => &["pptx"],
            Format::Rtf => &["rtf"],
            Format::Txt => &["txt"],
            Format::Png => &["png"],
        }
    }

    pub fn family(self) -> FormatFamily {
        match self {
            Format::Pdf => FormatFamily::Paginated,
            Format::Docx | Format::Rtf => FormatFamily::Word,
            Format::Xls | Format::Xlsx => FormatFamily::Spreadsheet,
            Format::Pptx => FormatFamily::Presentation,
            Format::Txt => FormatFamily::Text,
            Format::Html => FormatFamily::Markup,
            Format::Jpg | Format::Jpeg | Format::Png => FormatFamily::Image,
        }
    }

    pub fn is_image(self) -> bool {
        self.family() == FormatFamily::Image
    }

    pub fn is_jpeg(self) -> bool {
        matches!(self, Format::Jpg | Format::Jpeg)
    }

    /// Word, spreadsheet or presentation formats produced by an office suite.
    pub fn is_office(self) -> bool {
        matches!(
            self.family(),
            FormatFamily::Word | FormatFamily::Spreadsheet | FormatFamily::Presentation
        )
    }

    pub fn is_supported_input(self) -> bool {
        SUPPORTED_INPUT_FORMATS.contains(&self)
    }

    pub fn is_supported_output(self) -> bool {
        SUPPORTED_OUTPUT_FORMATS.contains(&self)
    }

    /// Office-engine export filter that pins the exact output subtype.
    ///
    /// `source` matters only for PDF export, where each office application
    /// has its own exporter.
    pub fn export_filter(self, source: Format) -> Option<&'static str> {
        match self {
            Format::Docx => Some("MS Word 2007 XML"),
            Format::Xlsx => Some("Calc MS Excel 2007 XML"),
            Format::Xls => Some("MS Excel 97"),
            Format::Pptx => Some("Impress MS PowerPoint 2007 XML"),
            Format::Pdf => match source.family() {
                FormatFamily::Spreadsheet => Some("calc_pdf_Export"),
                FormatFamily::Presentation => Some("impress_pdf_Export"),
                FormatFamily::Word | FormatFamily::Text | FormatFamily::Markup => {
                    Some("writer_pdf_Export")
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Office-engine import filter for opening a PDF as an editable document
    /// of this format's family.
    pub fn pdf_import_filter(self) -> Option<&'static str> {
        match self.family() {
            FormatFamily::Word => Some("writer_pdf_import"),
            FormatFamily::Presentation => Some("impress_pdf_import"),
            _ => None,
        }
    }

    /// Resolve a format from a file name's extension.
    pub fn from_filename(name: &str) -> Option<Format> {
        let (_, ext) = name.rsplit_once('.')?;
        ext.parse().ok()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match s.as_str() {
            "pdf" => Format::Pdf,
            "docx" => Format::Docx,
            "xls" => Format::Xls,
            "xlsx" => Format::Xlsx,
            "pptx" => Format::Pptx,
            "rtf" => Format::Rtf,
            "txt" => Format::Txt,
            "html" => Format::Html,
            "jpg" => Format::Jpg,
            "jpeg" => Format::Jpeg,
            "png" => Format::Png,
            _ => return Err(s),
        };
        Ok(format)
    }
}

/// A 1-indexed, inclusive page range. `end == None` means "to the last page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl PageRange {
    /// Reject ranges no engine can honour: page 0, or an end before the start.
    pub fn validate(&self) -> Result<(), String> {
        if self.start == 0 {
            return Err("pages are 1-indexed, minimum is 1".into());
        }
        match self.end {
            Some(0) => Err("pages are 1-indexed, minimum is 1".into()),
            Some(e) if e < self.start => Err(format!(
                "invalid page range '{}-{e}': start must be <= end",
                self.start
            )),
            _ => Ok(()),
        }
    }

    /// First page of the range; rasterisers emit a single image from it.
    pub fn first_page(&self) -> usize {
        self.start
    }

    /// Expand into 0-indexed page numbers for a document of `total` pages.
    pub fn to_indices(&self, total: usize) -> Vec<usize> {
        let end = self.end.unwrap_or(total).min(total);
        if self.start == 0 || self.start > end {
            return Vec::new();
        }
        (self.start - 1..end).collect()
    }
}

impl FromStr for PageRange {
    type Err = String;

    /// Accepts `"3"`, `"2-5"` and `"4-"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |p: &str| -> Result<usize, String> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| format!("invalid page number '{}'", p.trim()))?;
            if n == 0 {
                return Err("pages are 1-indexed, minimum is 1".into());
            }
            Ok(n)
        };

        match s.split_once('-') {
            None => {
                let page = parse(s)?;
                Ok(PageRange {
                    start: page,
                    end: Some(page),
                })
            }
            Some((start, end)) => {
                let start = parse(start)?;
                let end = if end.trim().is_empty() {
                    None
                } else {
                    Some(parse(end)?)
                };
                let range = PageRange { start, end };
                range.validate()?;
                Ok(range)
            }
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(e) if e == self.start => write!(f, "{}", self.start),
            Some(e) => write!(f, "{}-{}", self.start, e),
            None => write!(f, "{}-", self.start),
        }
    }
}
