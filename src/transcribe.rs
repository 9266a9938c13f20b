//! Word document (`.docx`) to worksheet transcription.
//!
//! The body of `word/document.xml` is walked in document order. Top-level
//! paragraphs become [`Block::Paragraph`]; top-level tables become
//! [`Block::Table`] with one string per grid column. Text inside text boxes
//! and nested tables is not transcribed.
//!
//! [`write_workbook`] lays the blocks out on a single `WordToExcel` sheet:
//! each non-blank paragraph takes one row in column A, and each table row
//! takes one row starting at column A.

use std::{
    collections::HashMap,
    fs::File,
    io::{Read, Seek},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use rust_xlsxwriter::{Format, FormatAlign, Workbook};

use crate::output::write_atomic;

pub const WORKSHEET_NAME: &str = "WordToExcel";

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const STYLE_CHAIN_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paragraph {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn paragraph_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| matches!(block, Block::Paragraph(_)))
            .count()
    }

    pub fn table_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| matches!(block, Block::Table(_)))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptionSummary {
    pub paragraphs: usize,
    pub tables: usize,
    pub rows_written: usize,
}

/// Converts `word_path` into a single-sheet workbook at `excel_path`,
/// creating the output directory when needed.
pub fn export_document_to_workbook(
    word_path: &Path,
    excel_path: &Path,
) -> Result<TranscriptionSummary> {
    let document = read_document(word_path)?;
    let rows_written = write_workbook(&document, excel_path)?;
    let summary = TranscriptionSummary {
        paragraphs: document.paragraph_count(),
        tables: document.table_count(),
        rows_written,
    };
    info!(
        "Transcribed {} paragraph(s) and {} table(s) from {:?} into {} row(s) of {:?}",
        summary.paragraphs, summary.tables, word_path, summary.rows_written, excel_path
    );
    Ok(summary)
}

pub fn read_document(path: &Path) -> Result<Document> {
    let file = File::open(path).with_context(|| format!("Opening document {path:?}"))?;
    read_document_from(file).with_context(|| format!("Reading document {path:?}"))
}

pub fn read_document_from<R: Read + Seek>(reader: R) -> Result<Document> {
    let mut archive = zip::ZipArchive::new(reader).context("Opening docx archive")?;
    let styles = match read_part(&mut archive, STYLES_PART)? {
        Some(xml) => parse_styles(&xml)?,
        None => StyleSheet::default(),
    };
    let body = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| anyhow!("Archive has no {DOCUMENT_PART} part"))?;
    parse_document(&body, &styles)
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("Locating {name}")),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .with_context(|| format!("Reading {name}"))?;
    Ok(Some(xml))
}

/// Bold/italic flags declared by paragraph styles, with `basedOn` links.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    styles: HashMap<String, StyleEntry>,
    default_paragraph: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct StyleEntry {
    based_on: Option<String>,
    bold: Option<bool>,
    italic: Option<bool>,
}

impl StyleSheet {
    /// Effective `(bold, italic)` for a paragraph style, or for the default
    /// paragraph style when `style_id` is `None`.
    pub fn resolve(&self, style_id: Option<&str>) -> (bool, bool) {
        let mut bold = None;
        let mut italic = None;
        let mut current = style_id.or(self.default_paragraph.as_deref());
        for _ in 0..STYLE_CHAIN_LIMIT {
            let Some(entry) = current.and_then(|id| self.styles.get(id)) else {
                break;
            };
            bold = bold.or(entry.bold);
            italic = italic.or(entry.italic);
            current = entry.based_on.as_deref();
        }
        (bold.unwrap_or(false), italic.unwrap_or(false))
    }
}

pub fn parse_styles(xml: &str) -> Result<StyleSheet> {
    let mut reader = Reader::from_str(xml);
    let mut sheet = StyleSheet::default();
    let mut current: Option<(String, StyleEntry)> = None;
    let mut in_run_props = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"rPr" {
                    in_run_props = true;
                }
                apply_style_element(e, &mut sheet, &mut current, in_run_props);
            }
            Ok(Event::Empty(ref e)) => {
                apply_style_element(e, &mut sheet, &mut current, in_run_props);
                if e.local_name().as_ref() == b"style" {
                    if let Some((id, entry)) = current.take() {
                        sheet.styles.insert(id, entry);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"rPr" => in_run_props = false,
                b"style" => {
                    if let Some((id, entry)) = current.take() {
                        sheet.styles.insert(id, entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(anyhow!(
                    "Style XML parsing error at position {}: {err}",
                    reader.error_position()
                ));
            }
            _ => {}
        }
    }
    debug!("Loaded {} paragraph style(s)", sheet.styles.len());
    Ok(sheet)
}

fn apply_style_element(
    e: &BytesStart<'_>,
    sheet: &mut StyleSheet,
    current: &mut Option<(String, StyleEntry)>,
    in_run_props: bool,
) {
    match e.local_name().as_ref() {
        b"style" => {
            let is_paragraph = attribute(e, b"type").as_deref() == Some("paragraph");
            *current = match (is_paragraph, attribute(e, b"styleId")) {
                (true, Some(id)) => {
                    if attribute(e, b"default").is_some_and(|value| is_truthy(&value)) {
                        sheet.default_paragraph = Some(id.clone());
                    }
                    Some((id, StyleEntry::default()))
                }
                _ => None,
            };
        }
        b"basedOn" => {
            if let Some((_, entry)) = current.as_mut() {
                entry.based_on = attribute(e, b"val");
            }
        }
        b"b" if in_run_props => {
            if let Some((_, entry)) = current.as_mut() {
                entry.bold = Some(toggle_value(e));
            }
        }
        b"i" if in_run_props => {
            if let Some((_, entry)) = current.as_mut() {
                entry.italic = Some(toggle_value(e));
            }
        }
        _ => {}
    }
}

pub fn parse_document(xml: &str, styles: &StyleSheet) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let mut walker = BodyWalker::new(styles);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => walker.open(e),
            Ok(Event::Empty(ref e)) => {
                walker.open(e);
                walker.close(e.local_name().as_ref());
            }
            Ok(Event::End(ref e)) => walker.close(e.local_name().as_ref()),
            Ok(Event::Text(ref e)) => {
                if walker.capturing_text() {
                    let text = e.unescape().map_err(|err| {
                        anyhow!(
                            "Document XML text error at position {}: {err}",
                            reader.buffer_position()
                        )
                    })?;
                    walker.push_text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(anyhow!(
                    "Document XML parsing error at position {}: {err}",
                    reader.error_position()
                ));
            }
            _ => {}
        }
    }
    Ok(walker.finish())
}

#[derive(Debug, Default)]
struct ParagraphState {
    text: String,
    style: Option<String>,
    text_runs: usize,
    bold_runs: usize,
    italic_runs: usize,
}

#[derive(Debug, Default)]
struct RunState {
    bold: bool,
    italic: bool,
    text_len: usize,
}

#[derive(Debug, Default)]
struct CellState {
    paragraphs: Vec<String>,
    span: usize,
    continues_vertical_merge: bool,
}

struct BodyWalker<'a> {
    styles: &'a StyleSheet,
    blocks: Vec<Block>,
    paragraph_depth: usize,
    table_depth: usize,
    paragraph: Option<ParagraphState>,
    run: Option<RunState>,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Option<CellState>,
}

impl<'a> BodyWalker<'a> {
    fn new(styles: &'a StyleSheet) -> Self {
        Self {
            styles,
            blocks: Vec::new(),
            paragraph_depth: 0,
            table_depth: 0,
            paragraph: None,
            run: None,
            in_paragraph_props: false,
            in_run_props: false,
            in_text: false,
            rows: Vec::new(),
            row: Vec::new(),
            cell: None,
        }
    }

    fn in_outer_paragraph(&self) -> bool {
        self.paragraph_depth == 1 && self.paragraph.is_some()
    }

    /// Inside a top-level run but outside its properties.
    fn in_run_body(&self) -> bool {
        self.run.is_some() && self.in_outer_paragraph() && !self.in_run_props
    }

    fn capturing_text(&self) -> bool {
        self.in_text && self.in_outer_paragraph() && self.run.is_some()
    }

    fn push_text(&mut self, text: &str) {
        if let (Some(paragraph), Some(run)) = (self.paragraph.as_mut(), self.run.as_mut()) {
            paragraph.text.push_str(text);
            run.text_len += text.len();
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"p" => {
                self.paragraph_depth += 1;
                if self.paragraph_depth == 1 && self.table_depth <= 1 {
                    self.paragraph = Some(ParagraphState::default());
                }
            }
            b"pPr" if self.in_outer_paragraph() && self.run.is_none() => {
                self.in_paragraph_props = true;
            }
            b"pStyle" if self.in_paragraph_props => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.style = attribute(e, b"val");
                }
            }
            b"r" if self.in_outer_paragraph() => self.run = Some(RunState::default()),
            b"rPr" if self.run.is_some() && self.in_outer_paragraph() => self.in_run_props = true,
            b"b" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.bold = toggle_value(e);
                }
            }
            b"i" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.italic = toggle_value(e);
                }
            }
            b"t" if self.run.is_some() && self.in_outer_paragraph() => self.in_text = true,
            b"tab" if self.in_run_body() => self.push_text("\t"),
            b"br" | b"cr" if self.in_run_body() => self.push_text("\n"),
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.row.clear(),
            b"tc" if self.table_depth == 1 => {
                self.cell = Some(CellState {
                    span: 1,
                    ..CellState::default()
                });
            }
            b"gridSpan" if self.table_depth == 1 => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.span = attribute(e, b"val")
                        .and_then(|value| value.parse::<usize>().ok())
                        .filter(|span| *span > 0)
                        .unwrap_or(1);
                }
            }
            b"vMerge" if self.table_depth == 1 => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.continues_vertical_merge =
                        attribute(e, b"val").is_none_or(|value| value == "continue");
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"pPr" => self.in_paragraph_props = false,
            b"r" if self.paragraph_depth == 1 => {
                if let (Some(paragraph), Some(run)) = (self.paragraph.as_mut(), self.run.take()) {
                    if run.text_len > 0 {
                        paragraph.text_runs += 1;
                        paragraph.bold_runs += usize::from(run.bold);
                        paragraph.italic_runs += usize::from(run.italic);
                    }
                }
            }
            b"p" => {
                if self.paragraph_depth == 1 {
                    self.finish_paragraph();
                }
                self.paragraph_depth = self.paragraph_depth.saturating_sub(1);
            }
            b"tc" if self.table_depth == 1 => self.finish_cell(),
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            b"tbl" => {
                if self.table_depth == 1 {
                    let rows = std::mem::take(&mut self.rows);
                    self.blocks.push(Block::Table(rows));
                }
                self.table_depth = self.table_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(state) = self.paragraph.take() else {
            return;
        };
        self.run = None;
        match self.table_depth {
            0 => {
                let (style_bold, style_italic) = self.styles.resolve(state.style.as_deref());
                let all_runs = |count: usize| state.text_runs > 0 && count == state.text_runs;
                self.blocks.push(Block::Paragraph(Paragraph {
                    bold: style_bold || all_runs(state.bold_runs),
                    italic: style_italic || all_runs(state.italic_runs),
                    text: state.text,
                }));
            }
            1 => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.paragraphs.push(state.text);
                }
            }
            _ => {}
        }
    }

    fn finish_cell(&mut self) {
        let Some(cell) = self.cell.take() else {
            return;
        };
        let column = self.row.len();
        let text = if cell.continues_vertical_merge {
            self.rows
                .last()
                .and_then(|previous| previous.get(column))
                .cloned()
                .unwrap_or_default()
        } else {
            cell.paragraphs.join("\n")
        };
        for _ in 0..cell.span {
            self.row.push(text.clone());
        }
    }

    fn finish(self) -> Document {
        Document {
            blocks: self.blocks,
        }
    }
}

/// Writes the transcription sheet and returns the number of rows used.
pub fn write_workbook(document: &Document, path: &Path) -> Result<usize> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(WORKSHEET_NAME)
        .context("Naming transcription worksheet")?;
    let cell_format = Format::new().set_align(FormatAlign::Left).set_text_wrap();

    let mut row: u32 = 0;
    for block in &document.blocks {
        match block {
            Block::Paragraph(paragraph) => {
                if paragraph.text.trim().is_empty() {
                    continue;
                }
                worksheet
                    .write_string_with_format(row, 0, &paragraph.text, &paragraph_format(paragraph))
                    .with_context(|| format!("Writing paragraph at row {}", row + 1))?;
                row += 1;
            }
            Block::Table(rows) => {
                for cells in rows {
                    for (idx, text) in cells.iter().enumerate() {
                        let column = u16::try_from(idx)
                            .with_context(|| format!("Table row {} is too wide", row + 1))?;
                        worksheet
                            .write_string_with_format(row, column, text, &cell_format)
                            .with_context(|| {
                                format!("Writing table cell at row {}, column {}", row + 1, idx + 1)
                            })?;
                    }
                    row += 1;
                }
            }
        }
    }

    let buffer = workbook
        .save_to_buffer()
        .context("Serializing transcription workbook")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    write_atomic(path, &buffer).with_context(|| format!("Writing workbook {path:?}"))?;
    Ok(row as usize)
}

fn paragraph_format(paragraph: &Paragraph) -> Format {
    let mut format = Format::new()
        .set_font_name("Calibri")
        .set_font_size(11)
        .set_align(FormatAlign::Left)
        .set_text_wrap();
    if paragraph.bold {
        format = format.set_bold();
    }
    if paragraph.italic {
        format = format.set_italic();
    }
    format
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// `<w:b/>` and `<w:b w:val="true"/>` switch a property on; `0`, `false`
/// and `off` switch it off.
fn toggle_value(e: &BytesStart<'_>) -> bool {
    attribute(e, b"val").is_none_or(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    !matches!(value, "0" | "false" | "off")
}
