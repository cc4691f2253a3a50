use std::io::{Cursor, Write};

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{load_flag, OutputFormat, Renderer, WriteSeek};
use crate::card::{Align, Block, Card, Cell, Content, RowHeight, Tone, ROWS};
use crate::style::StyleConfig;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const BULLET: &str = "\u{2022}\t";

/// Points → twentieths of a point.
fn twips(pt: f32) -> i64 {
    (pt * 20.0).round() as i64
}

/// Points → English Metric Units.
fn emu(pt: f32) -> i64 {
    (pt * 12700.0).round() as i64
}

/// Native Word tables, one per page, written as raw WordprocessingML.
#[derive(Default)]
pub struct DocxRenderer {
    style: StyleConfig,
}

impl DocxRenderer {
    pub fn new(style: StyleConfig) -> Self {
        Self { style }
    }
}

/// A flag embedded in the package.
struct Media {
    rel_id: String,
    part: String,
    png: Vec<u8>,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

impl Renderer for DocxRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn render(&self, cards: &[Card], out: &mut dyn WriteSeek) -> Result<()> {
        let mut media = Vec::new();
        let document = self.document_xml(cards, &mut media)?;

        let mut zip = ZipWriter::new(out);
        let options = SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES.as_bytes())?;
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(PACKAGE_RELS.as_bytes())?;
        zip.start_file("docProps/core.xml", options)?;
        zip.write_all(core_properties().as_bytes())?;
        zip.start_file("word/document.xml", options)?;
        zip.write_all(&document)?;
        zip.start_file("word/_rels/document.xml.rels", options)?;
        zip.write_all(&document_rels(&media)?)?;
        for m in &media {
            zip.start_file(format!("word/{}", m.part), options)?;
            zip.write_all(&m.png)?;
        }
        zip.finish()?;
        Ok(())
    }
}

impl DocxRenderer {
    fn document_xml(&self, cards: &[Card], media: &mut Vec<Media>) -> Result<Vec<u8>> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        w.write_event(Event::Start(
            BytesStart::new("w:document").with_attributes([
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
            ]),
        ))?;
        start(&mut w, "w:body")?;

        for (i, card) in cards.iter().enumerate() {
            self.write_table(&mut w, card, media)?;
            if i + 1 < cards.len() {
                start(&mut w, "w:p")?;
                start(&mut w, "w:r")?;
                empty(&mut w, "w:br", &[("w:type", "page")])?;
                end(&mut w, "w:r")?;
                end(&mut w, "w:p")?;
            }
        }
        // Word wants a paragraph after a trailing table
        empty(&mut w, "w:p", &[])?;
        self.write_section(&mut w)?;

        end(&mut w, "w:body")?;
        end(&mut w, "w:document")?;
        Ok(w.into_inner().into_inner())
    }

    fn write_section(&self, w: &mut XmlWriter) -> Result<()> {
        let s = &self.style;
        let margin = twips(s.page_margin).to_string();
        start(w, "w:sectPr")?;
        empty(
            w,
            "w:pgSz",
            &[
                ("w:w", &twips(s.page_width).to_string()),
                ("w:h", &twips(s.page_height).to_string()),
            ],
        )?;
        empty(
            w,
            "w:pgMar",
            &[
                ("w:top", &margin),
                ("w:right", &margin),
                ("w:bottom", &margin),
                ("w:left", &margin),
                ("w:header", "0"),
                ("w:footer", "0"),
                ("w:gutter", "0"),
            ],
        )?;
        end(w, "w:sectPr")
    }

    fn write_table(&self, w: &mut XmlWriter, card: &Card, media: &mut Vec<Media>) -> Result<()> {
        let s = &self.style;
        let border_color = s.border_solid().hex();
        let border_size = ((s.border_width * 8.0).round() as i64).max(2).to_string();

        start(w, "w:tbl")?;
        start(w, "w:tblPr")?;
        empty(
            w,
            "w:tblW",
            &[("w:w", &twips(s.table_width()).to_string()), ("w:type", "dxa")],
        )?;
        start(w, "w:tblBorders")?;
        for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            empty(
                w,
                side,
                &[
                    ("w:val", "single"),
                    ("w:sz", &border_size),
                    ("w:space", "0"),
                    ("w:color", &border_color),
                ],
            )?;
        }
        end(w, "w:tblBorders")?;
        // CT_TblPr is a sequence: tblLayout comes after tblBorders
        empty(w, "w:tblLayout", &[("w:type", "fixed")])?;
        end(w, "w:tblPr")?;

        start(w, "w:tblGrid")?;
        for width in card.column_widths {
            empty(w, "w:gridCol", &[("w:w", &twips(width).to_string())])?;
        }
        end(w, "w:tblGrid")?;

        for row in 0..ROWS {
            start(w, "w:tr")?;
            if let RowHeight::AtLeast(h) = card.row_heights[row] {
                start(w, "w:trPr")?;
                empty(
                    w,
                    "w:trHeight",
                    &[("w:val", &twips(h).to_string()), ("w:hRule", "atLeast")],
                )?;
                end(w, "w:trPr")?;
            }
            for cell in card.row(row) {
                self.write_cell(w, card, cell, media)?;
            }
            end(w, "w:tr")?;
        }
        end(w, "w:tbl")
    }

    fn write_cell(
        &self,
        w: &mut XmlWriter,
        card: &Card,
        cell: &Cell,
        media: &mut Vec<Media>,
    ) -> Result<()> {
        let s = &self.style;
        let fill = match cell.tone {
            Tone::Accent => s.accent,
            Tone::Tint => s.tint(),
        };

        start(w, "w:tc")?;
        start(w, "w:tcPr")?;
        let width = card.span_width(cell.col, cell.col_span);
        empty(w, "w:tcW", &[("w:w", &twips(width).to_string()), ("w:type", "dxa")])?;
        if cell.col_span > 1 {
            empty(w, "w:gridSpan", &[("w:val", &cell.col_span.to_string())])?;
        }
        empty(
            w,
            "w:shd",
            &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", &fill.hex())],
        )?;
        empty(w, "w:vAlign", &[("w:val", "center")])?;
        end(w, "w:tcPr")?;

        match &cell.content {
            Content::Image { flag, fallback } => match load_flag(flag) {
                Some(image) => {
                    let mut png = Vec::new();
                    match image.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png) {
                        Ok(()) => {
                            let n = media.len() + 1;
                            let m = Media {
                                rel_id: format!("rIdFlag{}", n),
                                part: format!("media/flag{}.png", n),
                                png,
                            };
                            self.write_picture(w, &m, n, flag.width, flag.height)?;
                            media.push(m);
                        }
                        Err(e) => {
                            tracing::warn!("Error re-encoding flag {}: {}", flag.path.display(), e);
                            self.write_blocks(w, cell, &[Block::Text(fallback.clone())])?;
                        }
                    }
                }
                None => self.write_blocks(w, cell, &[Block::Text(fallback.clone())])?,
            },
            Content::Blocks(blocks) => self.write_blocks(w, cell, blocks)?,
        }

        end(w, "w:tc")
    }

    /// Paragraphs for a text cell. The first paragraph always carries content.
    fn write_blocks(&self, w: &mut XmlWriter, cell: &Cell, blocks: &[Block]) -> Result<()> {
        let centred = cell.align == Align::Center;
        let bold = cell.is_bold();
        let mut wrote_any = false;

        for block in blocks {
            match block {
                Block::Text(text) => {
                    self.paragraph(w, cell, centred, None, |w, s| run(w, s, text, bold))?;
                }
                Block::Spacer => {
                    if wrote_any {
                        self.paragraph(w, cell, false, None, |_, _| Ok(()))?;
                    }
                }
                Block::SubLabel(text) => {
                    self.paragraph(w, cell, false, None, |w, s| run(w, s, text, true))?;
                }
                Block::Bullets(items) => {
                    for item in items {
                        self.paragraph(w, cell, false, Some(360), |w, s| {
                            run(w, s, &format!("{}{}", BULLET, item), false)
                        })?;
                    }
                }
            }
            wrote_any = true;
        }
        if !wrote_any {
            // A table cell must hold at least one paragraph
            empty(w, "w:p", &[])?;
        }
        Ok(())
    }

    fn paragraph<F>(
        &self,
        w: &mut XmlWriter,
        cell: &Cell,
        centred: bool,
        hanging: Option<i64>,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut XmlWriter, &StyleConfig) -> Result<()>,
    {
        start(w, "w:p")?;
        start(w, "w:pPr")?;
        empty(
            w,
            "w:spacing",
            &[
                ("w:before", "0"),
                ("w:after", "0"),
                ("w:line", &twips(cell.leading).to_string()),
                ("w:lineRule", "atLeast"),
            ],
        )?;
        if let Some(indent) = hanging {
            let indent = indent.to_string();
            empty(w, "w:ind", &[("w:left", &indent), ("w:hanging", &indent)])?;
        }
        if centred {
            empty(w, "w:jc", &[("w:val", "center")])?;
        }
        end(w, "w:pPr")?;
        body(w, &self.style)?;
        end(w, "w:p")
    }

    fn write_picture(&self, w: &mut XmlWriter, m: &Media, id: usize, width: f32, height: f32) -> Result<()> {
        let (cx, cy) = (emu(width), emu(height));
        start(w, "w:p")?;
        start(w, "w:pPr")?;
        empty(w, "w:jc", &[("w:val", "center")])?;
        end(w, "w:pPr")?;
        start(w, "w:r")?;
        let drawing = format!(
            concat!(
                r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Flag {id}"/>"#,
                r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
                r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="flag{id}.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
            ),
            cx = cx,
            cy = cy,
            id = id,
            rel = m.rel_id,
        );
        w.write_event(Event::Text(BytesText::from_escaped(drawing)))?;
        end(w, "w:r")?;
        end(w, "w:p")
    }
}

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    w.write_event(Event::Empty(
        BytesStart::new(name).with_attributes(attrs.iter().copied()),
    ))?;
    Ok(())
}

/// One run; `'\n'` becomes a line break inside the paragraph.
fn run(w: &mut XmlWriter, style: &StyleConfig, text: &str, bold: bool) -> Result<()> {
    start(w, "w:r")?;
    start(w, "w:rPr")?;
    empty(
        w,
        "w:rFonts",
        &[("w:ascii", &style.font_family), ("w:hAnsi", &style.font_family)],
    )?;
    if bold {
        empty(w, "w:b", &[])?;
    }
    let half_points = ((style.font_size * 2.0).round() as i64).to_string();
    empty(w, "w:sz", &[("w:val", &half_points)])?;
    end(w, "w:rPr")?;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            empty(w, "w:br", &[])?;
        }
        w.write_event(Event::Start(
            BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
        ))?;
        w.write_event(Event::Text(BytesText::new(line)))?;
        end(w, "w:t")?;
    }
    end(w, "w:r")
}

fn document_rels(media: &[Media]) -> Result<Vec<u8>> {
    let mut w = Writer::new(Cursor::new(Vec::new()));
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    w.write_event(Event::Start(
        BytesStart::new("Relationships").with_attributes([("xmlns", NS_REL)]),
    ))?;
    for m in media {
        empty(
            &mut w,
            "Relationship",
            &[("Id", &m.rel_id), ("Type", REL_IMAGE), ("Target", &m.part)],
        )?;
    }
    end(&mut w, "Relationships")?;
    Ok(w.into_inner().into_inner())
}

fn core_properties() -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:title>Regulatory report</dc:title><dc:creator>report_cards</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>"#,
            r#"</cp:coreProperties>"#
        ),
        now = now
    )
}
