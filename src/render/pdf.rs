use anyhow::Result;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info};

use super::metrics::{text_width, wrap};
use super::{load_flag, OutputFormat, Renderer, WriteSeek};
use crate::card::{Align, Block, Card, Cell, Content as CellContent, RowHeight, Tone, ROWS};
use crate::style::{Rgb, StyleConfig, FONT_FAMILY};

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
const BORDER_STATE: &str = "GS1";
const BULLET: &str = "\u{2022}";
const BULLET_INDENT: f32 = 12.0;

/// Fixed-layout PDF: one table per A4 page, drawn directly with lopdf.
#[derive(Default)]
pub struct PdfRenderer {
    style: StyleConfig,
}

impl PdfRenderer {
    pub fn new(style: StyleConfig) -> Self {
        Self { style }
    }
}

struct Fonts {
    regular: ObjectId,
    bold: ObjectId,
    border_state: ObjectId,
}

/// One laid-out line inside a cell.
struct Line {
    text: String,
    bold: bool,
    indent: f32,
    bullet: bool,
}

enum Piece {
    Line(Line),
    Gap(f32),
}

impl Piece {
    fn height(&self, leading: f32) -> f32 {
        match self {
            Piece::Line(_) => leading,
            Piece::Gap(h) => *h,
        }
    }
}

enum Body {
    Lines { pieces: Vec<Piece>, leading: f32 },
    Image { image: DynamicImage, width: f32, height: f32 },
}

impl Body {
    fn height(&self) -> f32 {
        match self {
            Body::Lines { pieces, leading } => pieces.iter().map(|p| p.height(*leading)).sum(),
            Body::Image { height, .. } => *height,
        }
    }

    /// Cut after the lines that fit in `limit` points; the rest goes to the
    /// next page. With `force`, at least one line stays so the split always
    /// makes progress. Images are never split.
    fn split(self, limit: f32, force: bool) -> (Body, Body) {
        match self {
            Body::Lines { mut pieces, leading } => {
                let mut used = 0.0;
                let mut at = 0;
                for piece in &pieces {
                    let h = piece.height(leading);
                    if used + h > limit {
                        break;
                    }
                    used += h;
                    at += 1;
                }
                if at == 0 && force {
                    at = pieces.len().min(1);
                }
                let rest = pieces.split_off(at);
                (
                    Body::Lines { pieces, leading },
                    Body::Lines { pieces: rest, leading },
                )
            }
            image => (image, Body::Lines { pieces: Vec::new(), leading: 0.0 }),
        }
    }
}

type Measured<'a> = (&'a Cell, Body);

/// Positioned cell ready to draw.
struct Placed<'a> {
    cell: &'a Cell,
    body: Body,
    x: f32,
    bottom: f32,
    width: f32,
    height: f32,
}

impl Renderer for PdfRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn render(&self, cards: &[Card], out: &mut dyn WriteSeek) -> Result<()> {
        let style = &self.style;
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let fonts = Fonts {
            regular: doc.add_object(base_font(FONT_FAMILY)),
            bold: doc.add_object(base_font(&format!("{}-Bold", FONT_FAMILY))),
            border_state: doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "CA" => style.border_opacity,
            }),
        };

        let mut kids: Vec<Object> = Vec::with_capacity(cards.len().max(1));
        for (i, card) in cards.iter().enumerate() {
            debug!("Drawing card {}/{}", i + 1, cards.len());
            for page in self.draw_card(&mut doc, card, &fonts, pages_id)? {
                kids.push(page.into());
            }
        }
        if kids.is_empty() {
            // A document needs at least one page to open anywhere
            let page = self.add_page(&mut doc, &fonts, pages_id, Vec::new(), Dictionary::new())?;
            kids.push(page.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), style.page_width.into(), style.page_height.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Regulatory report"),
            "Producer" => Object::string_literal(concat!("report_cards ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string()),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buf = Vec::new();
        doc.save_to(&mut buf)?;
        out.write_all(&buf)?;
        Ok(())
    }
}

impl PdfRenderer {
    /// Draw one card; returns its pages (more than one only for oversized cards).
    fn draw_card(
        &self,
        doc: &mut Document,
        card: &Card,
        fonts: &Fonts,
        pages_id: ObjectId,
    ) -> Result<Vec<ObjectId>> {
        let pages = self.place(card);
        if pages.len() > 1 {
            info!("Card continues over {} pages", pages.len());
        }
        pages
            .into_iter()
            .map(|placed| {
                let (ops, xobjects) = self.draw_cells(doc, placed);
                self.add_page(doc, fonts, pages_id, ops, xobjects)
            })
            .collect()
    }

    fn draw_cells(&self, doc: &mut Document, placed: Vec<Placed<'_>>) -> (Vec<Operation>, Dictionary) {
        let style = &self.style;
        let mut ops = Vec::new();
        let mut xobjects = Dictionary::new();

        for p in &placed {
            let fill = match p.cell.tone {
                Tone::Accent => style.accent,
                Tone::Tint => style.tint(),
            };
            ops.push(Operation::new("q", vec![]));
            ops.push(color_op("rg", fill));
            ops.push(rect_op(p.x, p.bottom, p.width, p.height));
            ops.push(Operation::new("f", vec![]));
            ops.push(Operation::new("Q", vec![]));
        }

        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("gs", vec![BORDER_STATE.into()]));
        ops.push(color_op("RG", style.accent));
        ops.push(Operation::new("w", vec![style.border_width.into()]));
        for p in &placed {
            ops.push(rect_op(p.x, p.bottom, p.width, p.height));
        }
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));

        for p in placed {
            let top = p.bottom + (p.height + p.body.height()) / 2.0;
            match p.body {
                Body::Lines { pieces, leading } => {
                    let centred = p.cell.align == Align::Center;
                    self.draw_lines(&mut ops, &pieces, leading, (p.x, p.width), top, centred);
                }
                Body::Image { image, width, height } => {
                    let name = format!("Im{}", xobjects.len() + 1);
                    let id = doc.add_object(image_xobject(&image, style.tint()));
                    xobjects.set(name.as_bytes().to_vec(), id);
                    let x = p.x + (p.width - width) / 2.0;
                    ops.push(Operation::new("q", vec![]));
                    ops.push(Operation::new(
                        "cm",
                        vec![
                            width.into(),
                            0.into(),
                            0.into(),
                            height.into(),
                            x.into(),
                            (top - height).into(),
                        ],
                    ));
                    ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                    ops.push(Operation::new("Q", vec![]));
                }
            }
        }

        (ops, xobjects)
    }

    fn draw_lines(
        &self,
        ops: &mut Vec<Operation>,
        pieces: &[Piece],
        leading: f32,
        (cell_x, cell_width): (f32, f32),
        top: f32,
        centred: bool,
    ) {
        let size = self.style.font_size;
        let mut line_top = top;
        for piece in pieces {
            let line = match piece {
                Piece::Gap(h) => {
                    line_top -= h;
                    continue;
                }
                Piece::Line(line) => line,
            };
            let baseline = line_top - leading / 2.0 - size * 0.35;
            let x = if centred {
                cell_x + (cell_width - text_width(&line.text, size, line.bold)) / 2.0
            } else {
                cell_x + self.style.cell_padding_x + line.indent
            };
            if line.bullet {
                ops.extend(text_ops(FONT_REGULAR, size, x - BULLET_INDENT, baseline, BULLET));
            }
            let font = if line.bold { FONT_BOLD } else { FONT_REGULAR };
            ops.extend(text_ops(font, size, x, baseline, &line.text));
            line_top -= leading;
        }
    }

    fn add_page(
        &self,
        doc: &mut Document,
        fonts: &Fonts,
        pages_id: ObjectId,
        ops: Vec<Operation>,
        xobjects: Dictionary,
    ) -> Result<ObjectId> {
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => fonts.regular,
                FONT_BOLD => fonts.bold,
            },
            "ExtGState" => dictionary! {
                BORDER_STATE => fonts.border_state,
            },
            "XObject" => xobjects,
        });
        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        }))
    }

    /// Lay out every cell and resolve row heights.
    fn measure<'a>(&self, card: &'a Card) -> (Vec<Measured<'a>>, [f32; ROWS]) {
        let style = &self.style;
        let bodies: Vec<Measured<'a>> = card
            .cells
            .iter()
            .map(|cell| {
                let width = card.span_width(cell.col, cell.col_span);
                (cell, self.layout(cell, width - 2.0 * style.cell_padding_x))
            })
            .collect();

        let mut heights = [0.0f32; ROWS];
        for (row, sizing) in card.row_heights.iter().enumerate() {
            let needed = self.needed(bodies.iter().filter(|(c, _)| c.row == row));
            heights[row] = match *sizing {
                RowHeight::AtLeast(h) => h.max(needed),
                RowHeight::Intrinsic => needed,
            };
        }
        (bodies, heights)
    }

    fn needed<'b, 'a: 'b>(&self, cells: impl Iterator<Item = &'b Measured<'a>>) -> f32 {
        cells
            .map(|(_, b)| b.height() + 2.0 * self.style.cell_padding_y)
            .fold(0.0f32, f32::max)
    }

    /// Position the card's rows top to bottom, one list of cells per page.
    ///
    /// A row that does not fit below the previous ones starts a new page. A
    /// row taller than the whole printable area has its text split instead.
    fn place<'a>(&self, card: &'a Card) -> Vec<Vec<Placed<'a>>> {
        let style = &self.style;
        let (bodies, heights) = self.measure(card);
        let mut rows: Vec<Vec<Measured<'a>>> = (0..ROWS).map(|_| Vec::new()).collect();
        for (cell, body) in bodies {
            rows[cell.row].push((cell, body));
        }

        let page_top = style.page_height - style.page_margin;
        let usable = page_top - style.page_margin;
        let mut pages = Vec::new();
        let mut current = Vec::new();
        let mut top = page_top;

        for (row, mut cells) in rows.into_iter().enumerate() {
            let mut height = heights[row];
            loop {
                let room = top - style.page_margin;
                if height <= room + 0.01 {
                    self.put_row(card, &mut current, cells, top, height);
                    top -= height;
                    break;
                }
                let at_page_top = top >= page_top;
                if !at_page_top && (height <= usable || room < style.row_height) {
                    pages.push(std::mem::take(&mut current));
                    top = page_top;
                    continue;
                }

                let limit = room - 2.0 * style.cell_padding_y;
                let (head, rest): (Vec<Measured<'a>>, Vec<Measured<'a>>) = cells
                    .into_iter()
                    .map(|(cell, body)| {
                        let (head, rest) = body.split(limit, at_page_top);
                        ((cell, head), (cell, rest))
                    })
                    .unzip();
                self.put_row(card, &mut current, head, top, room);
                pages.push(std::mem::take(&mut current));
                top = page_top;
                height = self.needed(rest.iter());
                cells = rest;
            }
        }
        pages.push(current);
        pages
    }

    fn put_row<'a>(
        &self,
        card: &'a Card,
        page: &mut Vec<Placed<'a>>,
        cells: Vec<Measured<'a>>,
        top: f32,
        height: f32,
    ) {
        for (cell, body) in cells {
            page.push(Placed {
                cell,
                body,
                x: self.style.page_margin + card.column_offset(cell.col),
                bottom: top - height,
                width: card.span_width(cell.col, cell.col_span),
                height,
            });
        }
    }

    fn layout(&self, cell: &Cell, inner_width: f32) -> Body {
        let size = self.style.font_size;
        let blocks = match &cell.content {
            CellContent::Blocks(blocks) => blocks.clone(),
            CellContent::Image { flag, fallback } => match load_flag(flag) {
                Some(image) => {
                    return Body::Image {
                        image,
                        width: flag.width,
                        height: flag.height,
                    }
                }
                None => vec![Block::Text(fallback.clone())],
            },
        };

        let bold = cell.is_bold();
        let mut pieces = Vec::new();
        for block in &blocks {
            match block {
                Block::Text(text) => {
                    for text in wrap(text, size, bold, inner_width) {
                        pieces.push(Piece::Line(Line { text, bold, indent: 0.0, bullet: false }));
                    }
                }
                Block::Spacer => pieces.push(Piece::Gap(cell.leading / 2.0)),
                Block::SubLabel(text) => {
                    for text in wrap(text, size, true, inner_width) {
                        pieces.push(Piece::Line(Line { text, bold: true, indent: 0.0, bullet: false }));
                    }
                }
                Block::Bullets(items) => {
                    for item in items {
                        let lines = wrap(item, size, false, inner_width - BULLET_INDENT);
                        for (i, text) in lines.into_iter().enumerate() {
                            pieces.push(Piece::Line(Line {
                                text,
                                bold: false,
                                indent: BULLET_INDENT,
                                bullet: i == 0,
                            }));
                        }
                    }
                }
            }
        }
        Body::Lines {
            pieces,
            leading: cell.leading,
        }
    }
}

fn base_font(name: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => name,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn color_op(op: &str, color: Rgb) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new(op, vec![r.into(), g.into(), b.into()])
}

fn rect_op(x: f32, y: f32, w: f32, h: f32) -> Operation {
    Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()])
}

fn text_ops(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// RGB image XObject; transparent pixels are composited onto `background`.
fn image_xobject(image: &DynamicImage, background: Rgb) -> Stream {
    let rgba = image.to_rgba8();
    let (w, h) = rgba.dimensions();
    let under = [background.0, background.1, background.2];
    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    for px in rgba.pixels() {
        let alpha = px[3] as u32;
        for c in 0..3 {
            let v = (px[c] as u32 * alpha + under[c] as u32 * (255 - alpha) + 127) / 255;
            rgb.push(v as u8);
        }
    }
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
        },
        rgb,
    )
}

/// Encode for the base-14 fonts' WinAnsi encoding; unmappable chars become '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}
