//! One-profile PDF document
//!
//! A4 page layout: centered title, horizontal rule, a band holding the
//! photo (left, when present) and the QR code (right), then one
//! label/value line per populated field. Long values wrap; fields that do
//! not fit continue on further pages.
//!
//! Text uses the standard Helvetica fonts with WinAnsi encoding, so
//! characters outside Latin-1 are printed as `?`.

use super::code;
use super::RenderError;
use image::DynamicImage;
use karwan_common::db::models::Profile;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use qrcode::QrCode;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;

const TITLE_SIZE: i64 = 18;
/// Font size of label and value lines
pub const BODY_SIZE: i64 = 11;
const LINE_HEIGHT: i64 = 16;
const FIELD_GAP: i64 = 4;

/// Edge of the square photo and code boxes
const BLOCK: i64 = 120;
/// x offset of values from the left margin
const VALUE_OFFSET: i64 = 130;
/// Room for a value line between its x offset and the right margin, in points
pub const VALUE_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN - VALUE_OFFSET;

/// Photos are downscaled to fit this many pixels per side before embedding
const MAX_PHOTO_PIXELS: u32 = 480;

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";
const PHOTO_XOBJECT: &str = "Photo";

/// Populated fields in print order
pub fn field_lines(profile: &Profile) -> Vec<(&'static str, String)> {
    let fields: [(&'static str, Option<String>); 11] = [
        ("Name", Some(profile.full_name.clone())),
        ("Email", Some(profile.email.clone())),
        ("Location", profile.location()),
        ("Primary Phone", profile.primary_phone.clone()),
        ("Secondary Phone", profile.secondary_phone.clone()),
        ("Profession", Some(profile.profession.clone())),
        ("Expertise", Some(profile.expertise.clone())),
        ("How I Can Help", Some(profile.how_to_help.clone())),
        ("Help Needed", profile.help_needed.clone()),
        ("Business URL", profile.business_url.clone()),
        ("Social Media", profile.social_media_reference.clone()),
    ];

    fields
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (label, v))
        })
        .collect()
}

/// Render `profile` with its QR code into PDF bytes
pub fn render(title: &str, profile: &Profile, qr: &QrCode) -> Result<Vec<u8>, RenderError> {
    let photo = match profile.photo.as_deref().filter(|p| !p.is_empty()) {
        Some(bytes) => Some(decode_photo(bytes)?),
        None => None,
    };

    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut ops = Vec::new();

    // Title and rule
    let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;
    let title_x = ((PAGE_WIDTH - text_width(title, TITLE_SIZE)) / 2).max(MARGIN);
    text(&mut ops, BOLD_FONT, TITLE_SIZE, title_x, y, title);

    y -= 14;
    ops.push(Operation::new("w", vec![1.into()]));
    ops.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
    ops.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]));
    ops.push(Operation::new("S", vec![]));

    // Photo and code band
    let band_top = y - 15;
    if let Some(image) = &photo {
        photo_ops(&mut ops, image, MARGIN, band_top);
    }
    code_ops(&mut ops, qr, PAGE_WIDTH - MARGIN - BLOCK, band_top);
    y = band_top - BLOCK - 25;

    // Fields
    for (label, value) in field_lines(profile) {
        let lines = wrap(&value, VALUE_WIDTH * 1000 / BODY_SIZE, glyph_width);
        for (i, line) in lines.iter().enumerate() {
            if y < MARGIN {
                pages.push(std::mem::take(&mut ops));
                y = PAGE_HEIGHT - MARGIN - BODY_SIZE;
            }
            if i == 0 {
                text(&mut ops, BOLD_FONT, BODY_SIZE, MARGIN, y, &format!("{}:", label));
            }
            text(&mut ops, REGULAR_FONT, BODY_SIZE, MARGIN + VALUE_OFFSET, y, line);
            y -= LINE_HEIGHT;
        }
        y -= FIELD_GAP;
    }
    pages.push(ops);

    assemble(title, pages, photo.as_ref())
}

fn assemble(
    title: &str,
    pages: Vec<Vec<Operation>>,
    photo: Option<&DynamicImage>,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = Dictionary::new();
    if let Some(image) = photo {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let photo_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        ));
        xobjects.set(PHOTO_XOBJECT, photo_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
        "XObject" => xobjects,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => pdf_string(title),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn decode_photo(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    let image = image::load_from_memory(bytes).map_err(RenderError::Photo)?;
    if image.width() > MAX_PHOTO_PIXELS || image.height() > MAX_PHOTO_PIXELS {
        Ok(image.thumbnail(MAX_PHOTO_PIXELS, MAX_PHOTO_PIXELS))
    } else {
        Ok(image)
    }
}

/// Draw the photo scaled into the BLOCK box, top-aligned at `top`
fn photo_ops(ops: &mut Vec<Operation>, image: &DynamicImage, x: i64, top: i64) {
    let (w, h) = (image.width().max(1) as i64, image.height().max(1) as i64);
    let (draw_w, draw_h) = if w >= h {
        (BLOCK, (h * BLOCK / w).max(1))
    } else {
        ((w * BLOCK / h).max(1), BLOCK)
    };

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            draw_w.into(),
            0.into(),
            0.into(),
            draw_h.into(),
            x.into(),
            (top - draw_h).into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(PHOTO_XOBJECT.as_bytes().to_vec())]));
    ops.push(Operation::new("Q", vec![]));
}

/// Draw the QR code as filled rectangles inside the BLOCK box at (`x`, `top`)
///
/// Modules are scaled to the box, so large symbols shrink instead of
/// spilling past it.
fn code_ops(ops: &mut Vec<Operation>, qr: &QrCode, x: i64, top: i64) {
    let quiet = code::QUIET_ZONE as f32;
    let total = qr.width() as f32 + 2.0 * quiet;
    let module = BLOCK as f32 / total;
    let origin_x = x as f32 + quiet * module;
    let origin_top = top as f32 - quiet * module;

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("g", vec![0.into()]));
    for (row, col, len) in code::dark_runs(qr) {
        let rx = origin_x + col as f32 * module;
        let ry = origin_top - (row as f32 + 1.0) * module;
        ops.push(Operation::new(
            "re",
            vec![rx.into(), ry.into(), (len as f32 * module).into(), module.into()],
        ));
    }
    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("Q", vec![]));
}

fn text(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, s: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![pdf_string(s)]));
    ops.push(Operation::new("ET", vec![]));
}

/// Latin-1 bytes for a standard-font string; anything else becomes `?`
fn pdf_string(s: &str) -> Object {
    let bytes = s
        .chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(b) if !b.is_ascii_control() => b,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// Helvetica advance width of `c` in 1/1000 em
///
/// Characters outside Latin-1 print as `?` and are measured as such.
pub fn glyph_width(c: char) -> i64 {
    match c {
        ' ' | '!' | ',' | '.' | '/' | ':' | ';' | 'I' | 'f' | 't' | '[' | ']' | '\\' => 278,
        'i' | 'j' | 'l' | '\'' | '|' => 222,
        '-' | '(' | ')' | 'r' | '`' => 333,
        '"' => 355,
        'J' | 'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 500,
        'L' => 556,
        'F' | 'T' | 'Z' => 611,
        'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 667,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' | 'w' => 722,
        'G' | 'O' | 'Q' => 778,
        'M' | 'm' => 833,
        '%' => 889,
        'W' => 944,
        '@' => 1015,
        _ => 556,
    }
}

/// Rendered width of `s` at `size` points, in points
pub fn text_width(s: &str, size: i64) -> i64 {
    s.chars().map(glyph_width).sum::<i64>() * size / 1000
}

/// Word-wrap `text` so no line is wider than `max_width`, measuring each
/// character with `width`
///
/// Words wider than a line are split. Line breaks in the input are kept.
pub fn wrap(text: &str, max_width: i64, width: impl Fn(char) -> i64) -> Vec<String> {
    let max_width = max_width.max(1);
    let space = width(' ');
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let mut rest = word;
            let mut word_width: i64 = rest.chars().map(&width).sum();

            // Hard-split words that cannot fit on any line
            while word_width > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                let mut taken = 0;
                let mut split = rest.len();
                for (i, c) in rest.char_indices() {
                    let w = width(c);
                    if i > 0 && taken + w > max_width {
                        split = i;
                        break;
                    }
                    taken += w;
                }
                lines.push(rest[..split].to_string());
                rest = &rest[split..];
                word_width -= taken;
            }

            if rest.is_empty() {
                continue;
            }
            if !current.is_empty() && current_width + space + word_width > max_width {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_width += space;
            }
            current.push_str(rest);
            current_width += word_width;
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
