//! Integration tests for artifact rendering
//!
//! Covers:
//! - QR code decodes back to the share reference
//! - Identical input renders identical bytes
//! - Document field order, omitted fields and page overflow
//! - Value wrapping by rendered width and QR scaling inside its block
//! - Photo embedding and undecodable photos
//! - Share references too long for a QR code

use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use karwan_common::db::models::Profile;
use karwan_directory::render::{document, share_reference, ArtifactRenderer, RenderError};
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::io::Cursor;
use uuid::Uuid;

const BASE_URL: &str = "https://karwan.streamlit.app";
const TITLE: &str = "Karwan-e-Tijarat Member Profile";

fn profile() -> Profile {
    let at = NaiveDate::from_ymd_opt(2024, 5, 10)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    Profile {
        id: Uuid::parse_str("6f1c2d3e-4a5b-4c6d-8e7f-901234567890").unwrap(),
        full_name: "Aisha Khan".to_string(),
        email: "aisha@example.com".to_string(),
        primary_phone: Some("+92 300 1234567".to_string()),
        secondary_phone: None,
        city: Some("Lahore".to_string()),
        country: Some("Pakistan".to_string()),
        profession: "Textile Trader".to_string(),
        expertise: "Cotton sourcing".to_string(),
        how_to_help: "Supplier introductions".to_string(),
        help_needed: None,
        business_url: Some("https://khan-textiles.example".to_string()),
        social_media_reference: None,
        photo: None,
        created_at: at,
        updated_at: at,
    }
}

fn png_photo() -> Vec<u8> {
    let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Every `Tj` string of every page, in drawing order
fn shown_text(pdf: &[u8]) -> (usize, Vec<String>) {
    let doc = Document::load_mem(pdf).unwrap();
    let pages = doc.get_pages();
    let mut strings = Vec::new();

    for page_id in pages.values() {
        let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
        for op in content.operations {
            if op.operator == "Tj" {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    strings.push(bytes.iter().map(|b| *b as char).collect());
                }
            }
        }
    }

    (pages.len(), strings)
}

#[test]
fn test_code_decodes_to_share_reference() {
    let renderer = ArtifactRenderer::new(TITLE);
    let artifacts = renderer.render(&profile(), BASE_URL).unwrap();

    assert_eq!(
        artifacts.share_reference,
        "https://karwan.streamlit.app?profile_id=6f1c2d3e-4a5b-4c6d-8e7f-901234567890"
    );

    let luma = image::load_from_memory(&artifacts.visual_code).unwrap().to_luma8();
    let (width, height) = luma.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1);

    let (_meta, content) = grids[0].decode().unwrap();
    assert_eq!(content, artifacts.share_reference);
}

#[test]
fn test_rendering_is_deterministic() {
    let renderer = ArtifactRenderer::new(TITLE);
    let mut with_photo = profile();
    with_photo.photo = Some(png_photo());

    let first = renderer.render(&with_photo, BASE_URL).unwrap();
    let second = renderer.render(&with_photo, BASE_URL).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_document_lists_populated_fields_in_order() {
    let renderer = ArtifactRenderer::new(TITLE);
    let pdf = renderer.render_document(&profile(), BASE_URL).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    let (pages, strings) = shown_text(&pdf);
    assert_eq!(pages, 1);
    assert_eq!(strings[0], TITLE);

    let labels: Vec<&str> = strings
        .iter()
        .filter(|s| s.ends_with(':'))
        .map(|s| s.as_str())
        .collect();
    assert_eq!(
        labels,
        vec![
            "Name:",
            "Email:",
            "Location:",
            "Primary Phone:",
            "Profession:",
            "Expertise:",
            "How I Can Help:",
            "Business URL:",
        ]
    );
    assert!(strings.contains(&"Lahore, Pakistan".to_string()));
    assert!(!strings.iter().any(|s| s.starts_with("Secondary Phone")));
    assert!(!strings.iter().any(|s| s.starts_with("Help Needed")));
}

#[test]
fn test_long_values_continue_on_next_page() {
    let renderer = ArtifactRenderer::new(TITLE);
    let mut verbose = profile();
    verbose.how_to_help = "mentoring and supplier introductions ".repeat(120);

    let pdf = renderer.render_document(&verbose, BASE_URL).unwrap();
    let (pages, strings) = shown_text(&pdf);

    assert!(pages >= 2, "expected overflow onto a second page, got {}", pages);
    assert_eq!(strings.iter().filter(|s| *s == "How I Can Help:").count(), 1);
    assert!(strings
        .iter()
        .filter(|s| *s != TITLE)
        .all(|s| document::text_width(s, document::BODY_SIZE) <= document::VALUE_WIDTH));
}

#[test]
fn test_wide_values_wrap_within_right_margin() {
    let renderer = ArtifactRenderer::new(TITLE);
    let mut shouty = profile();
    shouty.expertise = "HALAL FOOD IMPORT AND EXPORT SERVICES ACROSS THE MIDDLE EAST".to_string();

    let pdf = renderer.render_document(&shouty, BASE_URL).unwrap();
    let (_pages, strings) = shown_text(&pdf);

    let start = strings.iter().position(|s| s == "Expertise:").unwrap() + 1;
    let end = strings.iter().position(|s| s == "How I Can Help:").unwrap();
    let value_lines = &strings[start..end];
    assert!(value_lines.len() >= 2, "expected wrapping, got {:?}", value_lines);
    assert_eq!(value_lines.join(" "), shouty.expertise);
    assert!(value_lines
        .iter()
        .all(|s| document::text_width(s, document::BODY_SIZE) <= document::VALUE_WIDTH));
}

#[test]
fn test_large_code_stays_inside_its_block() {
    let renderer = ArtifactRenderer::new(TITLE);
    // Close to the level H capacity, forcing a high symbol version
    let base = format!("https://example.com/{}", "x".repeat(1100));

    let pdf = renderer.render_document(&profile(), &base).unwrap();
    let doc = Document::load_mem(&pdf).unwrap();
    let page_id = *doc.get_pages().values().next().unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();

    let rects: Vec<Vec<f32>> = content
        .operations
        .iter()
        .filter(|op| op.operator == "re")
        .map(|op| op.operands.iter().map(|o| o.as_float().unwrap()).collect())
        .collect();
    assert!(!rects.is_empty());

    // 120pt block flush with the right margin
    let (left, right) = (595.0 - 50.0 - 120.0, 595.0 - 50.0);
    for rect in rects {
        assert!(rect[0] >= left - 0.01, "rect starts left of the block: {:?}", rect);
        assert!(rect[0] + rect[2] <= right + 0.01, "rect spills past the block: {:?}", rect);
    }
}

#[test]
fn test_photo_is_embedded_as_image() {
    let renderer = ArtifactRenderer::new(TITLE);
    let mut with_photo = profile();
    with_photo.photo = Some(png_photo());

    let pdf = renderer.render_document(&with_photo, BASE_URL).unwrap();
    let doc = Document::load_mem(&pdf).unwrap();

    let images = doc
        .objects
        .values()
        .filter(|object| match object {
            Object::Stream(stream) => matches!(
                stream.dict.get(b"Subtype"),
                Ok(Object::Name(name)) if name.as_slice() == b"Image"
            ),
            _ => false,
        })
        .count();
    assert_eq!(images, 1);

    let without = renderer.render_document(&profile(), BASE_URL).unwrap();
    assert!(without.len() < pdf.len());
}

#[test]
fn test_undecodable_photo_fails_render() {
    let renderer = ArtifactRenderer::new(TITLE);
    let mut broken = profile();
    broken.photo = Some(b"definitely not an image".to_vec());

    assert!(matches!(
        renderer.render(&broken, BASE_URL),
        Err(RenderError::Photo(_))
    ));
    // The code alone does not need the photo
    assert!(renderer.render_code(&broken, BASE_URL).is_ok());
}

#[test]
fn test_overlong_reference_is_rejected() {
    let renderer = ArtifactRenderer::new(TITLE);
    let base = format!("https://example.com/{}", "x".repeat(2000));

    match renderer.render(&profile(), &base) {
        Err(RenderError::PayloadTooLong(len)) => {
            assert_eq!(len, share_reference(&base, profile().id).len());
        }
        other => panic!("expected PayloadTooLong, got {:?}", other.map(|a| a.share_reference)),
    }
}
