//! QR code of a share reference
//!
//! Always encoded at error-correction level H (~30% recovery) so printed
//! codes survive wear. The PNG has a 4-module quiet zone.

use super::RenderError;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

/// Light border around the symbol, in modules
pub const QUIET_ZONE: u32 = 4;

/// Edge length of one module in the PNG
pub const MODULE_PIXELS: u32 = 10;

/// Encode `payload` at level H
pub fn encode(payload: &str) -> Result<QrCode, RenderError> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H).map_err(|e| match e {
        QrError::DataTooLong => RenderError::PayloadTooLong(payload.len()),
        other => RenderError::Code(other.to_string()),
    })
}

/// Rasterize as an 8-bit grayscale PNG
pub fn to_png(code: &QrCode) -> Result<Vec<u8>, RenderError> {
    let width = code.width() as u32;
    let colors = code.to_colors();
    let size = (width + 2 * QUIET_ZONE) * MODULE_PIXELS;

    let image = GrayImage::from_fn(size, size, |x, y| {
        let col = x / MODULE_PIXELS;
        let row = y / MODULE_PIXELS;
        let inside = (QUIET_ZONE..QUIET_ZONE + width).contains(&col)
            && (QUIET_ZONE..QUIET_ZONE + width).contains(&row);
        let dark = inside
            && colors[((row - QUIET_ZONE) * width + (col - QUIET_ZONE)) as usize] == Color::Dark;
        Luma([if dark { 0 } else { 255 }])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Horizontal runs of dark modules as `(row, first column, length)`
pub fn dark_runs(code: &QrCode) -> Vec<(usize, usize, usize)> {
    let width = code.width();
    let colors = code.to_colors();
    let mut runs = Vec::new();

    for (row, line) in colors.chunks(width).enumerate() {
        let mut col = 0;
        while col < width {
            if line[col] == Color::Dark {
                let start = col;
                while col < width && line[col] == Color::Dark {
                    col += 1;
                }
                runs.push((row, start, col - start));
            } else {
                col += 1;
            }
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = "x".repeat(4000);
        assert!(matches!(encode(&payload), Err(RenderError::PayloadTooLong(4000))));
    }

    #[test]
    fn test_png_dimensions_include_quiet_zone() {
        let code = encode("https://karwan.streamlit.app?profile_id=1").unwrap();
        let png = to_png(&code).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        let expected = (code.width() as u32 + 2 * QUIET_ZONE) * MODULE_PIXELS;
        assert_eq!(decoded.width(), expected);
        assert_eq!(decoded.height(), expected);
    }

    #[test]
    fn test_dark_runs_cover_every_dark_module() {
        let code = encode("karwan").unwrap();
        let dark_modules = code.to_colors().iter().filter(|c| **c == Color::Dark).count();
        let covered: usize = dark_runs(&code).iter().map(|(_, _, len)| len).sum();
        assert_eq!(covered, dark_modules);
    }
}
