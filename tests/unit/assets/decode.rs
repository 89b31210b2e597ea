use std::io::Cursor;

use super::*;

fn png_bytes(w: u32, h: u32, straight: Vec<u8>) -> Vec<u8> {
    let img = image::RgbaImage::from_raw(w, h, straight).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_png_dimensions_and_premul() {
    let buf = png_bytes(1, 1, vec![100, 50, 200, 128]);
    let decoded = decode_image(&buf).unwrap();
    assert_eq!(decoded.width(), 1);
    assert_eq!(decoded.height(), 1);
    assert_eq!(
        decoded.as_bytes(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_garbage_is_error() {
    assert!(decode_image(b"definitely not an image").is_err());
}

#[test]
fn png_encode_keeps_alpha() {
    let img = ImageData::from_straight_rgba8(2, 1, vec![255, 0, 0, 255, 0, 0, 0, 0]).unwrap();
    let bytes = encode_image(&img, ExportFormat::Png, 90).unwrap();
    let back = decode_image(&bytes).unwrap();
    assert_eq!(back, img);
}

#[test]
fn jpeg_refuses_transparent_input() {
    let img = ImageData::transparent(2, 2).unwrap();
    assert!(encode_image(&img, ExportFormat::Jpeg, 90).is_err());

    let opaque = ImageData::filled(2, 2, [10, 200, 30, 255]).unwrap();
    let bytes = encode_image(&opaque, ExportFormat::Jpeg, 90).unwrap();
    let back = decode_image(&bytes).unwrap();
    assert_eq!(back.canvas(), opaque.canvas());
    assert!(back.is_opaque());
}

#[test]
fn zero_area_encode_is_invalid_geometry() {
    let img = ImageData::new(0, 0, Vec::new()).unwrap();
    assert!(matches!(
        encode_image(&img, ExportFormat::Png, 90),
        Err(StageError::InvalidGeometry(_))
    ));
}

#[test]
fn format_from_extension() {
    assert_eq!(
        ExportFormat::from_path(Path::new("out/a.PNG")).unwrap(),
        ExportFormat::Png
    );
    assert_eq!(
        ExportFormat::from_path(Path::new("a.jpeg")).unwrap(),
        ExportFormat::Jpeg
    );
    assert!(ExportFormat::from_path(Path::new("a.tiff")).is_err());
    assert!(!ExportFormat::Jpeg.supports_alpha());
}
