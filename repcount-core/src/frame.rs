//! Frame decoding, annotation and re-encoding.

use std::io::Cursor;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::counter::RepCounter;
use crate::pose::{JointSample, Point2};

/// One decoded video frame plus any joints the client already extracted.
pub struct Frame {
    pub image: DynamicImage,
    pub landmarks: Option<JointSample>,
}

const JOINT_COLOR: Rgb<u8> = Rgb([245, 117, 66]);
const LIMB_COLOR: Rgb<u8> = Rgb([245, 66, 230]);
const JOINT_RADIUS: i64 = 3;
const PANEL_COLOR: Rgb<u8> = Rgb([16, 117, 245]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const PANEL_WIDTH: i64 = 112;
const PANEL_HEIGHT: i64 = 38;

/// Decodes a `data:image/...;base64,` URI, or bare base64, into an image.
pub fn decode_data_uri(image_data: &str) -> Result<DynamicImage> {
    let encoded = if image_data.starts_with("data:") {
        let (_header, encoded) = image_data
            .split_once(',')
            .ok_or_else(|| anyhow!("Malformed data URI: missing ',' separator"))?;
        encoded
    } else {
        image_data
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Image payload is not valid base64")?;
    image::load_from_memory(&bytes).context("Image payload is not a decodable image")
}

pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    // the JPEG encoder rejects alpha channels
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .context("Failed to encode frame as JPEG")?;
    Ok(buf)
}

pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Draws the rep panel, and the tracked arm with its elbow angle when a
/// pose was found.
pub fn annotate(
    image: &DynamicImage,
    joints: Option<&JointSample>,
    counter: &RepCounter,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    draw_panel(&mut canvas, counter);
    let Some(joints) = joints else {
        return canvas;
    };

    let points = [joints.shoulder, joints.elbow, joints.wrist];
    for pair in points.windows(2) {
        draw_segment(&mut canvas, pair[0], pair[1], LIMB_COLOR);
    }
    let angle = joints.elbow_angle();
    if angle.is_finite() && joints.elbow.x.is_finite() && joints.elbow.y.is_finite() {
        let (x, y) = to_pixel(&canvas, joints.elbow);
        let label = format!("{:.0}", angle);
        let offset = JOINT_RADIUS + 2;
        draw_text(&mut canvas, x + offset, y + offset, &label, 2, TEXT_COLOR);
    }
    for point in points {
        draw_marker(&mut canvas, point, JOINT_COLOR);
    }
    canvas
}

fn draw_panel(canvas: &mut RgbImage, counter: &RepCounter) {
    for y in 0..PANEL_HEIGHT {
        for x in 0..PANEL_WIDTH {
            put(canvas, x, y, PANEL_COLOR);
        }
    }
    let stage = counter.stage().map_or("-", |s| s.as_str());
    draw_text(canvas, 4, 4, "REPS", 2, TEXT_COLOR);
    draw_text(canvas, 4, 18, &counter.count().to_string(), 3, TEXT_COLOR);
    draw_text(canvas, 52, 4, "STAGE", 2, TEXT_COLOR);
    draw_text(canvas, 52, 18, &stage.to_ascii_uppercase(), 3, TEXT_COLOR);
}

/// 3x5 bitmap glyphs, one row per byte, high bit on the left.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'N' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => [0; 5],
    }
}

fn draw_text(canvas: &mut RgbImage, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
    let mut left = x;
    for c in text.chars() {
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let px = left + col * scale;
                let py = y + row as i64 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put(canvas, px + dx, py + dy, color);
                    }
                }
            }
        }
        left += 4 * scale;
    }
}

// clamped to one canvas size beyond each edge to bound segment length
fn to_pixel(canvas: &RgbImage, p: Point2) -> (i64, i64) {
    let scale = |v: f64, size: u32| {
        let size = size as f64;
        (v * size).round().clamp(-size, 2.0 * size) as i64
    };
    (scale(p.x, canvas.width()), scale(p.y, canvas.height()))
}

fn put(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_marker(canvas: &mut RgbImage, p: Point2, color: Rgb<u8>) {
    if !(p.x.is_finite() && p.y.is_finite()) {
        return;
    }
    let (cx, cy) = to_pixel(canvas, p);
    for dy in -JOINT_RADIUS..=JOINT_RADIUS {
        for dx in -JOINT_RADIUS..=JOINT_RADIUS {
            if dx * dx + dy * dy <= JOINT_RADIUS * JOINT_RADIUS {
                put(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

fn draw_segment(canvas: &mut RgbImage, from: Point2, to: Point2, color: Rgb<u8>) {
    if ![from.x, from.y, to.x, to.y].iter().all(|v| v.is_finite()) {
        return;
    }
    let (x0, y0) = to_pixel(canvas, from);
    let (x1, y1) = to_pixel(canvas, to);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
    for i in 0..=steps {
        let x = x0 + (x1 - x0) * i / steps;
        let y = y0 + (y1 - y0) * i / steps;
        put(canvas, x, y, color);
    }
}
