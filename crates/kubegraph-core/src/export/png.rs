use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use super::{ExportError, Scene};
use crate::layout::{NODE_HEIGHT, NODE_WIDTH};

/// Refuse to allocate more than this many pixels.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const NODE_FILL: Rgba<u8> = Rgba([226, 232, 240, 255]);
const NODE_STROKE: Rgba<u8> = Rgba([100, 116, 139, 255]);
const EDGE: Rgba<u8> = Rgba([148, 163, 184, 255]);

pub(super) fn render(scene: &Scene<'_>) -> Result<Vec<u8>, ExportError> {
    let mut img = if scene.is_empty() {
        RgbaImage::from_pixel(400, 100, WHITE)
    } else {
        let (w, h) = scene.canvas();
        let (width, height) = (w.ceil() as u64, h.ceil() as u64);
        if width * height > MAX_PIXELS {
            return Err(ExportError::CanvasTooLarge { width, height });
        }
        RgbaImage::from_pixel(width as u32, height as u32, WHITE)
    };

    // Edges go underneath the node boxes.
    for edge in scene.edges {
        if let Some((from, to)) = scene.segment(edge) {
            draw_line(&mut img, from.x as i64, from.y as i64, to.x as i64, to.y as i64, EDGE);
        }
    }
    for (_, p) in scene.placed() {
        let (x, y) = (p.x as i64, p.y as i64);
        let (x1, y1) = (x + NODE_WIDTH as i64, y + NODE_HEIGHT as i64);
        fill_rect(&mut img, x, y, x1, y1, NODE_FILL);
        stroke_rect(&mut img, x, y, x1, y1, NODE_STROKE);
    }

    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

fn put(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < img.width() as u64 && (y as u64) < img.height() as u64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line.
fn draw_line(img: &mut RgbaImage, mut x0: i64, mut y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    for y in y0..y1 {
        for x in x0..x1 {
            put(img, x, y, color);
        }
    }
}

fn stroke_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    for x in x0..=x1 {
        put(img, x, y0, color);
        put(img, x, y1, color);
    }
    for y in y0..=y1 {
        put(img, x0, y, color);
        put(img, x1, y, color);
    }
}
