use image::RgbImage;
use iris_vision::Detection;

const BOX_COLOR: [u8; 3] = [255, 0, 0];
const THICKNESS: u32 = 2;

/// Draws each detection's rectangle onto the frame. Geometry is normalized,
/// so boxes scale with whatever frame size the caller hands in; labels and
/// scores travel in the JSON report instead of being rasterized here.
pub fn draw_detections(frame: &mut RgbImage, detections: &[Detection]) {
    for d in detections {
        let x = (d.left * frame.width() as f32) as u32;
        let y = (d.top * frame.height() as f32) as u32;
        let w = (d.width * frame.width() as f32) as u32;
        let h = (d.height * frame.height() as f32) as u32;
        draw_rect(frame, x, y, w, h);
    }
}

fn draw_rect(frame: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    let x_end = (x + w).min(frame.width().saturating_sub(1));
    let y_end = (y + h).min(frame.height().saturating_sub(1));

    for t in 0..THICKNESS {
        for px in x..=x_end {
            put(frame, px, y + t);
            put(frame, px, y_end.saturating_sub(t));
        }
        for py in y..=y_end {
            put(frame, x + t, py);
            put(frame, x_end.saturating_sub(t), py);
        }
    }
}

fn put(frame: &mut RgbImage, x: u32, y: u32) {
    if x < frame.width() && y < frame.height() {
        frame.put_pixel(x, y, image::Rgb(BOX_COLOR));
    }
}
