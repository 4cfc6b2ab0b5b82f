// src/debug.rs
//
// Text rendition of the per-frame debug overlay.

use crate::tracker::GazeReading;

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{:.2}", v))
}

fn pupil(coords: Option<(i32, i32)>) -> String {
    coords.map_or_else(|| "--".to_string(), |(x, y)| format!("({}, {})", x, y))
}

pub fn overlay_text(reading: &GazeReading) -> String {
    format!(
        "Direction: {} | H: {} | V: {} | L: {} | R: {}{}",
        reading.direction,
        ratio(reading.ratios.horizontal),
        ratio(reading.ratios.vertical),
        pupil(reading.pupil_left),
        pupil(reading.pupil_right),
        if reading.blinking { " | blinking" } else { "" }
    )
}
