//! Stable terminal colors for command labels

use colored::Color;

// Jewel tones that stay distinct from the red/yellow/green status colors
const PALETTE: [Color; 6] = [
    Color::TrueColor { r: 147, g: 112, b: 219 },
    Color::TrueColor { r: 64, g: 224, b: 208 },
    Color::TrueColor { r: 255, g: 140, b: 0 },
    Color::TrueColor { r: 199, g: 21, b: 133 },
    Color::TrueColor { r: 72, g: 209, b: 204 },
    Color::TrueColor { r: 138, g: 43, b: 226 },
];

/// Color for a command label, identical across runs
pub fn label_color(label: &str) -> Color {
    let hash = label
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));

    PALETTE[(hash % PALETTE.len() as u64) as usize]
}
