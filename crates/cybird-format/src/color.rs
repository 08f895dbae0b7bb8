//! RGB565 pixels and the placeholder palette

use cybird_core::{SubjectId, PALETTE_SIZE};

/// 16-bit RGB565 color (`RRRRRGGGGGGBBBBB`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Rgb565 = Rgb565(0x0000);

    /// Convert from 8-bit channels
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r5 = (r >> 3) as u16;
        let g6 = (g >> 2) as u16;
        let b5 = (b >> 3) as u16;
        Rgb565((r5 << 11) | (g6 << 5) | b5)
    }

    /// Convert from `0xRRGGBB`
    pub fn from_hex(rgb: u32) -> Self {
        Self::from_rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Expand back to 8-bit channels (low bits replicated)
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let r5 = ((self.0 >> 11) & 0x1F) as u8;
        let g6 = ((self.0 >> 5) & 0x3F) as u8;
        let b5 = (self.0 & 0x1F) as u8;
        (
            (r5 << 3) | (r5 >> 2),
            (g6 << 2) | (g6 >> 4),
            (b5 << 3) | (b5 >> 2),
        )
    }
}

/// Fallback colors, indexed by `subject id mod 8`
pub const PLACEHOLDER_PALETTE: [u32; PALETTE_SIZE as usize] = [
    0x808080, // gray
    0x8B4513, // brown
    0xB22222, // red
    0x4682B4, // steel blue
    0x00008B, // dark blue
    0x228B22, // green
    0xFFD700, // gold
    0xFF69B4, // pink
];

/// Border drawn around a placeholder
pub const PLACEHOLDER_BORDER: u32 = 0x333333;

/// Palette color for an index, wrapping out-of-range indices
pub fn palette_color(index: u8) -> Rgb565 {
    Rgb565::from_hex(PLACEHOLDER_PALETTE[(index % PALETTE_SIZE) as usize])
}

/// Placeholder color for a subject
pub fn placeholder_color(subject: SubjectId) -> Rgb565 {
    palette_color(subject.palette_index())
}
