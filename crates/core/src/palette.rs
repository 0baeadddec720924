//! Fixed drawing palettes and perceptual nearest-color matching.

use std::collections::HashMap;

use crate::color::{delta_e94, rgb_to_lab, LabColor};
use crate::types::Color;

/// Ordered set of unique colors the target application can draw with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// Build a palette, dropping repeated colors but keeping first-seen order.
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Self {
        let mut unique: Vec<Color> = Vec::new();
        for c in colors {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        Self { colors: unique }
    }

    /// Built-in palette for a target application name. Unknown names get a
    /// small primary-color palette.
    pub fn builtin(target_app: &str) -> Self {
        let table: &[[u8; 3]] = match target_app.to_lowercase().as_str() {
            "mspaint" | "paint" => MSPAINT,
            "gartic" | "gartic phone" => GARTIC,
            _ => BASIC,
        };
        Self::new(table.iter().map(|c| Color::from(*c)))
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn contains(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }
}

const MSPAINT: &[[u8; 3]] = &[
    [0, 0, 0],
    [127, 127, 127],
    [136, 0, 21],
    [237, 28, 36],
    [255, 127, 39],
    [255, 242, 0],
    [34, 177, 76],
    [0, 162, 232],
    [63, 72, 204],
    [163, 73, 164],
    [255, 255, 255],
    [195, 195, 195],
    [185, 122, 87],
    [255, 174, 201],
    [255, 201, 14],
    [239, 228, 176],
    [181, 230, 29],
    [153, 217, 234],
    [112, 146, 190],
    [200, 191, 231],
];

const GARTIC: &[[u8; 3]] = &[
    [0, 0, 0],
    [102, 102, 102],
    [170, 170, 170],
    [255, 255, 255],
    [124, 77, 54],
    [198, 120, 87],
    [240, 156, 118],
    [242, 178, 55],
    [252, 215, 3],
    [253, 253, 150],
    [108, 224, 134],
    [54, 180, 107],
    [39, 127, 70],
    [135, 242, 255],
    [34, 177, 214],
    [28, 101, 140],
    [158, 114, 189],
    [120, 71, 135],
    [255, 110, 166],
    [255, 18, 64],
];

const BASIC: &[[u8; 3]] = &[
    [0, 0, 0],
    [127, 127, 127],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
    [255, 255, 255],
];

/// Closest palette entry by CIE94, first entry wins ties. An empty palette
/// returns the query unchanged.
pub fn closest(palette: &Palette, color: Color) -> Color {
    let labs: Vec<LabColor> = palette.colors.iter().map(|c| rgb_to_lab(*c)).collect();
    scan(&palette.colors, &labs, rgb_to_lab(color)).unwrap_or(color)
}

fn scan(colors: &[Color], labs: &[LabColor], query: LabColor) -> Option<Color> {
    let mut best: Option<(f64, Color)> = None;
    for (color, lab) in colors.iter().zip(labs) {
        let d = delta_e94(query, *lab);
        // Strict comparison keeps the earliest entry on ties.
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((d, *color));
        }
    }
    best.map(|(_, c)| c)
}

/// Memoizing matcher for one planning pass: palette Lab values are computed
/// once, and each distinct query color is converted and scanned once.
pub struct PaletteMatcher<'a> {
    palette: &'a Palette,
    labs: Vec<LabColor>,
    cache: HashMap<Color, Color>,
    scans: usize,
}

impl<'a> PaletteMatcher<'a> {
    pub fn new(palette: &'a Palette) -> Self {
        Self {
            palette,
            labs: palette.colors.iter().map(|c| rgb_to_lab(*c)).collect(),
            cache: HashMap::new(),
            scans: 0,
        }
    }

    pub fn closest(&mut self, color: Color) -> Color {
        if self.palette.is_empty() {
            return color;
        }
        if let Some(hit) = self.cache.get(&color) {
            return *hit;
        }
        self.scans += 1;
        let matched = scan(&self.palette.colors, &self.labs, rgb_to_lab(color)).unwrap_or(color);
        self.cache.insert(color, matched);
        matched
    }

    /// Number of full palette scans performed so far.
    pub fn scans(&self) -> usize {
        self.scans
    }
}
