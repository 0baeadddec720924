//! sRGB → CIE L*a*b* conversion and the CIE94 color difference.

use crate::types::Color;

/// Reference white (D65, 2°) used by the XYZ → Lab step.
const XN: f64 = 95.047;
const YN: f64 = 100.0;
const ZN: f64 = 108.883;

const K_L: f64 = 1.0;
const K_1: f64 = 0.045;
const K_2: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabColor {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl LabColor {
    pub fn chroma(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

fn decompress(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

pub fn rgb_to_lab(color: Color) -> LabColor {
    let r = decompress(color.r);
    let g = decompress(color.g);
    let b = decompress(color.b);

    let x = (r * 0.4124 + g * 0.3576 + b * 0.1805) * 100.0;
    let y = (r * 0.2126 + g * 0.7152 + b * 0.0722) * 100.0;
    let z = (r * 0.0193 + g * 0.1192 + b * 0.9505) * 100.0;

    let fx = lab_f(x / XN);
    let fy = lab_f(y / YN);
    let fz = lab_f(z / ZN);

    LabColor {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// CIE94 difference (graphic-arts constants). Not symmetric: the chroma
/// weights come from `lab1`.
pub fn delta_e94(lab1: LabColor, lab2: LabColor) -> f64 {
    let dl = lab1.l - lab2.l;
    let da = lab1.a - lab2.a;
    let db = lab1.b - lab2.b;

    let c1 = lab1.chroma();
    let c2 = lab2.chroma();
    let dc = c1 - c2;

    // Cancellation near identical hues can push this slightly below zero.
    let dh_sq = da * da + db * db - dc * dc;
    let dh = if dh_sq > 0.0 { dh_sq.sqrt() } else { 0.0 };

    let sl = 1.0;
    let sc = 1.0 + K_1 * c1;
    let sh = 1.0 + K_2 * c1;

    let tl = dl / (K_L * sl);
    let tc = dc / sc;
    let th = dh / sh;
    (tl * tl + tc * tc + th * th).sqrt()
}

const NAMED_COLORS: &[(Color, &str)] = &[
    (Color::new(0, 0, 0), "Black"),
    (Color::new(255, 255, 255), "White"),
    (Color::new(255, 0, 0), "Red"),
    (Color::new(0, 255, 0), "Green"),
    (Color::new(0, 0, 255), "Blue"),
    (Color::new(255, 255, 0), "Yellow"),
    (Color::new(255, 0, 255), "Magenta"),
    (Color::new(0, 255, 255), "Cyan"),
    (Color::new(128, 128, 128), "Gray"),
    (Color::new(128, 0, 0), "Maroon"),
    (Color::new(0, 128, 0), "Dark Green"),
    (Color::new(0, 0, 128), "Navy Blue"),
    (Color::new(128, 128, 0), "Olive"),
    (Color::new(128, 0, 128), "Purple"),
    (Color::new(0, 128, 128), "Teal"),
];

/// Luma-weighted RGB distance, only used for human-readable names.
fn weighted_rgb_distance(a: Color, b: Color) -> f64 {
    let dr = a.r as f64 - b.r as f64;
    let dg = a.g as f64 - b.g as f64;
    let db = a.b as f64 - b.b as f64;
    (dr * dr * 0.3 + dg * dg * 0.59 + db * db * 0.11).sqrt()
}

/// Display name for log lines: exact name, "<name>-like", or `RGB(r,g,b)`.
pub fn color_name(color: Color) -> String {
    if let Some((_, name)) = NAMED_COLORS.iter().find(|(c, _)| *c == color) {
        return name.to_string();
    }
    let nearest = NAMED_COLORS
        .iter()
        .map(|(c, name)| (weighted_rgb_distance(color, *c), *name))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    match nearest {
        Some((dist, name)) if dist < 30.0 => format!("{}-like", name),
        _ => format!("RGB({},{},{})", color.r, color.g, color.b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_black_and_white_lightness() {
        let black = rgb_to_lab(Color::BLACK);
        assert!(approx(black.l, 0.0, 1e-9));
        assert!(approx(black.a, 0.0, 1e-9));

        let white = rgb_to_lab(Color::WHITE);
        assert!(approx(white.l, 100.0, 0.01), "L = {}", white.l);
        assert!(approx(white.a, 0.0, 0.05), "a = {}", white.a);
        assert!(approx(white.b, 0.0, 0.05), "b = {}", white.b);
    }

    #[test]
    fn test_red_lab_reference() {
        let red = rgb_to_lab(Color::new(255, 0, 0));
        assert!(approx(red.l, 53.24, 0.05), "L = {}", red.l);
        assert!(approx(red.a, 80.09, 0.1), "a = {}", red.a);
        assert!(approx(red.b, 67.20, 0.1), "b = {}", red.b);
    }

    #[test]
    fn test_delta_e94_reflexive() {
        for r in (0..=255).step_by(51) {
            for g in (0..=255).step_by(51) {
                for b in (0..=255).step_by(51) {
                    let lab = rgb_to_lab(Color::new(r as u8, g as u8, b as u8));
                    assert_eq!(delta_e94(lab, lab), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_delta_e94_never_nan_near_same_hue() {
        let a = rgb_to_lab(Color::new(200, 10, 10));
        let b = rgb_to_lab(Color::new(201, 10, 10));
        let d = delta_e94(a, b);
        assert!(d.is_finite());
        assert!(d > 0.0);
    }

    #[test]
    fn test_delta_e94_pure_lightness_difference() {
        let a = LabColor { l: 60.0, a: 0.0, b: 0.0 };
        let b = LabColor { l: 50.0, a: 0.0, b: 0.0 };
        assert!(approx(delta_e94(a, b), 10.0, 1e-12));
    }

    #[test]
    fn test_delta_e94_weights_from_first_argument() {
        let saturated = LabColor { l: 50.0, a: 60.0, b: 0.0 };
        let grey = LabColor { l: 50.0, a: 0.0, b: 0.0 };
        // dC = 60 in both directions; Sc uses C1.
        assert!(approx(delta_e94(grey, saturated), 60.0, 1e-9));
        assert!(approx(delta_e94(saturated, grey), 60.0 / (1.0 + 0.045 * 60.0), 1e-9));
    }

    #[test]
    fn test_color_name() {
        assert_eq!(color_name(Color::new(255, 0, 0)), "Red");
        assert_eq!(color_name(Color::new(250, 5, 5)), "Red-like");
        assert_eq!(color_name(Color::new(200, 100, 50)), "RGB(200,100,50)");
    }
}
