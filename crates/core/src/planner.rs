//! Turns a preprocessed bitmap into an ordered list of pointer actions.
//!
//! Pixel and vector styles click every visible pixel, grouped by matched
//! palette color (darkest first) and ordered inside fixed-size spatial cells
//! by greedy nearest neighbor. Outline style traces 8-connected runs of dark
//! pixels into press/drag/release strokes.

use std::collections::HashMap;

use crate::bitmap::Bitmap;
use crate::error::{DrawError, Notice};
use crate::palette::{Palette, PaletteMatcher};
use crate::preprocess::{is_dark, DEFAULT_DARK_THRESHOLD};
use crate::types::{Color, DevicePoint, DrawStyle, PlannedAction, ScreenRegion};

pub const DEFAULT_CELL_SIZE: f64 = 20.0;

/// Neighbor scan order for stroke tracing: clockwise starting at north.
const NEIGHBORS: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    pub style: DrawStyle,
    /// Side of the square cells (device units) that bound nearest-neighbor ordering.
    pub cell_size: f64,
    /// Channel sum below which an outline pixel is drawn.
    pub dark_threshold: u32,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            style: DrawStyle::Pixel,
            cell_size: DEFAULT_CELL_SIZE,
            dark_threshold: DEFAULT_DARK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanState {
    NotStarted,
    Planning,
    Planned,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Distinct palette colors used.
    pub colors: usize,
    /// Points clicked (pixel) or visited by strokes (outline).
    pub points: usize,
    pub segments: usize,
    /// Pixels skipped as background.
    pub background: usize,
    /// Dark pixels with no dark neighbor, dropped from outline strokes.
    pub isolated: usize,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    /// Region actually used, after defaulting.
    pub region: ScreenRegion,
    pub stats: PlanStats,
    pub notices: Vec<Notice>,
}

pub struct Planner {
    options: PlanOptions,
    state: PlanState,
}

impl Planner {
    pub fn new(options: PlanOptions) -> Self {
        Self { options, state: PlanState::NotStarted }
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    /// Plan one drawing. A missing region is replaced by one centered on
    /// `surface` (width, height) with the bitmap's pixel size, and reported.
    pub fn plan(
        &mut self,
        bitmap: Option<&Bitmap>,
        palette: Option<&Palette>,
        region: Option<ScreenRegion>,
        surface: (u32, u32),
    ) -> Result<Plan, DrawError> {
        if self.state != PlanState::NotStarted {
            return Err(DrawError::InvalidOption("planner already used".into()));
        }
        self.state = PlanState::Planning;
        let result = self.run(bitmap, palette, region, surface);
        self.state = match &result {
            Ok(_) => PlanState::Planned,
            Err(e) => PlanState::Failed(e.to_string()),
        };
        result
    }

    fn run(
        &self,
        bitmap: Option<&Bitmap>,
        palette: Option<&Palette>,
        region: Option<ScreenRegion>,
        surface: (u32, u32),
    ) -> Result<Plan, DrawError> {
        let bitmap = bitmap.ok_or(DrawError::NoImage)?;
        let palette = palette.ok_or(DrawError::NoPalette)?;
        if !self.options.cell_size.is_finite() || self.options.cell_size <= 0.0 {
            return Err(DrawError::InvalidOption(format!(
                "cell size must be greater than 0, got {}",
                self.options.cell_size
            )));
        }

        let mut notices = Vec::new();
        if palette.is_empty() {
            notices.push(Notice::EmptyPalette);
        }
        let region = match region {
            Some(r) => r,
            None => {
                let r = ScreenRegion::centered(surface.0, surface.1, bitmap.width(), bitmap.height());
                notices.push(Notice::MissingRegion { defaulted: r });
                r
            }
        };

        let mut stats = PlanStats::default();
        let actions = match self.options.style {
            DrawStyle::Pixel | DrawStyle::Vector => {
                plan_pixels(bitmap, palette, region, self.options.cell_size, &mut stats)
            }
            DrawStyle::Outline => {
                let actions = plan_outline(bitmap, palette, region, self.options.dark_threshold, &mut stats);
                if actions.is_empty() {
                    notices.push(match stats.isolated {
                        0 => Notice::NoOutlinePixels,
                        isolated => Notice::OnlyIsolatedPixels { isolated },
                    });
                }
                actions
            }
        };

        Ok(Plan { actions, region, stats, notices })
    }
}

fn to_device(p: (f64, f64)) -> DevicePoint {
    DevicePoint::new(p.0.floor() as i32, p.1.floor() as i32)
}

fn plan_pixels(
    bitmap: &Bitmap,
    palette: &Palette,
    region: ScreenRegion,
    cell_size: f64,
    stats: &mut PlanStats,
) -> Vec<PlannedAction> {
    let scale = region.scale_for(bitmap.width(), bitmap.height());
    let mut matcher = PaletteMatcher::new(palette);

    // Groups in first-use order; the stable sort below keeps that order on ties.
    let mut groups: Vec<(Color, Vec<(f64, f64)>)> = Vec::new();
    let mut group_index: HashMap<Color, usize> = HashMap::new();

    for (x, y, color, visible) in bitmap.iter() {
        if !visible {
            stats.background += 1;
            continue;
        }
        let target = matcher.closest(color);
        let idx = *group_index.entry(target).or_insert_with(|| {
            groups.push((target, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(region.pixel_center(x, y, scale));
    }

    groups.sort_by_key(|(color, _)| color.channel_sum());

    let origin = (region.x1() as f64, region.y1() as f64);
    let mut actions = Vec::new();
    for (color, points) in groups {
        stats.colors += 1;
        stats.points += points.len();
        actions.push(PlannedAction::SelectColor(color));
        for p in order_by_cells(points, origin, cell_size) {
            actions.push(PlannedAction::MoveTo(to_device(p)));
            actions.push(PlannedAction::Click);
        }
    }
    actions
}

/// Partition points into square cells (visited in first-seen order) and
/// order each cell by nearest neighbor.
fn order_by_cells(points: Vec<(f64, f64)>, origin: (f64, f64), cell_size: f64) -> Vec<(f64, f64)> {
    let mut cells: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut cell_index: HashMap<(i64, i64), usize> = HashMap::new();
    for p in points {
        let key = (
            ((p.0 - origin.0) / cell_size).floor() as i64,
            ((p.1 - origin.1) / cell_size).floor() as i64,
        );
        let idx = *cell_index.entry(key).or_insert_with(|| {
            cells.push(Vec::new());
            cells.len() - 1
        });
        cells[idx].push(p);
    }
    cells.into_iter().flat_map(nearest_neighbor_order).collect()
}

/// Greedy tour starting at the first point. Quadratic, so callers keep the
/// input small.
fn nearest_neighbor_order(mut remaining: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if remaining.len() <= 1 {
        return remaining;
    }
    let mut ordered = Vec::with_capacity(remaining.len());
    ordered.push(remaining.remove(0));
    while !remaining.is_empty() {
        let last = ordered[ordered.len() - 1];
        let mut nearest = 0;
        let mut nearest_dist = f64::INFINITY;
        for (i, p) in remaining.iter().enumerate() {
            let d = (p.0 - last.0).powi(2) + (p.1 - last.1).powi(2);
            if d < nearest_dist {
                nearest_dist = d;
                nearest = i;
            }
        }
        ordered.push(remaining.remove(nearest));
    }
    ordered
}

fn plan_outline(
    bitmap: &Bitmap,
    palette: &Palette,
    region: ScreenRegion,
    dark_threshold: u32,
    stats: &mut PlanStats,
) -> Vec<PlannedAction> {
    let (w, h) = bitmap.dimensions();
    let dark: Vec<bool> = bitmap.iter().map(|(_, _, c, _)| is_dark(c, dark_threshold)).collect();

    let segments = trace_segments(&dark, w, h, &mut stats.isolated);
    if segments.is_empty() {
        return Vec::new();
    }

    let scale = region.scale_for(w, h);
    let black = PaletteMatcher::new(palette).closest(Color::BLACK);
    stats.colors = 1;
    stats.segments = segments.len();

    let mut actions = vec![PlannedAction::SelectColor(black)];
    for segment in &segments {
        stats.points += segment.len();
        let mut points = segment.iter().map(|&(x, y)| to_device(region.pixel_center(x, y, scale)));
        if let Some(first) = points.next() {
            actions.push(PlannedAction::MoveTo(first));
            actions.push(PlannedAction::PressDown);
            actions.extend(points.map(PlannedAction::DragTo));
            actions.push(PlannedAction::Release);
        }
    }
    actions
}

/// Greedy 8-connected path tracing over a row-major dark mask. Each dark
/// pixel lands in exactly one path; single-pixel paths are dropped and
/// counted in `isolated`.
fn trace_segments(dark: &[bool], w: u32, h: u32, isolated: &mut usize) -> Vec<Vec<(u32, u32)>> {
    let idx = |x: u32, y: u32| y as usize * w as usize + x as usize;
    let mut visited = vec![false; dark.len()];
    let mut segments = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !dark[idx(x, y)] || visited[idx(x, y)] {
                continue;
            }
            visited[idx(x, y)] = true;
            let mut segment = vec![(x, y)];
            let mut current = (x, y);

            loop {
                let next = NEIGHBORS.iter().find_map(|&(dx, dy)| {
                    let nx = current.0 as i64 + dx;
                    let ny = current.1 as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        return None;
                    }
                    let i = idx(nx as u32, ny as u32);
                    (dark[i] && !visited[i]).then_some((nx as u32, ny as u32))
                });
                let Some(next) = next else { break };
                visited[idx(next.0, next.1)] = true;
                segment.push(next);
                current = next;
            }

            if segment.len() > 1 {
                segments.push(segment);
            } else {
                *isolated += 1;
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::new(255, 0, 0);
    const WHITE: Color = Color::WHITE;
    const BLACK: Color = Color::BLACK;

    fn region(w: i32, h: i32) -> Option<ScreenRegion> {
        Some(ScreenRegion::new(0, 0, w, h).unwrap())
    }

    fn with_background(width: u32, height: u32, pixels: Vec<Color>) -> Bitmap {
        let visible = pixels.iter().map(|c| *c != WHITE).collect();
        Bitmap::with_visibility(width, height, pixels, visible).unwrap()
    }

    fn plan(bitmap: &Bitmap, palette: &Palette, options: PlanOptions, r: Option<ScreenRegion>) -> Plan {
        Planner::new(options).plan(Some(bitmap), Some(palette), r, (1920, 1080)).unwrap()
    }

    fn count(actions: &[PlannedAction], pred: impl Fn(&PlannedAction) -> bool) -> usize {
        actions.iter().filter(|a| pred(a)).count()
    }

    #[test]
    fn test_two_red_two_white() {
        let bmp = with_background(2, 2, vec![RED, RED, WHITE, WHITE]);
        let palette = Palette::new([RED, BLACK]);
        let p = plan(&bmp, &palette, PlanOptions::default(), region(20, 20));

        assert_eq!(
            p.actions,
            vec![
                PlannedAction::SelectColor(RED),
                PlannedAction::MoveTo(DevicePoint::new(5, 5)),
                PlannedAction::Click,
                PlannedAction::MoveTo(DevicePoint::new(15, 5)),
                PlannedAction::Click,
            ]
        );
        assert_eq!(p.stats.background, 2);
        assert!(p.notices.is_empty());
    }

    #[test]
    fn test_all_background_plans_nothing() {
        let bmp = with_background(3, 3, vec![WHITE; 9]);
        let p = plan(&bmp, &Palette::builtin("mspaint"), PlanOptions::default(), region(3, 3));
        assert!(p.actions.is_empty());
        assert_eq!(p.stats.background, 9);
    }

    #[test]
    fn test_action_count_matches_pixels_and_colors() {
        let pixels: Vec<Color> = (0..64)
            .map(|i| match i % 4 {
                0 => Color::new(250, 10, 10),
                1 => Color::new(5, 5, 5),
                2 => Color::new(20, 30, 240),
                _ => WHITE,
            })
            .collect();
        let bmp = with_background(8, 8, pixels);
        let palette = Palette::builtin("basic");
        let p = plan(&bmp, &palette, PlanOptions::default(), region(80, 80));

        let visible = bmp.visible_count();
        let selects = count(&p.actions, |a| matches!(a, PlannedAction::SelectColor(_)));
        assert_eq!(selects, 3);
        assert_eq!(count(&p.actions, |a| matches!(a, PlannedAction::Click)), visible);
        assert_eq!(p.actions.len(), visible * 2 + selects);
        assert_eq!(p.stats.points, visible);
    }

    #[test]
    fn test_colors_drawn_darkest_first() {
        let bmp = Bitmap::new(3, 1, vec![WHITE, RED, BLACK]).unwrap();
        let palette = Palette::new([WHITE, RED, BLACK]);
        let p = plan(&bmp, &palette, PlanOptions::default(), region(3, 1));
        let order: Vec<Color> = p
            .actions
            .iter()
            .filter_map(|a| match a {
                PlannedAction::SelectColor(c) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![BLACK, RED, WHITE]);
    }

    #[test]
    fn test_empty_palette_draws_raw_colors() {
        let odd = Color::new(12, 200, 99);
        let bmp = Bitmap::new(1, 1, vec![odd]).unwrap();
        let p = plan(&bmp, &Palette::default(), PlanOptions::default(), region(1, 1));
        assert_eq!(p.actions[0], PlannedAction::SelectColor(odd));
        assert_eq!(p.notices, vec![Notice::EmptyPalette]);
    }

    #[test]
    fn test_missing_region_is_centered() {
        let bmp = Bitmap::new(100, 50, vec![BLACK; 5000]).unwrap();
        let p = plan(&bmp, &Palette::new([BLACK]), PlanOptions::default(), None);
        let expected = ScreenRegion::new(910, 515, 1010, 565).unwrap();
        assert_eq!(p.region, expected);
        assert_eq!(p.notices, vec![Notice::MissingRegion { defaulted: expected }]);
        assert_eq!(p.actions[1], PlannedAction::MoveTo(DevicePoint::new(910, 515)));
    }

    #[test]
    fn test_missing_inputs_fail_fast() {
        let bmp = Bitmap::new(1, 1, vec![BLACK]).unwrap();
        let palette = Palette::new([BLACK]);

        let mut planner = Planner::new(PlanOptions::default());
        assert!(matches!(planner.plan(None, Some(&palette), None, (10, 10)), Err(DrawError::NoImage)));
        assert!(matches!(planner.state(), PlanState::Failed(_)));

        let mut planner = Planner::new(PlanOptions::default());
        assert!(matches!(planner.plan(Some(&bmp), None, None, (10, 10)), Err(DrawError::NoPalette)));

        let mut planner = Planner::new(PlanOptions::default());
        assert_eq!(planner.state(), &PlanState::NotStarted);
        planner.plan(Some(&bmp), Some(&palette), None, (10, 10)).unwrap();
        assert_eq!(planner.state(), &PlanState::Planned);
        assert!(planner.plan(Some(&bmp), Some(&palette), None, (10, 10)).is_err());
    }

    #[test]
    fn test_invalid_cell_size() {
        let bmp = Bitmap::new(1, 1, vec![BLACK]).unwrap();
        let options = PlanOptions { cell_size: 0.0, ..Default::default() };
        let mut planner = Planner::new(options);
        let err = planner.plan(Some(&bmp), Some(&Palette::new([BLACK])), None, (10, 10));
        assert!(matches!(err, Err(DrawError::InvalidOption(_))));
    }

    #[test]
    fn test_nearest_neighbor_order() {
        let pts = vec![(0.0, 0.0), (10.0, 0.0), (1.0, 0.0), (5.0, 0.0)];
        assert_eq!(
            nearest_neighbor_order(pts),
            vec![(0.0, 0.0), (1.0, 0.0), (5.0, 0.0), (10.0, 0.0)]
        );
    }

    #[test]
    fn test_cells_bound_ordering() {
        // Two cells; the tour never jumps back into a finished cell.
        let pts = vec![(1.0, 1.0), (25.0, 1.0), (3.0, 1.0), (21.0, 1.0), (2.0, 1.0)];
        let ordered = order_by_cells(pts, (0.0, 0.0), 20.0);
        assert_eq!(
            ordered,
            vec![(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (25.0, 1.0), (21.0, 1.0)]
        );
    }

    #[test]
    fn test_outline_straight_line_is_one_stroke() {
        let mut pixels = vec![WHITE; 12 * 3];
        for x in 1..11 {
            pixels[12 + x] = BLACK;
        }
        let bmp = Bitmap::new(12, 3, pixels).unwrap();
        let options = PlanOptions { style: DrawStyle::Outline, ..Default::default() };
        let p = plan(&bmp, &Palette::builtin("mspaint"), options, region(12, 3));

        assert_eq!(p.stats.segments, 1);
        assert_eq!(p.stats.points, 10);
        assert_eq!(p.actions[0], PlannedAction::SelectColor(BLACK));
        assert_eq!(p.actions[1], PlannedAction::MoveTo(DevicePoint::new(1, 1)));
        assert_eq!(p.actions[2], PlannedAction::PressDown);
        let drags = &p.actions[3..12];
        assert!(drags.iter().all(|a| matches!(a, PlannedAction::DragTo(_))));
        assert_eq!(drags[8], PlannedAction::DragTo(DevicePoint::new(10, 1)));
        assert_eq!(p.actions[12], PlannedAction::Release);
        assert_eq!(p.actions.len(), 13);
    }

    #[test]
    fn test_outline_vertical_and_isolated() {
        let mut pixels = vec![WHITE; 5 * 5];
        for y in 0..4 {
            pixels[y * 5 + 1] = BLACK;
        }
        pixels[4 * 5 + 4] = BLACK;
        let bmp = Bitmap::new(5, 5, pixels).unwrap();
        let options = PlanOptions { style: DrawStyle::Outline, ..Default::default() };
        let p = plan(&bmp, &Palette::new([BLACK]), options, region(5, 5));

        assert_eq!(p.stats.segments, 1);
        assert_eq!(p.stats.isolated, 1);
        assert_eq!(count(&p.actions, |a| matches!(a, PlannedAction::DragTo(_))), 3);
        let n = p.actions.len();
        assert_eq!(p.actions[n - 2], PlannedAction::DragTo(DevicePoint::new(1, 3)));
        assert_eq!(p.actions[n - 1], PlannedAction::Release);
    }

    #[test]
    fn test_outline_without_dark_pixels() {
        let bmp = Bitmap::new(4, 4, vec![WHITE; 16]).unwrap();
        let options = PlanOptions { style: DrawStyle::Outline, ..Default::default() };
        let p = plan(&bmp, &Palette::new([BLACK]), options, region(4, 4));
        assert!(p.actions.is_empty());
        assert_eq!(p.notices, vec![Notice::NoOutlinePixels]);
    }

    #[test]
    fn test_outline_only_isolated_pixels() {
        let mut pixels = vec![WHITE; 5 * 5];
        pixels[0] = BLACK;
        pixels[2 * 5 + 3] = BLACK;
        pixels[4 * 5] = BLACK;
        let bmp = Bitmap::new(5, 5, pixels).unwrap();
        let options = PlanOptions { style: DrawStyle::Outline, ..Default::default() };
        let p = plan(&bmp, &Palette::new([BLACK]), options, region(5, 5));
        assert!(p.actions.is_empty());
        assert_eq!(p.notices, vec![Notice::OnlyIsolatedPixels { isolated: 3 }]);
    }

    #[test]
    fn test_trace_every_dark_pixel_once() {
        // An L shape plus a diagonal touching it.
        let w = 6;
        let h = 6;
        let mut dark = vec![false; 36];
        for &(x, y) in &[(0, 0), (0, 1), (0, 2), (1, 2), (2, 2), (3, 3), (4, 4), (5, 0), (5, 1)] {
            dark[y * w + x] = true;
        }
        let mut isolated = 0;
        let segments = trace_segments(&dark, w as u32, h as u32, &mut isolated);
        let covered: usize = segments.iter().map(|s| s.len()).sum::<usize>() + isolated;
        assert_eq!(covered, 9);

        let mut seen = std::collections::HashSet::new();
        for s in &segments {
            for p in s {
                assert!(seen.insert(*p), "pixel {:?} in two segments", p);
            }
        }
    }
}
