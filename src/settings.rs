use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use autodraw_core::capture::{capture_point, capture_region};
use autodraw_core::color::color_name;
use autodraw_core::executor::{ExecOptions, DEFAULT_PROGRESS_EVERY};
use autodraw_core::logger;
use autodraw_core::palette::Palette;
use autodraw_core::planner::{PlanOptions, DEFAULT_CELL_SIZE};
use autodraw_core::platform::PointerActuator;
use autodraw_core::preprocess::{PreprocessOptions, DEFAULT_WHITE_THRESHOLD};
use autodraw_core::session::DrawRequest;
use autodraw_core::sleep::Sleeper;
use autodraw_core::types::{Color, ColorPositions, DevicePoint, DrawStyle, ScreenRegion};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingSettings {
    pub skip_white: bool,
    pub white_threshold: u8,
    pub cell_size: f64,
    pub progress_every: usize,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            skip_white: true,
            white_threshold: DEFAULT_WHITE_THRESHOLD,
            cell_size: DEFAULT_CELL_SIZE,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_app: String,
    pub style: DrawStyle,
    pub resolution: f32,
    /// Seconds to pause after each pointer move.
    pub speed: f64,
    pub drawing: DrawingSettings,
    /// Overrides the target application's built-in palette when not empty.
    pub palette: Vec<Color>,
    pub canvas_area: Option<ScreenRegion>,
    #[serde(serialize_with = "positions_to_json", deserialize_with = "positions_from_json")]
    pub color_positions: ColorPositions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_app: "mspaint".into(),
            style: DrawStyle::Pixel,
            resolution: 1.0,
            speed: 0.001,
            drawing: DrawingSettings::default(),
            palette: Vec::new(),
            canvas_area: None,
            color_positions: ColorPositions::new(),
        }
    }
}

/// Color keys are written as `"r,g,b"`; `"(r, g, b)"` is accepted on read.
/// Unparseable keys are dropped.
fn positions_to_json<S: Serializer>(positions: &ColorPositions, s: S) -> Result<S::Ok, S::Error> {
    let map: BTreeMap<String, DevicePoint> = positions
        .iter()
        .map(|(c, p)| (format!("{},{},{}", c.r, c.g, c.b), *p))
        .collect();
    map.serialize(s)
}

fn positions_from_json<'de, D: Deserializer<'de>>(d: D) -> Result<ColorPositions, D::Error> {
    let map = BTreeMap::<String, DevicePoint>::deserialize(d)?;
    Ok(map
        .into_iter()
        .filter_map(|(k, p)| k.parse::<Color>().ok().map(|c| (c, p)))
        .collect())
}

impl Settings {
    /// Read settings from `path`. A missing file gives the defaults. Fields
    /// that fail to parse are logged and fall back to their defaults while
    /// the rest of the file is kept. A file that cannot be read or is not a
    /// JSON object is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let err = match serde_json::from_str(&text) {
            Ok(settings) => return Ok(settings),
            Err(e) => e,
        };

        let Value::Object(mut fields) = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("parsing {}", path.display()))?
        else {
            bail!("{}: expected a JSON object", path.display());
        };
        logger::warn(&format!("settings {}: {}", path.display(), err));

        // With every field defaulted, a one-entry object parses exactly when
        // that entry is valid.
        fields.retain(|key, value| {
            let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
            match serde_json::from_value::<Settings>(single) {
                Ok(_) => true,
                Err(e) => {
                    logger::warn(&format!("settings field \"{}\" ignored: {}", key, e));
                    false
                }
            }
        });
        serde_json::from_value(Value::Object(fields))
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    /// Saved palette if any, else the target application's built-in one.
    pub fn palette(&self) -> Palette {
        if self.palette.is_empty() {
            Palette::builtin(&self.target_app)
        } else {
            Palette::new(self.palette.iter().copied())
        }
    }

    /// Record where each color sits in the target application, then the
    /// drawing area if `area` is set. Every capture reads the pointer after a
    /// `seconds` countdown; `say` receives the prompts.
    pub fn capture(
        &mut self,
        pointer: &dyn PointerActuator,
        colors: &[Color],
        area: bool,
        seconds: u32,
        sleeper: &mut dyn Sleeper,
        mut say: impl FnMut(&str),
    ) -> Result<()> {
        for &color in colors {
            let name = color_name(color);
            say(&format!("move the mouse onto {} in the palette", name));
            let p = capture_point(pointer, seconds, sleeper, |n| say(&format!("capturing in {}s", n)))?;
            if p == DevicePoint::new(0, 0) {
                logger::warn(&format!("{} captured at (0, 0), which is unusual", name));
            }
            say(&format!("{} is at ({}, {})", name, p.x, p.y));
            self.color_positions.insert(color, p);
        }
        if area {
            say("mark the drawing area: top-left corner first, then bottom-right");
            let region = capture_region(pointer, seconds, sleeper, |corner, n| {
                say(&format!("{} corner in {}s", corner.label(), n))
            })?;
            say(&format!("drawing area is {}", region));
            self.canvas_area = Some(region);
        }
        Ok(())
    }

    pub fn draw_request(&self) -> DrawRequest {
        let delay = Duration::try_from_secs_f64(self.speed.max(0.0)).unwrap_or_default();
        let mut request = DrawRequest {
            image: None,
            palette: Some(self.palette()),
            region: self.canvas_area,
            positions: self.color_positions.clone(),
            preprocess: PreprocessOptions {
                resolution: self.resolution,
                white_threshold: self.drawing.white_threshold,
                skip_background: self.drawing.skip_white,
                ..Default::default()
            },
            plan: PlanOptions { cell_size: self.drawing.cell_size, ..Default::default() },
            exec: ExecOptions { delay, progress_every: self.drawing.progress_every },
        };
        request.set_style(self.style);
        request
    }
}

/// Read a palette from `.json` (array of `[r, g, b]`) or `.csv` (`r,g,b` per
/// line, shorter lines ignored).
pub fn load_palette_file(path: &Path) -> Result<Palette> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading palette {}", path.display()))?;

    match ext.as_str() {
        "json" => {
            let colors: Vec<Color> = serde_json::from_str(&text)
                .with_context(|| format!("parsing palette {}", path.display()))?;
            Ok(Palette::new(colors))
        }
        "csv" => {
            let mut colors = Vec::new();
            for (n, line) in text.lines().enumerate() {
                let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
                if parts.len() < 3 {
                    continue;
                }
                let channel = |i: usize| -> Result<u8> {
                    parts[i]
                        .parse()
                        .with_context(|| format!("{} line {}: bad channel \"{}\"", path.display(), n + 1, parts[i]))
                };
                colors.push(Color::new(channel(0)?, channel(1)?, channel(2)?));
            }
            Ok(Palette::new(colors))
        }
        _ => bail!("unsupported palette file format: {}", path.display()),
    }
}
