//! Response mappings and area mappings.
//!
//! A [`Mapping`] turns response keys into numeric contributions; an
//! [`AreaMapping`] does the same for points falling inside shapes. Both sum
//! their contributions and clamp the total to optional bounds.

use serde::{Deserialize, Serialize};

use crate::value::{Scalar, Value};

// ──────────────────────────────────────────────
// Mapping
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub map_key: String,
    pub mapped_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub default_value: f64,
    #[serde(default)]
    pub entries: Vec<MapEntry>,
    #[serde(default)]
    pub lower_bound: Option<f64>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Mapping {
    fn default() -> Self {
        Mapping {
            default_value: 0.0,
            entries: Vec::new(),
            lower_bound: None,
            upper_bound: None,
            case_sensitive: true,
        }
    }
}

impl Mapping {
    pub fn new(default_value: f64) -> Self {
        Mapping {
            default_value,
            ..Mapping::default()
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: f64) -> Self {
        self.entries.push(MapEntry {
            map_key: key.into(),
            mapped_value: value,
        });
        self
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    /// Value of the first entry whose key matches, if any.
    ///
    /// Textual keys compare as text, folded when the mapping is case
    /// insensitive. Every other key is parsed to the response's base type
    /// and compared as a scalar, so `"2"` matches a float `2.0`.
    pub fn lookup(&self, scalar: &Scalar) -> Option<f64> {
        let matched = match scalar {
            Scalar::String(s) | Scalar::Identifier(s) | Scalar::Uri(s) => {
                let key = normalize(s, self.case_sensitive);
                self.entries
                    .iter()
                    .find(|e| normalize(&e.map_key, self.case_sensitive) == key)
            }
            _ => self.entries.iter().find(|e| {
                Scalar::parse(scalar.base_type(), &e.map_key)
                    .is_some_and(|entry| entry.matches(scalar))
            }),
        };
        matched.map(|e| e.mapped_value)
    }

    /// Map a whole response value.
    ///
    /// Each distinct scalar contributes once; unmatched scalars contribute
    /// the default. An absent or invalid source yields the default.
    pub fn apply(&self, value: &Value) -> f64 {
        if value.is_missing() {
            return self.clamp(self.default_value);
        }
        let mut seen: Vec<&Scalar> = Vec::new();
        let mut total = 0.0;
        for scalar in value.scalars() {
            if seen.iter().any(|s| s.matches(scalar)) {
                continue;
            }
            seen.push(scalar);
            total += self.lookup(scalar).unwrap_or(self.default_value);
        }
        self.clamp(total)
    }

    pub fn clamp(&self, v: f64) -> f64 {
        clamp(v, self.lower_bound, self.upper_bound)
    }
}

fn normalize(key: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        key.to_string()
    } else {
        key.to_lowercase()
    }
}

fn clamp(v: f64, lower: Option<f64>, upper: Option<f64>) -> f64 {
    let v = match lower {
        Some(lo) if v < lo => lo,
        _ => v,
    };
    match upper {
        Some(hi) if v > hi => hi,
        _ => v,
    }
}

// ──────────────────────────────────────────────
// Shapes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Rect,
    Poly,
    Ellipse,
    Default,
}

impl Shape {
    /// Hit test against a comma-separated coordinate string.
    ///
    /// Malformed coordinates never match. Rectangle and circle edges count
    /// as inside.
    pub fn contains(&self, coords: &str, x: f64, y: f64) -> bool {
        if *self == Shape::Default {
            return true;
        }
        let Some(c) = parse_coords(coords) else {
            return false;
        };
        match self {
            Shape::Circle if c.len() == 3 => {
                let (dx, dy) = (x - c[0], y - c[1]);
                dx * dx + dy * dy <= c[2] * c[2]
            }
            Shape::Rect if c.len() == 4 => {
                let (left, right) = (c[0].min(c[2]), c[0].max(c[2]));
                let (top, bottom) = (c[1].min(c[3]), c[1].max(c[3]));
                x >= left && x <= right && y >= top && y <= bottom
            }
            Shape::Ellipse if c.len() == 4 => {
                if c[2] == 0.0 || c[3] == 0.0 {
                    return false;
                }
                let (dx, dy) = ((x - c[0]) / c[2], (y - c[1]) / c[3]);
                dx * dx + dy * dy <= 1.0
            }
            Shape::Poly if c.len() >= 6 && c.len() % 2 == 0 => {
                let pts: Vec<(f64, f64)> = c.chunks(2).map(|p| (p[0], p[1])).collect();
                point_in_polygon(&pts, x, y)
            }
            _ => false,
        }
    }
}

fn parse_coords(coords: &str) -> Option<Vec<f64>> {
    coords
        .split(',')
        .map(|c| c.trim().parse::<f64>().ok())
        .collect()
}

fn point_in_polygon(pts: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (xi, yi) = pts[i];
        let (xj, yj) = pts[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ──────────────────────────────────────────────
// Area mapping
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMapEntry {
    pub shape: Shape,
    pub coords: String,
    pub mapped_value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AreaMapping {
    #[serde(default)]
    pub default_value: f64,
    #[serde(default)]
    pub entries: Vec<AreaMapEntry>,
    #[serde(default)]
    pub lower_bound: Option<f64>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

impl AreaMapping {
    pub fn new(default_value: f64) -> Self {
        AreaMapping {
            default_value,
            ..AreaMapping::default()
        }
    }

    pub fn with_area(mut self, shape: Shape, coords: impl Into<String>, value: f64) -> Self {
        self.entries.push(AreaMapEntry {
            shape,
            coords: coords.into(),
            mapped_value: value,
        });
        self
    }

    /// Map point responses.
    ///
    /// Each area contributes once however many points hit it; a point that
    /// hits no area contributes the default.
    pub fn apply(&self, value: &Value) -> f64 {
        if value.is_missing() {
            return clamp(self.default_value, self.lower_bound, self.upper_bound);
        }
        let mut hit = vec![false; self.entries.len()];
        let mut total = 0.0;
        for scalar in value.scalars() {
            let Scalar::Point(x, y) = scalar else {
                continue;
            };
            let mut any = false;
            for (i, area) in self.entries.iter().enumerate() {
                if area.shape.contains(&area.coords, *x as f64, *y as f64) {
                    any = true;
                    if !hit[i] {
                        hit[i] = true;
                        total += area.mapped_value;
                    }
                    break;
                }
            }
            if !any {
                total += self.default_value;
            }
        }
        clamp(total, self.lower_bound, self.upper_bound)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
