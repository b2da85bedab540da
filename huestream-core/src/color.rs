//! Pure, stateless sRGB -> Hue gamut-constrained xy+brightness conversion
//!. Nothing in this module touches the network or any shared
//! state; every function is a plain transform over `f64`/`CiColor` values.

/// A chromaticity point with brightness in Hue's CIE xy color space.
///
/// Equality is exact triple-equality: the Light Model relies on this to skip
/// redundant `PUT`s when a newly computed color matches the one already
/// commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CiColor {
    pub x: f64,
    pub y: f64,
    pub bri: f64,
}

impl CiColor {
    pub const fn new(x: f64, y: f64, bri: f64) -> Self {
        CiColor { x, y, bri }
    }

    /// Replace NaN components with 0, as required after the gamma/XYZ
    /// transform on degenerate inputs.
    fn denanned(self) -> Self {
        CiColor {
            x: if self.x.is_nan() { 0.0 } else { self.x },
            y: if self.y.is_nan() { 0.0 } else { self.y },
            bri: if self.bri.is_nan() { 0.0 } else { self.bri },
        }
    }
}

/// Three vertices (red, green, blue) defining a bulb's reproducible gamut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CiColorTriangle {
    pub red: CiColor,
    pub green: CiColor,
    pub blue: CiColor,
}

impl CiColorTriangle {
    pub const fn new(red: CiColor, green: CiColor, blue: CiColor) -> Self {
        CiColorTriangle { red, green, blue }
    }

    /// `colorBlack`: the vertex that represents "off" within this gamut —
    /// the blue vertex with brightness forced to zero.
    pub fn color_black(&self) -> CiColor {
        CiColor::new(self.blue.x, self.blue.y, 0.0)
    }
}

/// Gamut A — original Hue bulbs (LCT001 and similar).
pub const GAMUT_A: CiColorTriangle = CiColorTriangle::new(
    CiColor::new(0.704, 0.296, 0.0),
    CiColor::new(0.2151, 0.7106, 0.0),
    CiColor::new(0.138, 0.08, 0.0),
);

/// Gamut B — second-generation bulbs (LCT007 / LCT010 and similar).
pub const GAMUT_B: CiColorTriangle = CiColorTriangle::new(
    CiColor::new(0.675, 0.322, 0.0),
    CiColor::new(0.409, 0.518, 0.0),
    CiColor::new(0.167, 0.04, 0.0),
);

/// Gamut C — current-generation bulbs (LCT015 / most LCT* and all LST/LLC*).
pub const GAMUT_C: CiColorTriangle = CiColorTriangle::new(
    CiColor::new(0.6915, 0.3083, 0.0),
    CiColor::new(0.17, 0.7, 0.0),
    CiColor::new(0.1532, 0.0475, 0.0),
);

/// The unrecognized-model fallback: a degenerate right triangle whose
/// inclusion test accepts any non-negative point summing <= 1, making
/// projection a no-op.
pub const GAMUT_UNKNOWN: CiColorTriangle = CiColorTriangle::new(
    CiColor::new(1.0, 0.0, 0.0),
    CiColor::new(0.0, 1.0, 0.0),
    CiColor::new(0.0, 0.0, 0.0),
);

/// Bridge-reported model identifiers grouped by gamut, taken verbatim from
/// `LedDevicePhilipsHue::GAMUT_A_MODEL_IDS`/`GAMUT_B_MODEL_IDS`/
/// `GAMUT_C_MODEL_IDS`.
const GAMUT_A_MODELS: &[&str] = &["LLC001", "LLC005", "LLC006", "LLC007", "LLC010", "LLC011", "LLC012", "LLC013", "LLC014", "LST001"];
const GAMUT_B_MODELS: &[&str] = &["LCT001", "LCT002", "LCT003", "LCT007", "LLM001"];
const GAMUT_C_MODELS: &[&str] = &["LLC020", "LST002", "LCT011", "LCT012", "LCT010", "LCT014", "LCT015", "LCT016", "LCT024"];

/// Resolves a bridge-reported model id to its gamut. Returns `None` when the
/// model is unrecognized; the caller (Light Model construction) falls back to
/// [`GAMUT_UNKNOWN`] and should surface [`crate::error::Event::UnknownModel`].
pub fn gamut_for_model(model_id: &str) -> Option<CiColorTriangle> {
    if GAMUT_A_MODELS.contains(&model_id) {
        Some(GAMUT_A)
    } else if GAMUT_B_MODELS.contains(&model_id) {
        Some(GAMUT_B)
    } else if GAMUT_C_MODELS.contains(&model_id) {
        Some(GAMUT_C)
    } else {
        None
    }
}

/// Barycentric inside-triangle test. Points exactly on an edge
/// are considered inside.
pub fn point_in_gamut(x: f64, y: f64, gamut: &CiColorTriangle) -> bool {
    let (rx, ry) = (gamut.red.x, gamut.red.y);
    let (gx, gy) = (gamut.green.x, gamut.green.y);
    let (bx, by) = (gamut.blue.x, gamut.blue.y);

    let v0x = gx - rx;
    let v0y = gy - ry;
    let v1x = bx - rx;
    let v1y = by - ry;
    let v2x = x - rx;
    let v2y = y - ry;

    let denom = v0x * v1y - v1x * v0y;
    if denom == 0.0 {
        return false;
    }

    let s = (v2x * v1y - v1x * v2y) / denom;
    let t = (v0x * v2y - v2x * v0y) / denom;

    s >= 0.0 && t >= 0.0 && (s + t) <= 1.0
}

fn closest_point_on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> (f64, f64) {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx) + ((py - ay) * dy)) / len_sq
    };
    let t = t.clamp(0.0, 1.0);

    (ax + t * dx, ay + t * dy)
}

fn distance_sq(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}

/// Projects an out-of-gamut chromaticity point onto the nearest point on the
/// gamut's perimeter. Edges are tried in the deterministic order
/// red->green, blue->red, green->blue, and ties keep the first candidate.
pub fn project_to_gamut(x: f64, y: f64, gamut: &CiColorTriangle) -> (f64, f64) {
    let candidates = [
        closest_point_on_segment(x, y, gamut.red.x, gamut.red.y, gamut.green.x, gamut.green.y),
        closest_point_on_segment(x, y, gamut.blue.x, gamut.blue.y, gamut.red.x, gamut.red.y),
        closest_point_on_segment(x, y, gamut.green.x, gamut.green.y, gamut.blue.x, gamut.blue.y),
    ];

    let mut best = candidates[0];
    let mut best_dist = distance_sq(x, y, best.0, best.1);

    for &(cx, cy) in &candidates[1..] {
        let d = distance_sq(x, y, cx, cy);
        if d < best_dist {
            best = (cx, cy);
            best_dist = d;
        }
    }

    best
}

fn gamma_expand(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

/// Converts an sRGB triple (each channel in `[0,1]`) to a [`CiColor`]
/// constrained to `gamut`.
pub fn srgb_to_cie(r: f64, g: f64, b: f64, gamut: &CiColorTriangle) -> CiColor {
    if r + g + b == 0.0 {
        return CiColor::new(0.0, 0.0, 0.0);
    }

    let rl = gamma_expand(r);
    let gl = gamma_expand(g);
    let bl = gamma_expand(b);

    let xx = 0.664511 * rl + 0.154324 * gl + 0.162028 * bl;
    let yy = 0.283881 * rl + 0.668433 * gl + 0.047685 * bl;
    let zz = 0.000088 * rl + 0.072310 * gl + 0.986039 * bl;

    let sum = xx + yy + zz;
    let (cx, cy) = if sum == 0.0 {
        (0.0, 0.0)
    } else {
        (xx / sum, yy / sum)
    };
    let bri = rl.max(gl).max(bl);

    let color = CiColor::new(cx, cy, bri).denanned();

    if point_in_gamut(color.x, color.y, gamut) {
        color
    } else {
        let (px, py) = project_to_gamut(color.x, color.y, gamut);
        CiColor::new(px, py, color.bri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rgb_grid() -> impl Iterator<Item = (f64, f64, f64)> {
        (0..=8).flat_map(move |ri| {
            (0..=8).flat_map(move |gi| {
                (0..=8).map(move |bi| (ri as f64 / 8.0, gi as f64 / 8.0, bi as f64 / 8.0))
            })
        })
    }

    #[test]
    fn black_is_exact_zero() {
        for gamut in [GAMUT_A, GAMUT_B, GAMUT_C, GAMUT_UNKNOWN] {
            assert_eq!(srgb_to_cie(0.0, 0.0, 0.0, &gamut), CiColor::new(0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn output_always_inside_gamut_and_finite() {
        for gamut in [GAMUT_A, GAMUT_B, GAMUT_C] {
            for (r, g, b) in sample_rgb_grid() {
                let c = srgb_to_cie(r, g, b, &gamut);
                assert!(!c.x.is_nan() && !c.y.is_nan() && !c.bri.is_nan());
                assert!(point_in_gamut(c.x, c.y, &gamut), "{:?} outside {:?}", c, gamut);
            }
        }
    }

    #[test]
    fn projection_is_idempotent_for_interior_points() {
        let gamut = GAMUT_B;
        // Centroid of the triangle is always interior.
        let cx = (gamut.red.x + gamut.green.x + gamut.blue.x) / 3.0;
        let cy = (gamut.red.y + gamut.green.y + gamut.blue.y) / 3.0;
        assert!(point_in_gamut(cx, cy, &gamut));

        let (px, py) = project_to_gamut(cx, cy, &gamut);
        // Idempotent only applies when the projector is invoked on a point
        // already inside; since srgb_to_cie only projects outside points,
        // we verify project_to_gamut returns a point on-perimeter closer or
        // equal, and re-projecting that perimeter point is a fixed point.
        let (px2, py2) = project_to_gamut(px, py, &gamut);
        assert_eq!((px, py), (px2, py2));
    }

    #[test]
    fn gamut_a_magenta_projection() {
        // Magenta (1,0,1) against Gamut A. The linearized chromaticity
        // (0.38547088..., 0.15463159...) falls outside Gamut A; the
        // blue->red edge is strictly closest among the three candidates
        // (squared distances ~0.0985, ~0.000343, ~0.0560), so the nearest
        // point on that edge is the expected projection.
        let c = srgb_to_cie(1.0, 0.0, 1.0, &GAMUT_A);
        assert!((c.bri - 1.0).abs() < 1e-9);
        assert!((c.x - 0.378_872_073_132_121_96).abs() < 1e-6);
        assert!((c.y - 0.171_922_911_301_304_5).abs() < 1e-6);
        assert!(point_in_gamut(c.x, c.y, &GAMUT_A));
    }

    #[test]
    fn unknown_gamut_is_permissive() {
        // Any point with non-negative coords summing <= 1 is "inside" the
        // degenerate fallback triangle, so srgb_to_cie never projects there.
        assert!(point_in_gamut(0.3, 0.3, &GAMUT_UNKNOWN));
        assert!(!point_in_gamut(0.9, 0.9, &GAMUT_UNKNOWN));
    }

    #[test]
    fn gamut_lookup_known_models() {
        assert_eq!(gamut_for_model("LCT015"), Some(GAMUT_C));
        assert_eq!(gamut_for_model("LCT001"), Some(GAMUT_B));
        assert_eq!(gamut_for_model("LLC001"), Some(GAMUT_A));
        assert_eq!(gamut_for_model("totally-unknown"), None);
    }
}
