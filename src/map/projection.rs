//! Named map projections.
//!
//! Every projection maps `(lon, lat)` in degrees to planar `(x, y)` expressed in
//! degree-scaled units (unit-sphere radians times 180/π), so all projections share
//! the magnitude of the identity `wsg84` projection. Points outside a projection's
//! domain come back as `NaN`.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::map::globe::OrthographicFrame;

const DEG: f64 = 180.0 / PI;
const RAD: f64 = PI / 180.0;

/// Projection identifiers understood by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// Plain longitude/latitude, the identity projection.
    #[default]
    Wsg84,
    Equirectangular,
    Mercator,
    Orthographic,
    Robinson,
    Wagner6,
    Eckert1,
    Eckert3,
    Hammer,
    Aitoff,
    Bonne,
    Fahey,
    August,
}

impl Crs {
    pub const ALL: [Crs; 13] = [
        Crs::Wsg84,
        Crs::Equirectangular,
        Crs::Mercator,
        Crs::Orthographic,
        Crs::Robinson,
        Crs::Wagner6,
        Crs::Eckert1,
        Crs::Eckert3,
        Crs::Hammer,
        Crs::Aitoff,
        Crs::Bonne,
        Crs::Fahey,
        Crs::August,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Crs::Wsg84 => "wsg84",
            Crs::Equirectangular => "equirectangular",
            Crs::Mercator => "mercator",
            Crs::Orthographic => "orthographic",
            Crs::Robinson => "robinson",
            Crs::Wagner6 => "wagner6",
            Crs::Eckert1 => "eckert1",
            Crs::Eckert3 => "eckert3",
            Crs::Hammer => "hammer",
            Crs::Aitoff => "aitoff",
            Crs::Bonne => "bonne",
            Crs::Fahey => "fahey",
            Crs::August => "august",
        }
    }

    /// The crs after this one in [`Crs::ALL`], wrapping around.
    pub fn next(self) -> Crs {
        let pos = Crs::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Crs::ALL[(pos + 1) % Crs::ALL.len()]
    }

    pub fn projection(self) -> Projection {
        Projection::Single(self)
    }

    /// Forward projection, output in degree-scaled units.
    pub fn forward(self, lon: f64, lat: f64) -> (f64, f64) {
        if !lon.is_finite() || !lat.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        match self {
            Crs::Wsg84 | Crs::Equirectangular => (lon, lat),
            Crs::Orthographic => match OrthographicFrame::default().project(lon, lat) {
                Some((x, y)) => (x * DEG, y * DEG),
                None => (f64::NAN, f64::NAN),
            },
            _ => {
                let (x, y) = raw_forward(self, lon * RAD, lat * RAD);
                (x * DEG, y * DEG)
            }
        }
    }

    /// Inverse projection, back to degrees.
    pub fn invert(self, x: f64, y: f64) -> (f64, f64) {
        if !x.is_finite() || !y.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        match self {
            Crs::Wsg84 | Crs::Equirectangular => (x, y),
            Crs::Orthographic => match OrthographicFrame::default().unproject(x * RAD, y * RAD) {
                Some(lonlat) => lonlat,
                None => (f64::NAN, f64::NAN),
            },
            _ => {
                let (lambda, phi) = raw_invert(self, x * RAD, y * RAD);
                (lambda * DEG, phi * DEG)
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Crs {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let crs = match normalized.as_str() {
            "" | "wsg84" | "wgs84" | "base" | "none" | "null" | "undefined"
            | "+proj=longlat +datum=wgs84 +no_defs" => Crs::Wsg84,
            "equirectangular" => Crs::Equirectangular,
            "mercator" => Crs::Mercator,
            "orthographic" => Crs::Orthographic,
            "robinson" => Crs::Robinson,
            "wagner6" | "wagner" => Crs::Wagner6,
            "eckert1" => Crs::Eckert1,
            "eckert3" => Crs::Eckert3,
            "hammer" | "hammeraitoff" | "hammer-aitoff" => Crs::Hammer,
            "aitoff" => Crs::Aitoff,
            "bonne" => Crs::Bonne,
            "fahey" => Crs::Fahey,
            "august" => Crs::August,
            _ => return Err(MapError::UnknownProjection(s.to_string())),
        };
        Ok(crs)
    }
}

impl TryFrom<String> for Crs {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.name().to_string()
    }
}

/// Look up a projection by name, accepting the usual aliases.
pub fn resolve(name: &str) -> Result<Crs> {
    name.parse()
}

/// A projection in use by a transform record: either a single named projection
/// or a blend of two used while animating between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Single(Crs),
    Twin(TwinProjection),
}

impl Projection {
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Single(crs) => crs.forward(lon, lat),
            Projection::Twin(twin) => twin.forward(lon, lat),
        }
    }

    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Single(crs) => crs.invert(x, y),
            Projection::Twin(twin) => twin.invert(x, y),
        }
    }

    /// The crs this projection settles on.
    pub fn target(&self) -> Crs {
        match self {
            Projection::Single(crs) => *crs,
            Projection::Twin(twin) => twin.destination,
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Single(Crs::Wsg84)
    }
}

/// Linear blend of two projections. `ratio = 0` is the source, `ratio = 1` the
/// destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwinProjection {
    pub source: Crs,
    pub destination: Crs,
    pub ratio: f64,
}

impl TwinProjection {
    pub fn new(source: Crs, destination: Crs, ratio: f64) -> Self {
        Self {
            source,
            destination,
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        if self.ratio <= 0.0 {
            return self.source.forward(lon, lat);
        }
        if self.ratio >= 1.0 {
            return self.destination.forward(lon, lat);
        }
        let (x0, y0) = self.source.forward(lon, lat);
        let (x1, y1) = self.destination.forward(lon, lat);
        let t = self.ratio;
        (x0 + (x1 - x0) * t, y0 + (y1 - y0) * t)
    }

    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        if self.ratio <= 0.0 {
            return self.source.invert(x, y);
        }
        if self.ratio >= 1.0 {
            return self.destination.invert(x, y);
        }
        let guess = self.source.invert(x, y);
        let guess = if guess.0.is_finite() && guess.1.is_finite() { guess } else { (x, y) };
        let solved = newton_invert(
            |lambda, phi| {
                let (px, py) = self.forward(lambda * DEG, phi * DEG);
                (px * RAD, py * RAD)
            },
            x * RAD,
            y * RAD,
            (guess.0 * RAD, guess.1 * RAD),
        );
        (solved.0 * DEG, solved.1 * DEG)
    }
}

// Robinson table, 5° latitude steps: parallel length and distance from equator.
const ROBINSON_X: [f64; 19] = [
    1.0000, 0.9986, 0.9954, 0.9900, 0.9822, 0.9730, 0.9600, 0.9427, 0.9216, 0.8962, 0.8679,
    0.8350, 0.7986, 0.7597, 0.7186, 0.6732, 0.6213, 0.5722, 0.5322,
];
const ROBINSON_Y: [f64; 19] = [
    0.0000, 0.0620, 0.1240, 0.1860, 0.2480, 0.3100, 0.3720, 0.4340, 0.4958, 0.5571, 0.6176,
    0.6769, 0.7346, 0.7903, 0.8435, 0.8936, 0.9394, 0.9761, 1.0000,
];
const ROBINSON_XS: f64 = 0.8487;
const ROBINSON_YS: f64 = 1.3523;

const BONNE_PARALLEL: f64 = FRAC_PI_4;

fn eckert1_k() -> f64 {
    2.0 * (2.0 / (3.0 * PI)).sqrt()
}

fn eckert3_k() -> f64 {
    (PI * (4.0 + PI)).sqrt()
}

fn fahey_k() -> f64 {
    35f64.to_radians().cos()
}

/// Unit-sphere forward projection in radians.
fn raw_forward(crs: Crs, lambda: f64, phi: f64) -> (f64, f64) {
    if phi.abs() > FRAC_PI_2 + 1e-12 {
        return (f64::NAN, f64::NAN);
    }
    match crs {
        Crs::Wsg84 | Crs::Equirectangular | Crs::Orthographic => (lambda, phi),
        Crs::Mercator => {
            if phi.abs() >= FRAC_PI_2 - 1e-9 {
                return (f64::NAN, f64::NAN);
            }
            (lambda, (FRAC_PI_4 + phi / 2.0).tan().ln())
        }
        Crs::Robinson => {
            let (px, py) = robinson_table(phi.abs());
            (ROBINSON_XS * px * lambda, ROBINSON_YS * py * phi.signum())
        }
        Crs::Wagner6 => {
            let t = phi / PI;
            (lambda * (1.0 - 3.0 * t * t).sqrt(), phi)
        }
        Crs::Eckert1 => {
            let k = eckert1_k();
            (k * lambda * (1.0 - phi.abs() / PI), k * phi)
        }
        Crs::Eckert3 => {
            let k = eckert3_k();
            let t = 2.0 * phi / PI;
            (2.0 / k * lambda * (1.0 + (1.0 - t * t).max(0.0).sqrt()), 4.0 / k * phi)
        }
        Crs::Hammer => {
            let cos_phi = phi.cos();
            let half = lambda / 2.0;
            let d = (1.0 + cos_phi * half.cos()).sqrt();
            if d < 1e-12 {
                return (f64::NAN, f64::NAN);
            }
            (2.0 * 2f64.sqrt() * cos_phi * half.sin() / d, 2f64.sqrt() * phi.sin() / d)
        }
        Crs::Aitoff => {
            let cos_phi = phi.cos();
            let half = lambda / 2.0;
            let alpha = (cos_phi * half.cos()).clamp(-1.0, 1.0).acos();
            let sinc = if alpha.abs() < 1e-12 { 1.0 } else { alpha.sin() / alpha };
            (2.0 * cos_phi * half.sin() / sinc, phi.sin() / sinc)
        }
        Crs::Bonne => {
            let cot1 = 1.0 / BONNE_PARALLEL.tan();
            let rho = cot1 + BONNE_PARALLEL - phi;
            let e = if rho.abs() < 1e-12 { 0.0 } else { lambda * phi.cos() / rho };
            (rho * e.sin(), cot1 - rho * e.cos() + BONNE_PARALLEL)
        }
        Crs::Fahey => {
            let k = fahey_k();
            let t = (phi / 2.0).tan();
            (lambda * k * (1.0 - t * t).max(0.0).sqrt(), (1.0 + k) * t)
        }
        Crs::August => {
            let tan_phi = (phi / 2.0).tan();
            let k = (1.0 - tan_phi * tan_phi).max(0.0).sqrt();
            let half = lambda / 2.0;
            let c = 1.0 + k * half.cos();
            let x = half.sin() * k / c;
            let y = tan_phi / c;
            let (x2, y2) = (x * x, y * y);
            (4.0 / 3.0 * x * (3.0 + x2 - 3.0 * y2), 4.0 / 3.0 * y * (3.0 + 3.0 * x2 - y2))
        }
    }
}

/// Unit-sphere inverse projection in radians.
fn raw_invert(crs: Crs, x: f64, y: f64) -> (f64, f64) {
    match crs {
        Crs::Wsg84 | Crs::Equirectangular | Crs::Orthographic => (x, y),
        Crs::Mercator => (x, 2.0 * y.exp().atan() - FRAC_PI_2),
        Crs::Robinson => {
            let ay = (y / ROBINSON_YS).abs();
            if ay > 1.0 + 1e-12 {
                return (f64::NAN, f64::NAN);
            }
            let phi = robinson_latitude(ay.min(1.0)) * y.signum();
            let (px, _) = robinson_table(phi.abs());
            (x / (ROBINSON_XS * px), phi)
        }
        Crs::Wagner6 => {
            let t = y / PI;
            let s = 1.0 - 3.0 * t * t;
            if s <= 0.0 {
                return (f64::NAN, f64::NAN);
            }
            (x / s.sqrt(), y)
        }
        Crs::Eckert1 => {
            let k = eckert1_k();
            let phi = y / k;
            let s = 1.0 - phi.abs() / PI;
            if s <= 0.0 {
                return (f64::NAN, f64::NAN);
            }
            (x / (k * s), phi)
        }
        Crs::Eckert3 => {
            let k = eckert3_k();
            let phi = y * k / 4.0;
            let t = 2.0 * phi / PI;
            if t.abs() > 1.0 {
                return (f64::NAN, f64::NAN);
            }
            (x * k / (2.0 * (1.0 + (1.0 - t * t).sqrt())), phi)
        }
        Crs::Hammer => {
            let zz = 1.0 - (x / 4.0).powi(2) - (y / 2.0).powi(2);
            if zz < 0.5 - 1e-12 {
                return (f64::NAN, f64::NAN);
            }
            let z = zz.sqrt();
            (2.0 * (z * x).atan2(2.0 * (2.0 * zz - 1.0)), (z * y).clamp(-1.0, 1.0).asin())
        }
        Crs::Bonne => {
            let cot1 = 1.0 / BONNE_PARALLEL.tan();
            let yy = cot1 - (y - BONNE_PARALLEL);
            let rho = (x * x + yy * yy).sqrt();
            let phi = cot1 + BONNE_PARALLEL - rho;
            let cos_phi = phi.cos();
            if cos_phi.abs() < 1e-12 {
                return (0.0, phi);
            }
            (rho * x.atan2(yy) / cos_phi, phi)
        }
        Crs::Fahey => {
            let k = fahey_k();
            let t = y / (1.0 + k);
            let s = 1.0 - t * t;
            if s <= 0.0 {
                return (f64::NAN, f64::NAN);
            }
            (x / (k * s.sqrt()), 2.0 * t.atan())
        }
        Crs::Aitoff | Crs::August => {
            // Both are close to the identity near the origin; fall back to
            // smaller starting points when the direct guess diverges.
            for guess in [(x, y), (x / 2.0, y / 2.0), (0.0, 0.0)] {
                let guess = (guess.0, guess.1.clamp(-1.4, 1.4));
                let solved = newton_invert(|lambda, phi| raw_forward(crs, lambda, phi), x, y, guess);
                if solved.0.is_finite() {
                    return solved;
                }
            }
            (f64::NAN, f64::NAN)
        }
    }
}

/// Interpolated Robinson table lookup for |phi| in radians.
fn robinson_table(abs_phi: f64) -> (f64, f64) {
    let deg = (abs_phi * DEG).clamp(0.0, 90.0);
    let i = ((deg / 5.0).floor() as usize).min(17);
    let t = (deg - i as f64 * 5.0) / 5.0;
    let x = ROBINSON_X[i] + (ROBINSON_X[i + 1] - ROBINSON_X[i]) * t;
    let y = ROBINSON_Y[i] + (ROBINSON_Y[i + 1] - ROBINSON_Y[i]) * t;
    (x, y)
}

/// Inverse of the Robinson Y column, exact for the piecewise-linear table.
fn robinson_latitude(ay: f64) -> f64 {
    let i = ROBINSON_Y
        .windows(2)
        .position(|w| ay <= w[1])
        .unwrap_or(17);
    let span = ROBINSON_Y[i + 1] - ROBINSON_Y[i];
    let t = if span > 0.0 { (ay - ROBINSON_Y[i]) / span } else { 0.0 };
    (i as f64 + t) * 5.0 * RAD
}

/// Solve `f(lambda, phi) = (x, y)` with damped Newton steps and a numeric Jacobian.
fn newton_invert(f: impl Fn(f64, f64) -> (f64, f64), x: f64, y: f64, guess: (f64, f64)) -> (f64, f64) {
    const H: f64 = 1e-7;
    let (mut lambda, mut phi) = guess;
    phi = phi.clamp(-FRAC_PI_2, FRAC_PI_2);

    let residual = |lambda: f64, phi: f64| {
        let (fx, fy) = f(lambda, phi);
        (fx - x, fy - y)
    };
    let norm = |(a, b): (f64, f64)| (a * a + b * b).sqrt();

    let mut r = residual(lambda, phi);
    for _ in 0..60 {
        let err = norm(r);
        if !err.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        if err < 1e-13 {
            break;
        }

        let (fx1, fy1) = f(lambda + H, phi);
        let (fx0, fy0) = f(lambda - H, phi);
        let (gx1, gy1) = f(lambda, (phi + H).min(FRAC_PI_2));
        let (gx0, gy0) = f(lambda, (phi - H).max(-FRAC_PI_2));
        let dphi_span = (phi + H).min(FRAC_PI_2) - (phi - H).max(-FRAC_PI_2);

        let j11 = (fx1 - fx0) / (2.0 * H);
        let j21 = (fy1 - fy0) / (2.0 * H);
        let j12 = (gx1 - gx0) / dphi_span;
        let j22 = (gy1 - gy0) / dphi_span;
        let det = j11 * j22 - j12 * j21;
        if det.abs() < 1e-15 || !det.is_finite() {
            return (f64::NAN, f64::NAN);
        }

        let step_l = (j22 * r.0 - j12 * r.1) / det;
        let step_p = (j11 * r.1 - j21 * r.0) / det;

        // Halve the step until the residual shrinks.
        let mut scale = 1.0;
        loop {
            let nl = lambda - step_l * scale;
            let np = (phi - step_p * scale).clamp(-FRAC_PI_2, FRAC_PI_2);
            let nr = residual(nl, np);
            if norm(nr) < err || scale < 1e-4 {
                lambda = nl;
                phi = np;
                r = nr;
                break;
            }
            scale /= 2.0;
        }
    }

    if norm(r) > 1e-9 {
        return (f64::NAN, f64::NAN);
    }
    (lambda, phi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_domain(crs: Crs) -> Vec<(f64, f64)> {
        let lon_span = match crs {
            Crs::Orthographic => 80.0,
            _ => 150.0,
        };
        let mut points = Vec::new();
        let mut lon = -lon_span;
        while lon <= lon_span {
            for lat in [-60.0, -35.0, -10.0, 0.0, 20.0, 45.0, 60.0] {
                points.push((lon, lat));
            }
            lon += lon_span / 3.0;
        }
        points
    }

    #[test]
    fn test_every_projection_inverts() {
        for crs in Crs::ALL {
            for (lon, lat) in sample_domain(crs) {
                let (x, y) = crs.forward(lon, lat);
                assert!(x.is_finite() && y.is_finite(), "{crs} forward({lon}, {lat})");
                let (lon2, lat2) = crs.invert(x, y);
                assert!(
                    (lon - lon2).abs() < 1e-6 && (lat - lat2).abs() < 1e-6,
                    "{crs}: ({lon}, {lat}) came back as ({lon2}, {lat2})"
                );
            }
        }
    }

    #[test]
    fn test_origin_maps_to_origin() {
        for crs in Crs::ALL {
            let (x, y) = crs.forward(0.0, 0.0);
            assert!(x.abs() < 1e-9 && y.abs() < 1e-9, "{crs} -> ({x}, {y})");
        }
    }

    #[test]
    fn test_aliases_normalize() {
        assert_eq!(resolve("hammer-aitoff").unwrap(), Crs::Hammer);
        assert_eq!(resolve("HammerAitoff").unwrap(), Crs::Hammer);
        assert_eq!(resolve("wagner").unwrap(), Crs::Wagner6);
        assert_eq!(resolve("+proj=longlat +datum=WGS84 +no_defs").unwrap(), Crs::Wsg84);
        assert_eq!(resolve("none").unwrap(), Crs::Wsg84);
        assert!(matches!(resolve("lambert"), Err(MapError::UnknownProjection(_))));
    }

    #[test]
    fn test_outside_domain_is_nan() {
        let (x, _) = Crs::Orthographic.forward(170.0, 0.0);
        assert!(x.is_nan());
        let (x, _) = Crs::Mercator.forward(0.0, 90.0);
        assert!(x.is_nan());
        let (lon, _) = Crs::Hammer.invert(400.0, 400.0);
        assert!(lon.is_nan());
    }

    #[test]
    fn test_twin_blends_linearly() {
        let twin = TwinProjection::new(Crs::Wsg84, Crs::Mercator, 0.5);
        let (x0, y0) = Crs::Wsg84.forward(20.0, 40.0);
        let (x1, y1) = Crs::Mercator.forward(20.0, 40.0);
        let (x, y) = twin.forward(20.0, 40.0);
        assert!((x - (x0 + x1) / 2.0).abs() < 1e-12);
        assert!((y - (y0 + y1) / 2.0).abs() < 1e-12);

        let (lon, lat) = twin.invert(x, y);
        assert!((lon - 20.0).abs() < 1e-6 && (lat - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_twin_ends_match_single_projections() {
        let start = Projection::Twin(TwinProjection::new(Crs::Robinson, Crs::Bonne, 0.0));
        let end = Projection::Twin(TwinProjection::new(Crs::Robinson, Crs::Bonne, 1.0));
        assert_eq!(start.forward(10.0, 10.0), Crs::Robinson.forward(10.0, 10.0));
        assert_eq!(end.forward(10.0, 10.0), Crs::Bonne.forward(10.0, 10.0));
        assert_eq!(end.target(), Crs::Bonne);
    }

    #[test]
    fn test_crs_serde_uses_names() {
        let json = serde_json::to_string(&Crs::Wagner6).unwrap();
        assert_eq!(json, "\"wagner6\"");
        let crs: Crs = serde_json::from_str("\"hammer-aitoff\"").unwrap();
        assert_eq!(crs, Crs::Hammer);
        assert!(serde_json::from_str::<Crs>("\"lambert\"").is_err());
    }
}
