//! Minimal retained vector model: layers of paths with a 2D affine transform.
//!
//! The chart only needs to create paths and layers, set a layer transform,
//! query bounds with and without that transform, order layers by z-index and
//! hit-test paths. Rasterising is the renderer's job.

use glam::{DAffine2, DVec2};

use crate::geo::Rect;

/// Handle of a path inside its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub commands: Vec<PathCommand>,
    pub visible: bool,
    /// Palette bucket used to fill the path.
    pub fill: Option<u8>,
    /// Outline drawn when set.
    pub stroke: bool,
    /// Owner of the path, usually a feature id.
    pub tag: Option<String>,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            visible: true,
            fill: None,
            stroke: true,
            tag: None,
        }
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::new()
        }
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.commands.push(PathCommand::MoveTo(x, y));
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.commands.push(PathCommand::LineTo(x, y));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append a flat coordinate array as one subpath, splitting on NaN.
    pub fn append_flat(&mut self, flat: &[f64], closed: bool, to_px: impl Fn(f64, f64) -> (f64, f64)) {
        let mut pen_down = false;
        for pair in flat.chunks_exact(2) {
            let (x, y) = to_px(pair[0], pair[1]);
            if !x.is_finite() || !y.is_finite() {
                pen_down = false;
                continue;
            }
            if pen_down {
                self.line_to(x, y);
            } else {
                self.move_to(x, y);
                pen_down = true;
            }
        }
        if closed && pen_down {
            self.close();
        }
    }

    /// Axis-aligned bounds of all points, `None` for an empty path.
    pub fn bounds(&self) -> Option<Rect> {
        let mut min = DVec2::splat(f64::MAX);
        let mut max = DVec2::splat(f64::MIN);
        let mut any = false;
        for command in &self.commands {
            if let PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) = *command {
                let p = DVec2::new(x, y);
                min = min.min(p);
                max = max.max(p);
                any = true;
            }
        }
        any.then(|| Rect::from_corners(min.x, min.y, max.x, max.y))
    }

    /// Points of each subpath.
    pub fn subpaths(&self) -> Vec<Vec<DVec2>> {
        let mut out: Vec<Vec<DVec2>> = Vec::new();
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(x, y) => out.push(vec![DVec2::new(x, y)]),
                PathCommand::LineTo(x, y) => match out.last_mut() {
                    Some(current) => current.push(DVec2::new(x, y)),
                    None => out.push(vec![DVec2::new(x, y)]),
                },
                PathCommand::Close => {
                    if let Some(first) = out.last().and_then(|s| s.first().copied()) {
                        if let Some(current) = out.last_mut() {
                            current.push(first);
                        }
                    }
                }
            }
        }
        out
    }

    /// Even-odd fill test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in self.subpaths() {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            let mut j = n - 1;
            for i in 0..n {
                let (a, b) = (ring[i], ring[j]);
                if (a.y > y) != (b.y > y) && x < (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

/// A group of paths sharing one transform.
#[derive(Debug, Clone)]
pub struct Layer {
    transform: DAffine2,
    z_index: i32,
    visible: bool,
    clip: Option<Rect>,
    elements: Vec<Path>,
}

impl Default for Layer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Layer {
    pub fn new(z_index: i32) -> Self {
        Self {
            transform: DAffine2::IDENTITY,
            z_index,
            visible: true,
            clip: None,
            elements: Vec::new(),
        }
    }

    /// Matrix components `[a, b, c, d, e, f]`: x' = a·x + c·y + e, y' = b·x + d·y + f.
    pub fn set_transformation_matrix(&mut self, m: [f64; 6]) {
        self.transform = DAffine2::from_cols_array(&m);
    }

    pub fn transformation_matrix(&self) -> [f64; 6] {
        self.transform.to_cols_array()
    }

    pub fn transform(&self) -> DAffine2 {
        self.transform
    }

    /// Layer-local point to screen.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.transform.transform_point2(DVec2::new(x, y));
        (p.x, p.y)
    }

    /// Screen point to layer-local.
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.transform.inverse().transform_point2(DVec2::new(x, y));
        (p.x, p.y)
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }

    pub fn add(&mut self, path: Path) -> ElementId {
        self.elements.push(path);
        ElementId(self.elements.len() - 1)
    }

    pub fn get(&self, id: ElementId) -> Option<&Path> {
        self.elements.get(id.0)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Path> {
        self.elements.get_mut(id.0)
    }

    pub fn elements(&self) -> &[Path] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Path] {
        &mut self.elements
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bounds of the visible content in layer-local coordinates.
    pub fn bounds_without_transform(&self) -> Option<Rect> {
        self.elements
            .iter()
            .filter(|p| p.visible)
            .filter_map(Path::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Bounds of the visible content on screen.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds_without_transform().map(|r| self.transform_rect(&r))
    }

    /// Screen bounds of one element.
    pub fn element_bounds(&self, id: ElementId) -> Option<Rect> {
        self.get(id)?.bounds().map(|r| self.transform_rect(&r))
    }

    fn transform_rect(&self, r: &Rect) -> Rect {
        let corners = [
            DVec2::new(r.left, r.top),
            DVec2::new(r.right(), r.top),
            DVec2::new(r.left, r.bottom()),
            DVec2::new(r.right(), r.bottom()),
        ]
        .map(|c| self.transform.transform_point2(c));
        let min = corners.iter().fold(DVec2::splat(f64::MAX), |a, c| a.min(*c));
        let max = corners.iter().fold(DVec2::splat(f64::MIN), |a, c| a.max(*c));
        Rect::from_corners(min.x, min.y, max.x, max.y)
    }

    /// Topmost visible element containing a screen point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ElementId> {
        let (lx, ly) = self.invert(x, y);
        self.elements
            .iter()
            .enumerate()
            .rev()
            .find(|(_, p)| p.visible && p.contains(lx, ly))
            .map(|(i, _)| ElementId(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Path {
        let mut path = Path::new();
        path.move_to(0.0, 0.0).line_to(size, 0.0).line_to(size, size).line_to(0.0, size).close();
        path
    }

    #[test]
    fn test_bounds_with_and_without_transform() {
        let mut layer = Layer::new(0);
        layer.add(square(10.0));
        layer.set_transformation_matrix([2.0, 0.0, 0.0, 2.0, 5.0, -5.0]);

        assert_eq!(layer.bounds_without_transform(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(layer.bounds(), Some(Rect::new(5.0, -5.0, 20.0, 20.0)));
        assert_eq!(layer.transformation_matrix(), [2.0, 0.0, 0.0, 2.0, 5.0, -5.0]);
    }

    #[test]
    fn test_hit_test_uses_inverse_transform() {
        let mut layer = Layer::new(0);
        let id = layer.add(square(10.0));
        layer.set_transformation_matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(layer.hit_test(15.0, 15.0), Some(id));
        assert_eq!(layer.hit_test(25.0, 15.0), None);
    }

    #[test]
    fn test_append_flat_breaks_on_nan() {
        let mut path = Path::new();
        path.append_flat(&[0.0, 0.0, 1.0, 1.0, f64::NAN, 0.0, 2.0, 2.0, 3.0, 3.0], false, |x, y| (x, y));
        assert_eq!(path.subpaths().len(), 2);
        assert_eq!(path.bounds(), Some(Rect::new(0.0, 0.0, 3.0, 3.0)));
    }

    #[test]
    fn test_empty_layer_has_no_bounds() {
        let layer = Layer::default();
        assert!(layer.bounds().is_none());
    }
}
