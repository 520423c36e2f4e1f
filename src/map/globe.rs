use glam::DVec3;

/// Orthographic frame of a sphere seen from above `(center_lon, center_lat)`.
/// Orientation stored as three orthonormal vectors so projecting a point is
/// two dot products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicFrame {
    /// Direction from the sphere center towards the viewer
    forward: DVec3,
    /// Screen x axis (points east at the center)
    right: DVec3,
    /// Screen y axis (points north at the center)
    up: DVec3,
}

impl OrthographicFrame {
    /// Build a frame looking at (lon, lat).
    pub fn new(center_lon: f64, center_lat: f64) -> Self {
        let lon_rad = center_lon.to_radians();
        let lat_rad = center_lat.to_radians();

        let forward = lonlat_to_vec3(center_lon, center_lat);

        // Derivative of forward w.r.t. latitude (points north on sphere)
        let raw_up = DVec3::new(
            -lat_rad.sin() * lon_rad.cos(),
            -lat_rad.sin() * lon_rad.sin(),
            lat_rad.cos(),
        );

        let right = raw_up.cross(forward).normalize();
        let up = forward.cross(right).normalize();

        Self { forward, right, up }
    }

    /// Center lon/lat the frame is looking at.
    pub fn center(&self) -> (f64, f64) {
        let lat = self.forward.z.clamp(-1.0, 1.0).asin().to_degrees();
        let lon = self.forward.y.atan2(self.forward.x).to_degrees();
        (lon, lat)
    }

    /// Project onto the unit disk. `None` for the far hemisphere.
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let p = lonlat_to_vec3(lon, lat);
        if p.dot(self.forward) < 0.0 {
            return None;
        }
        Some((p.dot(self.right), p.dot(self.up)))
    }

    /// Inverse of [`project`](Self::project). `None` outside the unit disk.
    pub fn unproject(&self, sx: f64, sy: f64) -> Option<(f64, f64)> {
        let r2 = sx * sx + sy * sy;
        if r2 > 1.0 {
            return None;
        }

        // Reconstruct 3D point on the near hemisphere
        let sz = (1.0 - r2).sqrt();
        let p = self.right * sx + self.up * sy + self.forward * sz;

        let lat = p.z.clamp(-1.0, 1.0).asin().to_degrees();
        let lon = p.y.atan2(p.x).to_degrees();
        Some((lon, lat))
    }
}

impl Default for OrthographicFrame {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Convert lon/lat (degrees) to a unit sphere vector.
#[inline(always)]
fn lonlat_to_vec3(lon: f64, lat: f64) -> DVec3 {
    let lon_rad = lon.to_radians();
    let lat_rad = lat.to_radians();
    DVec3::new(
        lat_rad.cos() * lon_rad.cos(),
        lat_rad.cos() * lon_rad.sin(),
        lat_rad.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_projects_to_origin() {
        let frame = OrthographicFrame::new(30.0, 45.0);
        let (x, y) = frame.project(30.0, 45.0).unwrap();
        assert!(x.abs() < 1e-12 && y.abs() < 1e-12);
        let (lon, lat) = frame.center();
        assert!((lon - 30.0).abs() < 1e-9 && (lat - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_east_is_right_and_north_is_up() {
        let frame = OrthographicFrame::default();
        let (x, _) = frame.project(10.0, 0.0).unwrap();
        let (_, y) = frame.project(0.0, 10.0).unwrap();
        assert!(x > 0.0);
        assert!(y > 0.0);
    }

    #[test]
    fn test_back_hemisphere_hidden() {
        let frame = OrthographicFrame::default();
        assert!(frame.project(180.0, 0.0).is_none());
        assert!(frame.unproject(0.9, 0.9).is_none());
    }

    #[test]
    fn test_unproject_round_trip() {
        let frame = OrthographicFrame::new(-20.0, 10.0);
        let (x, y) = frame.project(5.0, 25.0).unwrap();
        let (lon, lat) = frame.unproject(x, y).unwrap();
        assert!((lon - 5.0).abs() < 1e-9);
        assert!((lat - 25.0).abs() < 1e-9);
    }
}
