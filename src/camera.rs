//! Camera state and the motions the interaction style drives.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    position: DVec3,
    focal_point: DVec3,
    view_up: DVec3,
    /// Vertical field of view in degrees.
    view_angle: f64,
    parallel_projection: bool,
    /// Half the height of the viewport in world units under parallel
    /// projection.
    parallel_scale: f64,
    clipping_range: (f64, f64),
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            view_angle: 30.0,
            parallel_projection: false,
            parallel_scale: 1.0,
            clipping_range: (0.01, 1000.01),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    pub fn focal_point(&self) -> DVec3 {
        self.focal_point
    }

    pub fn set_focal_point(&mut self, focal_point: DVec3) {
        self.focal_point = focal_point;
    }

    pub fn view_up(&self) -> DVec3 {
        self.view_up
    }

    pub fn set_view_up(&mut self, view_up: DVec3) {
        self.view_up = view_up.normalize_or(DVec3::Y);
    }

    pub fn view_angle(&self) -> f64 {
        self.view_angle
    }

    pub fn set_view_angle(&mut self, degrees: f64) {
        self.view_angle = degrees.clamp(0.00000001, 179.0);
    }

    pub fn parallel_projection(&self) -> bool {
        self.parallel_projection
    }

    pub fn set_parallel_projection(&mut self, enabled: bool) {
        self.parallel_projection = enabled;
    }

    pub fn parallel_scale(&self) -> f64 {
        self.parallel_scale
    }

    pub fn set_parallel_scale(&mut self, scale: f64) {
        self.parallel_scale = scale;
    }

    pub fn clipping_range(&self) -> (f64, f64) {
        self.clipping_range
    }

    /// Keeps `near` positive and `far` beyond it.
    pub fn set_clipping_range(&mut self, near: f64, far: f64) {
        let near = near.max(1e-20);
        let far = if far <= near { near + 1e-3 } else { far };
        self.clipping_range = (near, far);
    }

    pub fn distance(&self) -> f64 {
        (self.focal_point - self.position).length()
    }

    /// Moves the focal point along the direction of projection so it sits
    /// `distance` in front of the camera.
    pub fn set_distance(&mut self, distance: f64) {
        let distance = distance.max(1e-20);
        self.focal_point = self.position + self.direction_of_projection() * distance;
    }

    pub fn direction_of_projection(&self) -> DVec3 {
        (self.focal_point - self.position).normalize_or(DVec3::NEG_Z)
    }

    pub fn view_plane_normal(&self) -> DVec3 {
        -self.direction_of_projection()
    }

    /// Unit vector pointing to the right of the view.
    pub fn view_right(&self) -> DVec3 {
        self.direction_of_projection()
            .cross(self.view_up)
            .normalize_or(DVec3::X)
    }

    /// View up made orthogonal to the direction of projection.
    pub fn orthogonal_view_up(&self) -> DVec3 {
        self.view_right()
            .cross(self.direction_of_projection())
            .normalize_or(DVec3::Y)
    }

    pub fn orthogonalize_view_up(&mut self) {
        self.view_up = self.orthogonal_view_up();
    }

    /// Rotates the position about the view up vector centred on the focal
    /// point.
    pub fn azimuth(&mut self, degrees: f64) {
        let axis = self.view_up.normalize_or(DVec3::Y);
        let rotation = DQuat::from_axis_angle(axis, degrees.to_radians());
        self.position = self.focal_point + rotation * (self.position - self.focal_point);
    }

    /// Rotates the position about the view-right axis centred on the focal
    /// point. The view up is left as is.
    pub fn elevation(&mut self, degrees: f64) {
        let axis = self.view_plane_normal().cross(self.view_up);
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        let rotation = DQuat::from_axis_angle(axis, degrees.to_radians());
        self.position = self.focal_point + rotation * (self.position - self.focal_point);
    }

    /// Rotates the view up about the direction of projection.
    pub fn roll(&mut self, degrees: f64) {
        let rotation =
            DQuat::from_axis_angle(self.direction_of_projection(), -degrees.to_radians());
        self.view_up = (rotation * self.view_up).normalize_or(DVec3::Y);
    }

    /// Moves the camera towards the focal point; factors above 1 move
    /// closer.
    pub fn dolly(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        let distance = self.distance() / factor;
        self.position = self.focal_point - self.direction_of_projection() * distance;
    }

    /// Narrows the view: the parallel scale or the view angle shrinks by
    /// `factor`.
    pub fn zoom(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        if self.parallel_projection {
            self.parallel_scale /= factor;
        } else {
            self.set_view_angle(self.view_angle / factor);
        }
    }

    /// World-space height of the viewport at the focal plane.
    pub fn focal_plane_height(&self) -> f64 {
        if self.parallel_projection {
            2.0 * self.parallel_scale
        } else {
            2.0 * self.distance() * (0.5 * self.view_angle.to_radians()).tan()
        }
    }

    /// Moves camera and focal point together so the focal point lands on
    /// `target`.
    pub fn translate_focal_point_to(&mut self, target: DVec3) {
        let offset = target - self.focal_point;
        self.focal_point = target;
        self.position += offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn default_looks_down_negative_z() {
        let camera = Camera::new();
        assert!(close(camera.direction_of_projection(), DVec3::NEG_Z));
        assert!(close(camera.view_plane_normal(), DVec3::Z));
        assert!(close(camera.view_right(), DVec3::X));
        assert_eq!(camera.distance(), 1.0);
    }

    #[test]
    fn set_distance_moves_focal_point() {
        let mut camera = Camera::new();
        camera.set_distance(5.0);
        assert!(close(camera.position(), DVec3::new(0.0, 0.0, 1.0)));
        assert!(close(camera.focal_point(), DVec3::new(0.0, 0.0, -4.0)));
    }

    #[test]
    fn azimuth_keeps_distance() {
        let mut camera = Camera::new();
        camera.azimuth(90.0);
        assert!(close(camera.position(), DVec3::new(1.0, 0.0, 0.0)));
        assert!((camera.distance() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn elevation_raises_camera() {
        let mut camera = Camera::new();
        camera.elevation(90.0);
        assert!(close(camera.position(), DVec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn full_roll_restores_view_up() {
        let mut camera = Camera::new();
        camera.roll(90.0);
        assert!(camera.view_up().dot(DVec3::Y).abs() < 1e-9);
        camera.roll(270.0);
        assert!(close(camera.view_up(), DVec3::Y));
    }

    #[test]
    fn dolly_and_zoom() {
        let mut camera = Camera::new();
        camera.dolly(2.0);
        assert!((camera.distance() - 0.5).abs() < 1e-12);
        camera.set_parallel_projection(true);
        camera.zoom(2.0);
        assert_eq!(camera.parallel_scale(), 0.5);
        assert_eq!(camera.focal_plane_height(), 1.0);
    }

    #[test]
    fn clipping_range_stays_ordered() {
        let mut camera = Camera::new();
        camera.set_clipping_range(5.0, 1.0);
        let (near, far) = camera.clipping_range();
        assert!(near > 0.0 && far > near);
    }
}
