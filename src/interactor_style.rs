//! Mouse and keyboard interaction for image viewing.
//!
//! Event positions are display coordinates with the origin at the bottom
//! left of the window and `y` growing upwards.

use glam::DVec3;
use log::{debug, info};

use crate::enums::InteractionMode;
use crate::image_property::ImageProperty;
use crate::interpolator::Interpolator;
use crate::mapper::ViewRays;
use crate::renderer::Renderer;

const MOTION_FACTOR: f64 = 10.0;

const X_VIEW_RIGHT: DVec3 = DVec3::new(0.0, 1.0, 0.0);
const X_VIEW_UP: DVec3 = DVec3::new(0.0, 0.0, -1.0);
const Y_VIEW_RIGHT: DVec3 = DVec3::new(1.0, 0.0, 0.0);
const Y_VIEW_UP: DVec3 = DVec3::new(0.0, 0.0, -1.0);
const Z_VIEW_RIGHT: DVec3 = DVec3::new(1.0, 0.0, 0.0);
const Z_VIEW_UP: DVec3 = DVec3::new(0.0, 1.0, 0.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    ButtonPress {
        button: MouseButton,
        position: (i32, i32),
        modifiers: Modifiers,
    },
    ButtonRelease {
        button: MouseButton,
        position: (i32, i32),
    },
    MouseMove {
        position: (i32, i32),
    },
    Char {
        key: char,
        modifiers: Modifiers,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    None,
    WindowLevel,
    Pick,
    Slice,
    Rotate,
    Pan,
    Dolly,
    Spin,
}

/// World position under the cursor on the slice plane and the scalar
/// sampled there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickResult {
    pub position: DVec3,
    pub value: Option<f64>,
}

#[derive(Debug, Default)]
pub struct InteractorStyleImage {
    mode: InteractionMode,
    state: State,
    last_position: (i32, i32),
    window_level_start_position: (i32, i32),
    window_level_initial: Option<(f64, f64)>,
    last_pick: Option<PickResult>,
}

impl InteractorStyleImage {
    pub fn new(mode: InteractionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_interaction_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn last_pick(&self) -> Option<PickResult> {
        self.last_pick
    }

    /// Window and level captured when the last window/level drag started.
    pub fn window_level_initial(&self) -> Option<(f64, f64)> {
        self.window_level_initial
    }

    /// Applies `event` to the renderer. Returns true when the scene changed
    /// and needs a new frame.
    pub fn handle(
        &mut self,
        event: InteractionEvent,
        renderer: &mut Renderer,
        size: (u32, u32),
    ) -> bool {
        match event {
            InteractionEvent::ButtonPress {
                button,
                position,
                modifiers,
            } => self.on_button_press(button, position, modifiers, renderer, size),
            InteractionEvent::ButtonRelease { .. } => {
                self.state = State::None;
                false
            }
            InteractionEvent::MouseMove { position } => {
                let changed = self.on_mouse_move(position, renderer, size);
                self.last_position = position;
                changed
            }
            InteractionEvent::Char { key, modifiers } => self.on_char(key, modifiers, renderer),
        }
    }

    fn on_button_press(
        &mut self,
        button: MouseButton,
        position: (i32, i32),
        modifiers: Modifiers,
        renderer: &mut Renderer,
        size: (u32, u32),
    ) -> bool {
        if self.state != State::None {
            return false;
        }
        self.last_position = position;
        let image_3d = self.mode == InteractionMode::Image3D;
        self.state = match button {
            MouseButton::Left => match (modifiers.shift, modifiers.control) {
                (false, false) => State::WindowLevel,
                (true, _) if image_3d => State::Rotate,
                (true, true) => State::Dolly,
                (true, false) => State::Pan,
                (false, true) => State::Spin,
            },
            MouseButton::Middle if image_3d && modifiers.shift => State::Slice,
            MouseButton::Middle => State::Pan,
            MouseButton::Right if modifiers.shift => State::Pick,
            MouseButton::Right if image_3d && modifiers.control => State::Slice,
            MouseButton::Right => State::Dolly,
        };
        debug!("{button:?} press at {position:?}: {:?}", self.state);

        match self.state {
            State::WindowLevel => {
                self.window_level_start_position = position;
                self.window_level_initial = Self::current_window_level(renderer);
                false
            }
            State::Pick => {
                self.pick(position, renderer, size);
                false
            }
            _ => false,
        }
    }

    fn on_mouse_move(
        &mut self,
        position: (i32, i32),
        renderer: &mut Renderer,
        size: (u32, u32),
    ) -> bool {
        let (width, height) = (size.0.max(1) as f64, size.1.max(1) as f64);
        let dx = (position.0 - self.last_position.0) as f64;
        let dy = (position.1 - self.last_position.1) as f64;

        match self.state {
            State::None => false,
            State::WindowLevel => self.window_level(position, renderer, width, height),
            State::Pick => {
                self.pick(position, renderer, size);
                false
            }
            State::Slice => {
                Self::slice(dy, renderer, height);
                true
            }
            State::Rotate => {
                let camera = renderer.active_camera_mut();
                camera.azimuth(dx * -20.0 / width * MOTION_FACTOR);
                camera.elevation(dy * -20.0 / height * MOTION_FACTOR);
                camera.orthogonalize_view_up();
                renderer.reset_camera_clipping_range();
                true
            }
            State::Pan => {
                let camera = renderer.active_camera_mut();
                let pixel = camera.focal_plane_height() / height;
                let motion = -(camera.view_right() * dx + camera.orthogonal_view_up() * dy) * pixel;
                camera.translate_focal_point_to(camera.focal_point() + motion);
                true
            }
            State::Dolly => {
                let factor = 1.1f64.powf(MOTION_FACTOR * dy / (0.5 * height));
                let camera = renderer.active_camera_mut();
                if camera.parallel_projection() {
                    camera.set_parallel_scale(camera.parallel_scale() / factor);
                } else {
                    camera.dolly(factor);
                    renderer.reset_camera_clipping_range();
                }
                true
            }
            State::Spin => {
                let center = (0.5 * width, 0.5 * height);
                let angle = |(x, y): (i32, i32)| (y as f64 - center.1).atan2(x as f64 - center.0);
                let degrees = (angle(position) - angle(self.last_position)).to_degrees();
                let camera = renderer.active_camera_mut();
                camera.roll(degrees);
                camera.orthogonalize_view_up();
                true
            }
        }
    }

    fn on_char(&mut self, key: char, modifiers: Modifiers, renderer: &mut Renderer) -> bool {
        match key.to_ascii_lowercase() {
            'r' if modifiers.shift || modifiers.control => {
                renderer.reset_camera();
                true
            }
            'r' => {
                let Some((window, level)) = self.window_level_initial else {
                    return false;
                };
                let Some(property) = Self::current_property(renderer) else {
                    return false;
                };
                property.set_color_window(window);
                property.set_color_level(level);
                true
            }
            'x' => {
                Self::set_image_orientation(renderer, X_VIEW_RIGHT, X_VIEW_UP);
                true
            }
            'y' => {
                Self::set_image_orientation(renderer, Y_VIEW_RIGHT, Y_VIEW_UP);
                true
            }
            'z' => {
                Self::set_image_orientation(renderer, Z_VIEW_RIGHT, Z_VIEW_UP);
                true
            }
            'f' => {
                let Some(pick) = self.last_pick else {
                    return false;
                };
                renderer
                    .active_camera_mut()
                    .translate_focal_point_to(pick.position);
                renderer.reset_camera_clipping_range();
                true
            }
            _ => false,
        }
    }

    fn window_level(
        &mut self,
        position: (i32, i32),
        renderer: &mut Renderer,
        width: f64,
        height: f64,
    ) -> bool {
        let Some((window, level)) = self.window_level_initial else {
            return false;
        };
        let Some(property) = Self::current_property(renderer) else {
            return false;
        };
        let start = self.window_level_start_position;
        let (new_window, new_level) = window_level_delta(
            window,
            level,
            (position.0 - start.0) as f64 * 4.0 / width,
            (start.1 - position.1) as f64 * 4.0 / height,
        );
        property.set_color_window(new_window);
        property.set_color_level(new_level);
        true
    }

    /// Pushes the camera through the volume along its direction of
    /// projection, keeping the focal point inside the clipping range.
    fn slice(dy: f64, renderer: &mut Renderer, height: f64) {
        let camera = renderer.active_camera_mut();
        let (near, far) = camera.clipping_range();
        let viewport_height = if camera.parallel_projection() {
            camera.parallel_scale()
        } else {
            2.0 * camera.distance() * (0.5 * camera.view_angle().to_radians()).tan()
        };
        let mut distance = camera.distance() + dy * viewport_height / height;
        if distance < near {
            distance = near + viewport_height * 1e-3;
        }
        if distance > far {
            distance = far - viewport_height * 1e-3;
        }
        camera.set_distance(distance);
    }

    fn pick(&mut self, position: (i32, i32), renderer: &Renderer, size: (u32, u32)) {
        let Some(prop) = renderer.props().last() else {
            return;
        };
        let camera = renderer.active_camera();
        let plane = prop.mapper().slice_plane(camera);
        let rays = ViewRays::new(camera, size.0, size.1);
        let row = size.1 as f64 - 1.0 - position.1 as f64;
        let Some(world) = rays.hit(&plane, position.0 as f64, row) else {
            return;
        };
        let value = prop.mapper().input().and_then(|volume| {
            let interpolation = prop
                .property()
                .map(|p| p.interpolation_type())
                .unwrap_or_default();
            Interpolator::sample_volume(
                volume.data(),
                volume.world_to_continuous_index(world),
                interpolation,
            )
        });
        info!("pick at {world:?}: value {value:?}");
        self.last_pick = Some(PickResult {
            position: world,
            value,
        });
    }

    /// Points the camera down `cross(right, up)` at the current focal point,
    /// keeping its distance.
    fn set_image_orientation(renderer: &mut Renderer, right: DVec3, up: DVec3) {
        let camera = renderer.active_camera_mut();
        let out_of_screen = right.cross(up);
        let focus = camera.focal_point();
        let distance = camera.distance();
        camera.set_position(focus + out_of_screen * distance);
        camera.set_view_up(up);
        renderer.reset_camera_clipping_range();
    }

    /// The topmost image prop's property, created on demand.
    fn current_property(renderer: &mut Renderer) -> Option<&mut ImageProperty> {
        let last = renderer.props().len().checked_sub(1)?;
        renderer.prop_mut(last).map(|prop| prop.property_mut())
    }

    fn current_window_level(renderer: &mut Renderer) -> Option<(f64, f64)> {
        Self::current_property(renderer).map(|p| (p.color_window(), p.color_level()))
    }
}

/// New window and level for a drag of `(dx, dy)` in viewport-normalized
/// units, starting from `window` and `level`.
pub fn window_level_delta(window: f64, level: f64, dx: f64, dy: f64) -> (f64, f64) {
    let dx = if window.abs() > 0.01 {
        dx * window
    } else {
        dx * 0.01_f64.copysign(window)
    };
    let dy = if level.abs() > 0.01 {
        dy * level
    } else {
        dy * 0.01_f64.copysign(level)
    };
    let dx = if window < 0.0 { -dx } else { dx };
    let dy = if level < 0.0 { -dy } else { dy };
    ((window + dx).max(0.01), level - dy)
}
