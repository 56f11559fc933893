use image::RgbaImage;

use crate::interactor_style::{InteractionEvent, InteractorStyleImage};
use crate::render_window::{RenderError, RenderWindow};

/// Feeds interaction events to a style and re-renders the window when the
/// style reports a change.
#[derive(Debug)]
pub struct RenderWindowInteractor {
    render_window: RenderWindow,
    style: InteractorStyleImage,
}

impl RenderWindowInteractor {
    pub fn new(render_window: RenderWindow) -> Self {
        Self {
            render_window,
            style: InteractorStyleImage::default(),
        }
    }

    pub fn render_window(&self) -> &RenderWindow {
        &self.render_window
    }

    pub fn render_window_mut(&mut self) -> &mut RenderWindow {
        &mut self.render_window
    }

    pub fn interactor_style(&self) -> &InteractorStyleImage {
        &self.style
    }

    pub fn interactor_style_mut(&mut self) -> &mut InteractorStyleImage {
        &mut self.style
    }

    pub fn set_interactor_style(&mut self, style: InteractorStyleImage) {
        self.style = style;
    }

    pub fn render(&mut self) -> Result<&RgbaImage, RenderError> {
        self.render_window.render()
    }

    /// Returns true when the event changed the scene and a new frame was
    /// rendered.
    pub fn process_event(&mut self, event: InteractionEvent) -> Result<bool, RenderError> {
        let size = self.render_window.size();
        let renderer = self
            .render_window
            .renderer_mut()
            .ok_or(RenderError::NoRenderer)?;
        let changed = self.style.handle(event, renderer, size);
        if changed {
            self.render_window.render()?;
        }
        Ok(changed)
    }

    /// Opens a window showing the rendered frames and runs the event loop
    /// until the window is closed or Escape/Q is pressed.
    ///
    /// Must be called from a thread started by `show_image::main` or
    /// `show_image::run_context`.
    #[cfg(feature = "window")]
    pub fn start(&mut self) -> Result<(), RenderError> {
        use show_image::event::{ElementState, WindowEvent};
        use show_image::{WindowOptions, create_window};

        use crate::interactor_style::{Modifiers, MouseButton};

        let window_error = |e: &dyn std::fmt::Display| RenderError::Window(e.to_string());

        let (width, height) = self.render_window.size();
        let options = WindowOptions::default()
            .set_size([width, height])
            .set_default_controls(false);
        let window = create_window("image-mapper-3d", options).map_err(|e| window_error(&e))?;

        let frame = self.render()?.clone();
        window
            .set_image("frame", frame_to_image(frame))
            .map_err(|e| window_error(&e))?;

        let flip = |x: f32, y: f32| (x as i32, height as i32 - 1 - y as i32);
        let events = window.event_channel().map_err(|e| window_error(&e))?;
        for event in events {
            let event = match event {
                WindowEvent::CloseRequested(_) | WindowEvent::Destroyed(_) => break,
                WindowEvent::KeyboardInput(input) => {
                    if !matches!(input.input.state, ElementState::Pressed) {
                        continue;
                    }
                    let Some(key) = input.input.key_code.and_then(key_char) else {
                        continue;
                    };
                    if key == 'q' || key == '\u{1b}' {
                        break;
                    }
                    InteractionEvent::Char {
                        key,
                        modifiers: Modifiers {
                            shift: input.input.modifiers.shift(),
                            control: input.input.modifiers.ctrl(),
                        },
                    }
                }
                WindowEvent::MouseButton(input) => {
                    let button = match input.button {
                        show_image::event::MouseButton::Left => MouseButton::Left,
                        show_image::event::MouseButton::Middle => MouseButton::Middle,
                        show_image::event::MouseButton::Right => MouseButton::Right,
                        _ => continue,
                    };
                    let position = flip(input.position.x, input.position.y);
                    if matches!(input.state, ElementState::Pressed) {
                        InteractionEvent::ButtonPress {
                            button,
                            position,
                            modifiers: Modifiers {
                                shift: input.modifiers.shift(),
                                control: input.modifiers.ctrl(),
                            },
                        }
                    } else {
                        InteractionEvent::ButtonRelease { button, position }
                    }
                }
                WindowEvent::MouseMove(input) => InteractionEvent::MouseMove {
                    position: flip(input.position.x, input.position.y),
                },
                _ => continue,
            };

            if self.process_event(event)? {
                if let Some(frame) = self.render_window.last_frame() {
                    window
                        .set_image("frame", frame_to_image(frame.clone()))
                        .map_err(|e| window_error(&e))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "window")]
fn frame_to_image(frame: RgbaImage) -> show_image::BoxImage {
    let info = show_image::ImageInfo::rgba8(frame.width(), frame.height());
    show_image::BoxImage::new(info, frame.into_raw().into_boxed_slice())
}

#[cfg(feature = "window")]
fn key_char(key: show_image::event::VirtualKeyCode) -> Option<char> {
    use show_image::event::VirtualKeyCode;
    match key {
        VirtualKeyCode::R => Some('r'),
        VirtualKeyCode::X => Some('x'),
        VirtualKeyCode::Y => Some('y'),
        VirtualKeyCode::Z => Some('z'),
        VirtualKeyCode::F => Some('f'),
        VirtualKeyCode::Q => Some('q'),
        VirtualKeyCode::Escape => Some('\u{1b}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{InteractionMode, MapperKind};
    use crate::image_slice::ImageSlice;
    use crate::interactor_style::{Modifiers, MouseButton};
    use crate::mapper::create_mapper;
    use crate::renderer::Renderer;
    use crate::volume::Volume;
    use ndarray::Array3;
    use std::sync::Arc;

    fn interactor() -> RenderWindowInteractor {
        let volume = Arc::new(Volume::new(Array3::from_elem((4, 4, 4), 100u16), [1.0; 3]));
        let mut renderer = Renderer::new();
        renderer.add_view_prop(ImageSlice::new(create_mapper(MapperKind::Direct, volume)));
        let mut window = RenderWindow::new();
        window.add_renderer(renderer);
        window.set_size(32, 32);
        let mut interactor = RenderWindowInteractor::new(window);
        interactor.set_interactor_style(InteractorStyleImage::new(InteractionMode::Image3D));
        interactor
    }

    #[test]
    fn window_level_drag_rerenders() {
        let mut interactor = interactor();
        interactor.render().unwrap();
        let before = interactor.render_window().last_frame().unwrap().get_pixel(16, 16).0;

        let press = InteractionEvent::ButtonPress {
            button: MouseButton::Left,
            position: (16, 16),
            modifiers: Modifiers::default(),
        };
        assert!(!interactor.process_event(press).unwrap());
        assert!(
            interactor
                .process_event(InteractionEvent::MouseMove { position: (16, 0) })
                .unwrap()
        );
        let after = interactor.render_window().last_frame().unwrap().get_pixel(16, 16).0;
        assert_ne!(before, after);
    }

    #[test]
    fn unhandled_key_does_not_render() {
        let mut interactor = interactor();
        let event = InteractionEvent::Char {
            key: 'k',
            modifiers: Modifiers::default(),
        };
        assert!(!interactor.process_event(event).unwrap());
        assert!(interactor.render_window().last_frame().is_none());
    }

    #[test]
    fn events_need_a_renderer() {
        let mut interactor = RenderWindowInteractor::new(RenderWindow::new());
        let event = InteractionEvent::MouseMove { position: (0, 0) };
        assert!(matches!(
            interactor.process_event(event),
            Err(RenderError::NoRenderer)
        ));
    }
}
