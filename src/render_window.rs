use std::path::Path;

use image::RgbaImage;
use log::{debug, info};
use thiserror::Error;

use crate::renderer::Renderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render window has no renderer")]
    NoRenderer,
    #[error("render window size {0}x{1} is empty")]
    EmptyViewport(u32, u32),
    #[error("could not write frame: {0}")]
    Image(#[from] image::ImageError),
    #[error("window error: {0}")]
    Window(String),
}

/// Owns the renderers and the last rendered frame.
#[derive(Debug)]
pub struct RenderWindow {
    renderers: Vec<Renderer>,
    size: (u32, u32),
    frame: Option<RgbaImage>,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self {
            renderers: Vec::new(),
            size: (300, 300),
            frame: None,
        }
    }
}

impl RenderWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_renderer(&mut self, renderer: Renderer) {
        self.renderers.push(renderer);
    }

    pub fn renderers(&self) -> &[Renderer] {
        &self.renderers
    }

    /// The first renderer, which receives interaction.
    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderers.first()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderers.first_mut()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Renders every renderer into a fresh frame. The first renderer clears
    /// to its background, later ones are layered over it.
    pub fn render(&mut self) -> Result<&RgbaImage, RenderError> {
        let (width, height) = self.size;
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyViewport(width, height));
        }
        let (first, rest) = self
            .renderers
            .split_first_mut()
            .ok_or(RenderError::NoRenderer)?;

        let mut frame = first.render(width, height);
        for renderer in rest {
            if !renderer.is_camera_positioned() {
                renderer.reset_camera();
            }
            renderer.composite(&mut frame);
        }
        debug!("rendered {width}x{height} frame");
        Ok(&*self.frame.insert(frame))
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    /// Writes the last frame, rendering one first if needed.
    pub fn save_png(&mut self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let path = path.as_ref();
        if self.frame.is_none() {
            self.render()?;
        }
        let frame = self.frame.as_ref().ok_or(RenderError::NoRenderer)?;
        frame.save_with_format(path, image::ImageFormat::Png)?;
        info!("saved frame to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_renderer_fails() {
        let mut window = RenderWindow::new();
        assert!(matches!(window.render(), Err(RenderError::NoRenderer)));
    }

    #[test]
    fn empty_size_is_rejected() {
        let mut window = RenderWindow::new();
        window.add_renderer(Renderer::new());
        window.set_size(0, 10);
        assert!(matches!(
            window.render(),
            Err(RenderError::EmptyViewport(0, 10))
        ));
    }

    #[test]
    fn background_only_frame() {
        let mut window = RenderWindow::new();
        let mut renderer = Renderer::new();
        renderer.set_background(1.0, 0.0, 0.0);
        window.add_renderer(renderer);
        window.set_size(4, 2);
        let frame = window.render().unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert!(frame.pixels().all(|p| p.0 == [255, 0, 0, 255]));
        assert!(window.last_frame().is_some());
    }

    #[test]
    fn save_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut window = RenderWindow::new();
        window.add_renderer(Renderer::new());
        window.set_size(3, 3);
        window.save_png(&path).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 3));
    }
}
