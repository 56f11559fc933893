use std::{env, error::Error};

use env_logger::Env;
use log::info;
use volume_view::scene::{self, SceneConfig, ScenePreset};

/// Frame written when no window front-end is compiled in.
#[cfg(not(feature = "window"))]
const DEFAULT_OUTPUT: &str = "image_mapper_3d.png";

#[cfg_attr(feature = "window", show_image::main)]
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match env::var_os("VOLUME_VIEW_SCENE") {
        Some(path) => SceneConfig::from_json_file(path)?,
        None => {
            let preset = match env::var("VOLUME_VIEW_MAPPER") {
                Ok(name) => name.parse()?,
                Err(_) => ScenePreset::default(),
            };
            SceneConfig::preset(preset, scene::data_root())
        }
    };
    let mut interactor = config.build()?;

    if let Some(path) = env::var_os("VOLUME_VIEW_OUTPUT") {
        interactor.render_window_mut().save_png(path)?;
        return Ok(());
    }

    #[cfg(feature = "window")]
    {
        let (width, height) = interactor.render_window().size();
        info!("opening {width}x{height} window, press Q or Escape to quit");
        interactor.start()?;
    }

    #[cfg(not(feature = "window"))]
    {
        info!("built without a window, writing {DEFAULT_OUTPUT}");
        interactor.render_window_mut().save_png(DEFAULT_OUTPUT)?;
    }

    Ok(())
}
