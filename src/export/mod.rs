//! Image export of generated fields for previews and external tools.

pub mod png;

pub use png::{
    SplatThresholds, color_image, encode_png, falloff_image, height_image, save_color_map,
    save_falloff_map, save_height_map, save_splatmap, splatmap_image,
};
