pub mod image_loader;

pub use image_loader::{load_image_file, load_images_from_folder, media_type_for};
