/// Resource module - owned GPU buffers, images and samplers

pub mod buffer;
pub mod image;

pub use buffer::*;
pub use image::*;

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
