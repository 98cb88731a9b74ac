mod normalizer;

pub use normalizer::{optimize_images, to_attachment};
