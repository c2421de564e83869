pub mod camera;
pub mod renderer;
pub mod video;


pub use camera::{input_cameras, render_cameras};
pub use renderer::OrbitRenderer;
pub use video::{VideoConfig, encode_video};
