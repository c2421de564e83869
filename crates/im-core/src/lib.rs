pub mod camera;
pub mod error;
pub mod grid;
pub mod mesh;
pub mod pipeline;
pub mod progress;


pub use camera::{CameraMode, CameraPose, CameraSet};
pub use error::{Error, Result};
pub use grid::MultiViewGrid;
pub use mesh::{MeshAsset, MeshAttributes, MeshExport};
pub use pipeline::{
    ModelProvider, MultiViewSynthesizer, ReconstructionModel, RenderedFrame, Segmenter,
    SynthesizerReleased, TriplanePlanes, release_synthesizer,
};
