use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use image::RgbImage;
use log::{debug, info};

use im_core::error::{Error, Result};
use im_core::pipeline::RenderedFrame;

/// H.264 encoding parameters for the orbit preview
#[derive(Clone, Debug)]
pub struct VideoConfig {
    pub fps: u32,
    pub frame_size: u32,
    pub codec: String,
    /// Encoder executable, looked up on `PATH` when not absolute
    pub ffmpeg: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            frame_size: 384,
            codec: "libx264".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Scale a [0, 1] frame to 8-bit RGB.
///
/// Rejects frames whose size differs from `expected_size` or whose scaled
/// values are not finite or fall outside [0, 255].
pub fn frame_to_rgb8(frame: &RenderedFrame, expected_size: u32, index: usize) -> Result<RgbImage> {
    if frame.width != expected_size || frame.height != expected_size {
        return Err(Error::DataIntegrity(format!(
            "frame {index} is {}x{}, expected {expected_size}x{expected_size}",
            frame.width, frame.height
        )));
    }

    let expected_len = (frame.width * frame.height * 3) as usize;
    if frame.pixels.len() != expected_len {
        return Err(Error::DataIntegrity(format!(
            "frame {index} holds {} values, expected {expected_len}",
            frame.pixels.len()
        )));
    }

    let mut bytes = Vec::with_capacity(expected_len);
    for &v in &frame.pixels {
        let scaled = v * 255.0;
        if !scaled.is_finite() || !(0.0..=255.0).contains(&scaled) {
            return Err(Error::DataIntegrity(format!(
                "frame {index} value out of range: {scaled}"
            )));
        }
        bytes.push(scaled.round() as u8);
    }

    RgbImage::from_raw(frame.width, frame.height, bytes)
        .ok_or_else(|| Error::DataIntegrity(format!("frame {index} buffer mismatch")))
}

/// Validate every frame, then stream them through the encoder.
///
/// Nothing is written to `output` unless all frames pass validation.
pub fn encode_video(frames: &[RenderedFrame], output: &Path, config: &VideoConfig) -> Result<()> {
    if frames.is_empty() {
        return Err(Error::DataIntegrity("no frames to encode".to_string()));
    }

    let images = frames
        .iter()
        .enumerate()
        .map(|(i, f)| frame_to_rgb8(f, config.frame_size, i))
        .collect::<Result<Vec<_>>>()?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let size = format!("{0}x{0}", config.frame_size);
    let fps = config.fps.to_string();
    debug!("Spawning {} for {} frames ({size} @ {fps} fps)", config.ffmpeg, images.len());

    let mut child = Command::new(&config.ffmpeg)
        .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", size.as_str(), "-r", fps.as_str(), "-i", "-"])
        .args(["-c:v", config.codec.as_str(), "-pix_fmt", "yuv420p"])
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Encode(format!("failed to start {}: {e}", config.ffmpeg)))?;

    // A failed write usually means the encoder already exited. Its stderr says why.
    let streamed = match child.stdin.take() {
        Some(mut stdin) => images.iter().try_for_each(|image| stdin.write_all(image.as_raw())),
        None => Err(std::io::Error::other("encoder stdin unavailable")),
    };

    let result = child
        .wait_with_output()
        .map_err(|e| Error::Encode(format!("encoder did not finish: {e}")))?;
    let stderr = String::from_utf8_lossy(&result.stderr);

    if let Err(e) = streamed {
        return Err(Error::Encode(format!(
            "failed to stream frames to {} ({}): {e}: {}",
            config.ffmpeg,
            result.status,
            stderr.trim()
        )));
    }
    if !result.status.success() {
        return Err(Error::Encode(format!(
            "{} exited with {}: {}",
            config.ffmpeg,
            result.status,
            stderr.trim()
        )));
    }

    info!("Video saved to {}", output.display());
    Ok(())
}
