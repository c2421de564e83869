use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use log::{debug, info};

use im_core::error::{Error, Result};
use im_core::pipeline::Segmenter;

/// Background removal and foreground normalization
#[derive(Clone, Debug)]
pub struct Preprocessor {
    pub remove_background: bool,
    /// Fraction of the frame the subject should span
    pub foreground_ratio: f32,
    /// Neutral color composited behind the subject
    pub background: [u8; 3],
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            remove_background: true,
            foreground_ratio: 0.85,
            background: [127, 127, 127],
        }
    }
}

impl Preprocessor {
    /// Normalize `image` for the multi-view synthesizer
    pub fn prepare(&self, image: &DynamicImage, segmenter: &dyn Segmenter) -> Result<RgbImage> {
        if !self.remove_background {
            debug!("Background removal disabled, passing image through");
            return Ok(image.to_rgb8());
        }

        let cutout = segmenter.remove_background(&image.to_rgba8())?;
        let centered = resize_foreground(&cutout, self.foreground_ratio)?;
        info!(
            "Foreground normalized to {}x{}",
            centered.width(),
            centered.height()
        );

        Ok(composite(&centered, self.background))
    }
}

/// Crop to the alpha bounding box, pad to a square, then pad so the subject
/// spans `ratio` of the frame
pub fn resize_foreground(image: &RgbaImage, ratio: f32) -> Result<RgbaImage> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(Error::InvalidConfig(format!("foreground ratio must be in (0, 1], got {ratio}")));
    }

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = bounds.ok_or_else(|| {
        Error::InvalidInput("segmentation left no foreground pixels".to_string())
    })?;
    let (fg_w, fg_h) = (x1 - x0 + 1, y1 - y0 + 1);
    let size = fg_w.max(fg_h);
    let new_size = ((size as f32 / ratio) as u32).max(size);

    let offset_x = (new_size - size) / 2 + (size - fg_w) / 2;
    let offset_y = (new_size - size) / 2 + (size - fg_h) / 2;

    let mut out = RgbaImage::from_pixel(new_size, new_size, Rgba([0, 0, 0, 0]));
    let foreground = image::imageops::crop_imm(image, x0, y0, fg_w, fg_h).to_image();
    image::imageops::replace(&mut out, &foreground, i64::from(offset_x), i64::from(offset_y));

    Ok(out)
}

/// Alpha-blend onto a solid background
pub fn composite(image: &RgbaImage, background: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let alpha = a as f32 / 255.0;
        let blend = |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;
        Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    })
}

/// Decode the job input from an `http(s)` URL or a local path
pub fn load_image(source: &str) -> Result<DynamicImage> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!("Downloading input image from {source}");
        let response = reqwest::blocking::get(source)
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::InvalidInput(format!("failed to fetch {source}: {e}")))?;
        let bytes = response
            .bytes()
            .map_err(|e| Error::InvalidInput(format!("failed to read {source}: {e}")))?;
        Ok(image::load_from_memory(&bytes)?)
    } else {
        Ok(image::open(source)?)
    }
}
