use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{Error, Result};

/// Edge length of a single view tile
pub const TILE_SIZE: u32 = 320;
/// Tile rows in the synthesizer output
pub const GRID_ROWS: u32 = 3;
/// Tile columns in the synthesizer output
pub const GRID_COLS: u32 = 2;
/// Number of views packed into the grid
pub const VIEW_COUNT: usize = (GRID_ROWS * GRID_COLS) as usize;

/// Six synthesized views packed as 3 rows x 2 columns of 320x320 tiles.
///
/// Tile `k` sits at row `k / 2`, column `k % 2`; this order matches the
/// input camera order.
#[derive(Clone, Debug)]
pub struct MultiViewGrid {
    image: RgbImage,
}

impl MultiViewGrid {
    /// Wrap a sampler output. Any 2:3 image is accepted and resized to 640x960.
    pub fn new(image: RgbImage) -> Result<Self> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 || w * GRID_ROWS != h * GRID_COLS {
            return Err(Error::DataIntegrity(format!(
                "multi-view grid must be {}x{} tiles, got {w}x{h} pixels",
                GRID_COLS, GRID_ROWS
            )));
        }

        let image = if (w, h) == (GRID_COLS * TILE_SIZE, GRID_ROWS * TILE_SIZE) {
            image
        } else {
            imageops::resize(
                &image,
                GRID_COLS * TILE_SIZE,
                GRID_ROWS * TILE_SIZE,
                FilterType::CatmullRom,
            )
        };

        Ok(Self { image })
    }

    /// Pack six tiles in camera order
    pub fn from_tiles(tiles: &[RgbImage]) -> Result<Self> {
        if tiles.len() != VIEW_COUNT {
            return Err(Error::DataIntegrity(format!(
                "expected {VIEW_COUNT} tiles, got {}",
                tiles.len()
            )));
        }

        let mut image = RgbImage::new(GRID_COLS * TILE_SIZE, GRID_ROWS * TILE_SIZE);
        for (k, tile) in tiles.iter().enumerate() {
            if tile.dimensions() != (TILE_SIZE, TILE_SIZE) {
                return Err(Error::DataIntegrity(format!(
                    "tile {k} is {:?}, expected {TILE_SIZE}x{TILE_SIZE}",
                    tile.dimensions()
                )));
            }
            let k = k as u32;
            let (row, col) = (k / GRID_COLS, k % GRID_COLS);
            imageops::replace(
                &mut image,
                tile,
                i64::from(col * TILE_SIZE),
                i64::from(row * TILE_SIZE),
            );
        }

        Ok(Self { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Un-tile into six 320x320 views, in camera order
    pub fn tiles(&self) -> Vec<RgbImage> {
        (0..VIEW_COUNT as u32)
            .map(|k| {
                let (row, col) = (k / GRID_COLS, k % GRID_COLS);
                imageops::crop_imm(
                    &self.image,
                    col * TILE_SIZE,
                    row * TILE_SIZE,
                    TILE_SIZE,
                    TILE_SIZE,
                )
                .to_image()
            })
            .collect()
    }

    /// 2 rows x 3 columns re-tiling, only meant for previews
    pub fn display_grid(&self) -> RgbImage {
        let mut out = RgbImage::new(GRID_ROWS * TILE_SIZE, GRID_COLS * TILE_SIZE);
        for (k, tile) in self.tiles().iter().enumerate() {
            let k = k as u32;
            let (row, col) = (k / GRID_ROWS, k % GRID_ROWS);
            imageops::replace(
                &mut out,
                tile,
                i64::from(col * TILE_SIZE),
                i64::from(row * TILE_SIZE),
            );
        }
        out
    }
}
