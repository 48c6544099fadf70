//! 2x2 thumbnail grid for messages carrying several images.
//!
//! Each image is fetched and decoded on its own; a tile that fails is
//! dropped and the rest still render. The canvas is always `2T x 2T`
//! whatever the number of tiles, with empty quadrants left as background.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::platform::Platform;

/// Neutral dark background, fully opaque.
pub const BACKGROUND: Rgba<u8> = Rgba([54, 57, 63, 255]);

pub const MAX_TILES: usize = 4;

/// An encoded grid image and the name the embed refers to it by.
#[derive(Debug, Clone, PartialEq)]
pub struct GridImage {
    pub filename: String,
    pub data: Vec<u8>,
}

impl GridImage {
    /// `attachment://` reference used as the embed image URL.
    pub fn attachment_url(&self) -> String {
        format!("attachment://{}", self.filename)
    }
}

/// Download, decode and lay out up to four images.
/// Fails only when no image at all could be used.
pub async fn compose_grid(platform: &dyn Platform, urls: &[&str], tile: u32) -> Result<GridImage> {
    let mut tiles = Vec::with_capacity(MAX_TILES);
    for url in urls.iter().take(MAX_TILES) {
        let data = match platform.download(url).await {
            Ok(data) => data,
            Err(e) => {
                debug!(url, error = %e, "dropping grid tile: download failed");
                continue;
            }
        };
        match decode_tile(&data, tile) {
            Ok(img) => tiles.push(img),
            Err(e) => debug!(url, error = %e, "dropping grid tile: decode failed"),
        }
    }

    render_grid(&tiles, tile)
}

/// Decode image bytes and shrink them to fit a `tile x tile` box.
pub fn decode_tile(data: &[u8], tile: u32) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("failed to guess image format")?
        .decode()
        .context("failed to decode image")?;
    Ok(fit_within(img, tile))
}

/// Downscale preserving aspect ratio so the longest side is at most `tile`.
/// Images already small enough are left untouched.
pub fn fit_within(img: DynamicImage, tile: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= tile && height <= tile {
        return img;
    }
    img.resize(tile, tile, FilterType::Lanczos3)
}

/// Top-left corner of quadrant `index` in reading order.
pub fn quadrant_origin(index: usize, tile: u32) -> (u32, u32) {
    let col = (index % 2) as u32;
    let row = (index / 2) as u32;
    (col * tile, row * tile)
}

/// Where an image of `width x height` goes to sit centered in its quadrant.
pub fn centered_offset(index: usize, width: u32, height: u32, tile: u32) -> (u32, u32) {
    let (x, y) = quadrant_origin(index, tile);
    (
        x + tile.saturating_sub(width) / 2,
        y + tile.saturating_sub(height) / 2,
    )
}

/// Paste decoded tiles onto the background and encode as PNG.
pub fn render_grid(tiles: &[DynamicImage], tile: u32) -> Result<GridImage> {
    if tiles.is_empty() {
        anyhow::bail!("no image could be decoded for the grid");
    }

    let mut canvas = RgbaImage::from_pixel(tile * 2, tile * 2, BACKGROUND);
    for (index, img) in tiles.iter().take(MAX_TILES).enumerate() {
        let img = fit_within(img.clone(), tile).to_rgba8();
        let (x, y) = centered_offset(index, img.width(), img.height(), tile);
        image::imageops::overlay(&mut canvas, &img, i64::from(x), i64::from(y));
    }

    let mut output = Cursor::new(Vec::new());
    canvas
        .write_to(&mut output, ImageFormat::Png)
        .context("failed to encode grid as PNG")?;
    let data = output.into_inner();

    let digest = format!("{:x}", Sha256::digest(&data));
    Ok(GridImage {
        filename: format!("grid-{}.png", &digest[..16]),
        data,
    })
}
