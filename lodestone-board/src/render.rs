//! Image rendering for the status board.
//!
//! This module handles:
//! - Rescaling avatars to card size with nearest-neighbor filtering
//! - Rendering the board: a roster grid of avatar cards, or a single message
//!   card for the loading, unreachable and empty states

use ab_glyph::{Font, FontRef, PxScale};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops};
use imageproc::drawing::draw_text_mut;
use std::cmp::min;
use std::io::Cursor;
use thiserror::Error;

/// Fallback head shown when an avatar cannot be fetched (embedded at compile time).
pub const DEFAULT_HEAD: &[u8] = include_bytes!("../assets/default_head.png");

/// Font for names and messages (embedded at compile time).
const CARD_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const NAME_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MUTED_COLOR: Rgba<u8> = Rgba([180, 180, 180, 255]);
const ERROR_COLOR: Rgba<u8> = Rgba([235, 87, 87, 255]);
const ONLINE_COLOR: Rgba<u8> = Rgba([87, 200, 120, 255]);

/// Rescale an avatar image to `size`x`size`, keeping hard pixel edges.
pub fn scale_avatar(avatar: &[u8], size: u32) -> Result<Vec<u8>, RenderError> {
    let image =
        image::load_from_memory(avatar).map_err(|e| RenderError::ImageLoad(e.to_string()))?;
    let scaled = imageops::resize(&image.to_rgba8(), size, size, imageops::FilterType::Nearest);
    encode_png(scaled)
}

/// Layout of the rendered board.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Size of each avatar
    pub head_size: u32,
    /// Horizontal spacing between cards
    pub h_spacing: u32,
    /// Vertical spacing between rows
    pub v_spacing: u32,
    /// Height reserved for the name below each avatar
    pub text_height: u32,
    /// Height of the "N online" header above the grid
    pub header_height: u32,
    /// Maximum number of cards per row
    pub max_per_row: usize,
    /// Base font size
    pub font_size: f32,
    /// Minimum font size when shrinking long names
    pub min_font_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            head_size: 64,
            h_spacing: 16,
            v_spacing: 8,
            text_height: 24,
            header_height: 32,
            max_per_row: 5,
            font_size: 16.0,
            min_font_size: 10.0,
        }
    }
}

/// One roster entry.
pub struct AvatarCard {
    pub name: String,
    /// Avatar PNG, or None for the default head
    pub head_data: Option<Vec<u8>>,
}

/// What to draw, one variant per display state.
pub enum BoardImage<'a> {
    Loading,
    Unreachable,
    Empty,
    Roster {
        online_count: u32,
        cards: &'a [AvatarCard],
    },
}

/// Render the board as a PNG.
pub fn render_board(board: &BoardImage<'_>, config: &RenderConfig) -> Result<Vec<u8>, RenderError> {
    let font =
        FontRef::try_from_slice(CARD_FONT).map_err(|e| RenderError::FontLoad(e.to_string()))?;

    match board {
        BoardImage::Loading => render_message(&font, "Loading...", MUTED_COLOR, config),
        BoardImage::Unreachable => {
            render_message(&font, "SERVER UNREACHABLE", ERROR_COLOR, config)
        }
        BoardImage::Empty => render_message(&font, "No players online", MUTED_COLOR, config),
        BoardImage::Roster {
            online_count,
            cards,
        } if !cards.is_empty() => render_roster(&font, *online_count, cards, config),
        BoardImage::Roster { .. } => {
            render_message(&font, "No players online", MUTED_COLOR, config)
        }
    }
}

/// Render the roster grid: header, then rows of centered avatar cards.
fn render_roster(
    font: &FontRef<'_>,
    online_count: u32,
    cards: &[AvatarCard],
    config: &RenderConfig,
) -> Result<Vec<u8>, RenderError> {
    let per_row = config.max_per_row.max(1);
    let num_rows = cards.len().div_ceil(per_row);
    let cell_height = config.head_size + config.text_height + config.v_spacing;
    let columns = min(per_row, cards.len()) as u32;

    let header = format!("{online_count} online");
    let header_scale = PxScale::from(config.font_size);
    let header_width = measure_text_width(font, &header, header_scale);

    let grid_width = config.head_size * columns + config.h_spacing * columns.saturating_sub(1);
    let width = grid_width.max(header_width);
    let height = config.header_height + cell_height * num_rows as u32;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    draw_text_mut(
        &mut canvas,
        ONLINE_COLOR,
        ((width - header_width) / 2) as i32,
        4,
        header_scale,
        font,
        &header,
    );

    let default_head = image::load_from_memory(DEFAULT_HEAD)
        .map_err(|e| RenderError::ImageLoad(e.to_string()))?
        .to_rgba8();

    for (i, card) in cards.iter().enumerate() {
        let row = i / per_row;
        let col = i % per_row;
        let items_in_row = min(per_row, cards.len() - row * per_row) as u32;

        let row_width = config.head_size * items_in_row + config.h_spacing * items_in_row.saturating_sub(1);
        let x_offset = (width - row_width) / 2;

        let x = x_offset + col as u32 * (config.head_size + config.h_spacing);
        let y = config.header_height + row as u32 * cell_height;

        let head = card
            .head_data
            .as_deref()
            .and_then(|data| image::load_from_memory(data).ok())
            .map(|img| img.to_rgba8())
            .unwrap_or_else(|| default_head.clone());

        let head = if head.dimensions() != (config.head_size, config.head_size) {
            imageops::resize(
                &head,
                config.head_size,
                config.head_size,
                imageops::FilterType::Nearest,
            )
        } else {
            head
        };

        imageops::overlay(&mut canvas, &head, x.into(), y.into());

        let scale = PxScale::from(calculate_font_size(&card.name, config));
        let text_width = measure_text_width(font, &card.name, scale) as i32;
        let text_x = x as i32 + config.head_size as i32 / 2 - text_width / 2;
        let text_y = (y + config.head_size + 4) as i32;

        draw_text_mut(
            &mut canvas,
            NAME_COLOR,
            text_x,
            text_y,
            scale,
            font,
            &card.name,
        );
    }

    encode_png(canvas)
}

/// Render a single padded line of text.
fn render_message(
    font: &FontRef<'_>,
    text: &str,
    color: Rgba<u8>,
    config: &RenderConfig,
) -> Result<Vec<u8>, RenderError> {
    let scale = PxScale::from(config.font_size);
    let padding = 20u32;
    let width = measure_text_width(font, text, scale) + padding * 2;
    let height = config.font_size as u32 + padding * 2;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    draw_text_mut(
        &mut canvas,
        color,
        padding as i32,
        padding as i32,
        scale,
        font,
        text,
    );

    encode_png(canvas)
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| RenderError::ImageEncode(e.to_string()))?;
    Ok(buf)
}

/// Font size for a name, shrinking long names to fit under the avatar.
fn calculate_font_size(name: &str, config: &RenderConfig) -> f32 {
    // Roughly 0.6em per character
    let char_width_ratio = 0.6;
    let max_text_width = config.head_size as f32;
    let estimated_width = name.chars().count() as f32 * config.font_size * char_width_ratio;

    if estimated_width <= max_text_width {
        config.font_size
    } else {
        let scale_factor = max_text_width / estimated_width;
        (config.font_size * scale_factor).max(config.min_font_size)
    }
}

fn measure_text_width(font: &FontRef<'_>, text: &str, scale: PxScale) -> u32 {
    let scale_factor = scale.x / font.height_unscaled();
    let width: f32 = text
        .chars()
        .map(|c| font.h_advance_unscaled(font.glyph_id(c)) * scale_factor)
        .sum();
    width as u32
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    #[error("failed to load font: {0}")]
    FontLoad(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn dimensions(png: &[u8]) -> (u32, u32) {
        image::load_from_memory(png).unwrap().dimensions()
    }

    fn cards(names: &[&str]) -> Vec<AvatarCard> {
        names
            .iter()
            .map(|name| AvatarCard {
                name: name.to_string(),
                head_data: None,
            })
            .collect()
    }

    #[test]
    fn test_scale_avatar_rejects_garbage() {
        assert!(scale_avatar(b"not a valid png", 64).is_err());
    }

    #[test]
    fn test_scale_avatar_resizes() {
        let scaled = scale_avatar(DEFAULT_HEAD, 32).unwrap();
        assert_eq!(dimensions(&scaled), (32, 32));
    }

    #[test]
    fn test_scale_avatar_keeps_hard_edges() {
        // 2x2 checkerboard scaled up must contain only the original colors.
        let mut tiny = RgbaImage::new(2, 2);
        tiny.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        tiny.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        tiny.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        tiny.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let png = encode_png(tiny).unwrap();

        let scaled = image::load_from_memory(&scale_avatar(&png, 64).unwrap())
            .unwrap()
            .to_rgba8();
        assert!(scaled.pixels().all(|p| {
            *p == Rgba([255, 0, 0, 255]) || *p == Rgba([0, 0, 255, 255])
        }));
        assert_eq!(*scaled.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*scaled.get_pixel(63, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_render_message_states() {
        let config = RenderConfig::default();
        for board in [BoardImage::Loading, BoardImage::Unreachable, BoardImage::Empty] {
            assert!(render_board(&board, &config).is_ok());
        }
    }

    #[test]
    fn test_render_roster_single_row() {
        let config = RenderConfig::default();
        let cards = cards(&["Alice", "Bob"]);
        let png = render_board(
            &BoardImage::Roster {
                online_count: 2,
                cards: &cards,
            },
            &config,
        )
        .unwrap();

        let (_, height) = dimensions(&png);
        assert_eq!(height, config.header_height + 64 + 24 + 8);
    }

    #[test]
    fn test_render_roster_wraps_rows() {
        let config = RenderConfig::default();
        let cards = cards(&[
            "Steve",
            "Alex",
            "Notch",
            "jeb_",
            "Dinnerbone",
            "Grumm",
            "LongUsernamePerson",
        ]);
        let png = render_board(
            &BoardImage::Roster {
                online_count: 7,
                cards: &cards,
            },
            &config,
        )
        .unwrap();

        let (width, height) = dimensions(&png);
        assert_eq!(width, 64 * 5 + 16 * 4);
        assert_eq!(height, config.header_height + (64 + 24 + 8) * 2);
    }

    #[test]
    fn test_render_roster_with_broken_avatar_uses_default() {
        let config = RenderConfig::default();
        let cards = vec![AvatarCard {
            name: "Alice".to_string(),
            head_data: Some(b"broken".to_vec()),
        }];
        assert!(
            render_board(
                &BoardImage::Roster {
                    online_count: 1,
                    cards: &cards,
                },
                &config,
            )
            .is_ok()
        );
    }

    #[test]
    fn test_font_size_scaling() {
        let config = RenderConfig::default();

        let size = calculate_font_size("Bob", &config);
        assert!((size - config.font_size).abs() < 0.01);

        let size = calculate_font_size("VeryLongUsername123", &config);
        assert!(size < config.font_size);
        assert!(size >= config.min_font_size);
    }
}
