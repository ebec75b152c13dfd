use std::path::Path;

use resvg::usvg;
use tiny_skia::{Color, Pixmap, Transform};

use crate::config::ExportSettings;
use crate::error::ExportError;
use crate::render::Surface;
use crate::render::svg::export_svg;
use crate::theme::{Theme, parse_hex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    pub format: RasterFormat,
    pub scale: f32,
    pub padding: f32,
    /// Byte budget; exceeding it switches to lossy retries.
    pub max_bytes: Option<usize>,
    pub jpeg_quality: u8,
    pub jpeg_min_quality: u8,
    pub jpeg_quality_step: u8,
    pub downscale_factor: f32,
    pub max_attempts: usize,
}

impl From<&ExportSettings> for RasterOptions {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            format: RasterFormat::Png,
            scale: settings.png_scale,
            padding: settings.padding,
            max_bytes: settings.max_bytes,
            jpeg_quality: settings.jpeg_quality,
            jpeg_min_quality: settings.jpeg_min_quality,
            jpeg_quality_step: settings.jpeg_quality_step,
            downscale_factor: settings.downscale_factor,
            max_attempts: settings.max_attempts,
        }
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: RasterFormat,
}

/// Rasterise the export view of `surface`. Pixel size is `ceil(bounds * scale)`.
///
/// With a byte budget the image is re-encoded as JPEG, lowering quality step by step
/// and then shrinking the scale, until it fits or the attempts run out.
pub fn export_raster(
    surface: &Surface,
    theme: &Theme,
    options: &RasterOptions,
) -> Result<RasterImage, ExportError> {
    if !options.scale.is_finite() || options.scale <= 0.0 {
        return Err(ExportError::InvalidScale(options.scale));
    }
    let (svg, bounds) =
        export_svg(surface, theme, options.padding).ok_or(ExportError::Empty)?;
    let tree = parse_svg(&svg)?;
    let page = Page {
        tree: &tree,
        width: bounds.width,
        height: bounds.height,
    };

    let first = match options.format {
        RasterFormat::Png => encode_png(&page, options.scale)?,
        RasterFormat::Jpeg => encode_jpeg(&page, options.scale, options.jpeg_quality, theme)?,
    };
    let Some(budget) = options.max_bytes else {
        return Ok(first);
    };
    if first.bytes.len() <= budget {
        return Ok(first);
    }

    let mut last_size = first.bytes.len();
    for (attempt, (quality, scale)) in retry_plan(options).enumerate() {
        let image = encode_jpeg(&page, scale, quality, theme)?;
        log::debug!(
            "raster attempt {}: {} bytes at quality {quality}, scale {scale:.3}",
            attempt + 1,
            image.bytes.len()
        );
        if image.bytes.len() <= budget {
            return Ok(image);
        }
        last_size = image.bytes.len();
    }

    Err(ExportError::Oversized {
        size: last_size,
        budget,
        attempts: options.max_attempts,
    })
}

/// Quality and scale of each lossy retry: quality drops by the step while above the
/// minimum, then the scale shrinks. A JPEG request already spent its first encode on
/// the starting quality, so its retries begin one step further.
fn retry_plan(options: &RasterOptions) -> impl Iterator<Item = (u8, f32)> + '_ {
    let start = (options.jpeg_quality, options.scale);
    let plan = std::iter::successors(Some(start), move |&(quality, scale)| {
        Some(if quality > options.jpeg_min_quality {
            (quality.saturating_sub(options.jpeg_quality_step).max(1), scale)
        } else {
            (quality, scale * options.downscale_factor)
        })
    });
    let spent = usize::from(options.format == RasterFormat::Jpeg);
    plan.skip(spent).take(options.max_attempts)
}

/// Parsed export SVG plus its unrounded bounds.
struct Page<'a> {
    tree: &'a usvg::Tree,
    width: f32,
    height: f32,
}

fn parse_svg(svg: &str) -> Result<usvg::Tree, ExportError> {
    let mut opts = usvg::Options::default();
    {
        let fontdb = opts.fontdb_mut();
        fontdb.load_system_fonts();

        let local_fonts = Path::new("fonts");
        if local_fonts.is_dir() {
            fontdb.load_fonts_dir(local_fonts);
        }

        configure_font_fallbacks(fontdb);
    }

    usvg::Tree::from_str(svg, &opts).map_err(|e| ExportError::SvgParse {
        message: e.to_string(),
    })
}

fn render_pixmap(
    page: &Page<'_>,
    scale: f32,
    background: Option<Color>,
) -> Result<Pixmap, ExportError> {
    let width = (page.width * scale).ceil() as u32;
    let height = (page.height * scale).ceil() as u32;

    let mut pixmap =
        Pixmap::new(width, height).ok_or(ExportError::PixmapAlloc { width, height })?;
    if let Some(color) = background {
        pixmap.fill(color);
    }
    resvg::render(page.tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    Ok(pixmap)
}

fn encode_png(page: &Page<'_>, scale: f32) -> Result<RasterImage, ExportError> {
    let pixmap = render_pixmap(page, scale, None)?;
    let bytes = pixmap.encode_png().map_err(|e| ExportError::PngEncode {
        message: e.to_string(),
    })?;
    Ok(RasterImage {
        bytes,
        width: pixmap.width(),
        height: pixmap.height(),
        format: RasterFormat::Png,
    })
}

fn encode_jpeg(
    page: &Page<'_>,
    scale: f32,
    quality: u8,
    theme: &Theme,
) -> Result<RasterImage, ExportError> {
    let (r, g, b) = parse_hex(&theme.background_color).unwrap_or((255, 255, 255));
    let pixmap = render_pixmap(page, scale, Some(Color::from_rgba8(r, g, b, 255)))?;
    let (width, height) = (pixmap.width(), pixmap.height());

    // Opaque background, so alpha is always 255 and can be dropped.
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in pixmap.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }

    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode(&rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| ExportError::JpegEncode {
            message: e.to_string(),
        })?;
    Ok(RasterImage {
        bytes,
        width,
        height,
        format: RasterFormat::Jpeg,
    })
}

fn configure_font_fallbacks(fontdb: &mut usvg::fontdb::Database) {
    let mut sans_family: Option<String> = None;
    let mut first_family: Option<String> = None;

    for face in fontdb.faces() {
        for (family, _) in &face.families {
            if first_family.is_none() {
                first_family = Some(family.clone());
            }
            if sans_family.is_none() && family.to_ascii_lowercase().contains("sans") {
                sans_family = Some(family.clone());
            }
        }
    }

    if let Some(family) = sans_family.as_deref().or(first_family.as_deref()) {
        fontdb.set_sans_serif_family(family);
    }
}
