use crate::workspace::TreeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown tree: {0}")]
    UnknownTree(TreeId),
}

/// Input decoding failures. Row-level problems never surface here; they fall back to
/// placeholders inside the builder.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid taxon rows JSON: {message}")]
    RowsJson { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Nothing to render")]
    EmptyForest,

    #[error("Layout produced no drawable content")]
    NoDrawableContent,

    #[error("Rendering engine failed: {message}")]
    Engine { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Tree has no content to export")]
    Empty,

    #[error("Failed to parse SVG: {message}")]
    SvgParse { message: String },

    #[error("Failed to allocate a {width}x{height} pixmap")]
    PixmapAlloc { width: u32, height: u32 },

    #[error("Invalid raster scale: {0}")]
    InvalidScale(f32),

    #[error("Failed to encode PNG: {message}")]
    PngEncode { message: String },

    #[error("Failed to encode JPEG: {message}")]
    JpegEncode { message: String },

    #[error("Image is {size} bytes after {attempts} attempts, budget is {budget} bytes")]
    Oversized {
        size: usize,
        budget: usize,
        attempts: usize,
    },

    #[error("Failed to write XML: {message}")]
    Xml { message: String },

    #[error("Failed to serialize graph: {message}")]
    Json { message: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings as TOML ({toml}) or YAML ({yaml})")]
    Parse { toml: String, yaml: String },

    #[error("Unknown built-in theme '{name}'. Available: {available}")]
    UnknownTheme { name: String, available: String },

    #[error("Failed to parse theme: {message}")]
    Theme { message: String },
}
