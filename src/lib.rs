//! Flat taxonomy rows → rank-aware tree → rendered surface and exports.

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod fonts;
pub mod label;
pub mod minimap;
pub mod outline;
pub mod rank;
pub mod render;
pub mod scheduler;
pub mod taxonomy;
pub mod theme;
pub mod timeline;
pub mod workspace;
mod xml;

pub use cache::{CachedTree, TreeCache};
pub use config::Settings;
pub use error::{BuildError, ConfigError, Error, ExportError, RenderError, Result};
pub use label::{Label, Participant, decorate, to_plain_text};
pub use outline::{OutlineNode, parse_outline};
pub use rank::RankBand;
pub use render::{DisplayNode, RenderEngine, Surface, TidyTreeEngine, VisualizationAdapter};
pub use taxonomy::{Forest, TaxonNode, TaxonRow, build, build_forest, rows_from_json};
pub use theme::Theme;
pub use workspace::{Tree, TreeId, TreeSource, TreeWorkspace};
