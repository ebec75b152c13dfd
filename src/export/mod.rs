//! Serialisation of a rendered or built tree: raster images, the interactive HTML
//! document, Newick and the graph-derived interchange formats.

mod convert;
mod graph;
mod html;
mod newick;
mod raster;

pub use convert::{ConvertFormat, GraphConverter, LocalConverter};
pub use graph::{GraphEdge, GraphIndex, GraphNode, TreeGraph};
pub use html::export_interactive_document;
pub use newick::{NewickOptions, to_newick};
pub use raster::{RasterFormat, RasterImage, RasterOptions, export_raster};

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExportError;
use crate::render::Surface;
use crate::theme::Theme;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").expect("valid file-name regex"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid underscore regex"));

/// Who and what a tree shows; used for titles and file names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeMeta {
    pub title: Option<String>,
    /// One user for a personal tree, two for a comparison.
    pub users: Vec<String>,
    pub taxon_name: Option<String>,
    pub taxon_id: Option<i64>,
    pub observed_from: Option<String>,
    pub observed_to: Option<String>,
}

impl TreeMeta {
    pub fn is_comparison(&self) -> bool {
        self.users.len() >= 2
    }

    pub fn who(&self) -> String {
        match self.users.as_slice() {
            [] => "user".to_string(),
            [one] => one.clone(),
            [first, second, ..] => format!("{first}_vs_{second}"),
        }
    }

    pub fn what(&self) -> String {
        match (&self.taxon_name, self.taxon_id) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(id)) => format!("Taxon_{id}"),
            _ => self.title.clone().unwrap_or_else(|| "tree".to_string()),
        }
    }

    /// Observation date window, `from → to` with an ellipsis for an open end.
    pub fn date_window(&self) -> Option<String> {
        match (self.observed_from.as_deref(), self.observed_to.as_deref()) {
            (None, None) => None,
            (Some(from), Some(to)) => Some(format!("{from} → {to}")),
            (Some(from), None) => Some(format!("{from} → …")),
            (None, Some(to)) => Some(format!("… → {to}")),
        }
    }

    /// `who-what`, followed by the date window when one is set.
    pub fn label(&self) -> String {
        let mut label = format!("{}-{}", self.who(), self.what());
        if let Some(window) = self.date_window() {
            label.push(' ');
            label.push_str(&window);
        }
        label
    }

    /// Label for the root of a multi-root forest.
    pub fn root_label(&self) -> Option<String> {
        self.title.clone().or_else(|| {
            self.taxon_name
                .clone()
                .or_else(|| self.taxon_id.map(|id| format!("Taxon {id}")))
        })
    }
}

/// Runs of anything but ASCII word chars and `-` become one `_`; edges are trimmed.
pub fn file_safe_name(name: &str) -> String {
    let replaced = UNSAFE_FILE_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Base name (no extension) for files exported from `meta`.
pub fn file_stem(meta: &TreeMeta) -> String {
    let stem = file_safe_name(&meta.label());
    if stem.is_empty() {
        "tree".to_string()
    } else {
        stem
    }
}

/// Standalone SVG of the export view.
pub fn export_svg(surface: &Surface, theme: &Theme, padding: f32) -> Result<String, ExportError> {
    crate::render::svg::export_svg(surface, theme, padding)
        .map(|(svg, _)| svg)
        .ok_or(ExportError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_safe_name_collapses_and_trims() {
        assert_eq!(file_safe_name("  Felis catus / (wild) "), "Felis_catus_wild");
        assert_eq!(file_safe_name("a--b__c"), "a--b_c");
        assert_eq!(file_safe_name("Å"), "");
    }

    #[test]
    fn label_names_users_and_taxon() {
        let meta = TreeMeta {
            users: vec!["alice".into(), "bob".into()],
            taxon_name: Some("Felidae".into()),
            observed_from: Some("2024-01-01".into()),
            ..TreeMeta::default()
        };
        assert!(meta.is_comparison());
        assert_eq!(meta.label(), "alice_vs_bob-Felidae 2024-01-01 → …");
        assert_eq!(file_stem(&meta), "alice_vs_bob-Felidae_2024-01-01");
    }

    #[test]
    fn label_falls_back_to_defaults() {
        let meta = TreeMeta {
            taxon_id: Some(41),
            ..TreeMeta::default()
        };
        assert_eq!(meta.label(), "user-Taxon_41");
        assert_eq!(meta.root_label().as_deref(), Some("Taxon 41"));
        assert_eq!(file_stem(&TreeMeta::default()), "user-tree");
    }
}
