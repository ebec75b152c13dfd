//! Rendering surface, the engine seam, and the post-layout color pass.

mod adapter;
mod layout;
pub mod svg;

pub use adapter::{Container, RenderHandle, VisualizationAdapter};
pub use layout::TidyTreeEngine;

use std::collections::{HashMap, HashSet};

use crate::config::RenderSettings;
use crate::error::RenderError;
use crate::label::Label;
use crate::outline::OutlineNode;

/// Child indices from the root.
pub type NodePath = Vec<usize>;

pub fn path_key(path: &[usize]) -> String {
    path.iter().map(usize::to_string).collect::<Vec<_>>().join(".")
}

/// Bounding box in content coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn with_padding(&self, padding: f32) -> Self {
        Self::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BBox::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Pan/zoom applied to the content group: `screen = content * k + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.k, self.y + y * self.k)
    }

    /// Screen → content. A degenerate scale maps everything to the translation origin.
    pub fn invert(&self, x: f32, y: f32) -> (f32, f32) {
        if self.k.abs() < f32::EPSILON {
            return (-self.x, -self.y);
        }
        ((x - self.x) / self.k, (y - self.y) / self.k)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStatus {
    Settled,
    Pending,
}

/// Decoded label forest handed to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayNode {
    pub label: Label,
    pub children: Vec<DisplayNode>,
}

impl DisplayNode {
    pub fn from_outline(node: &OutlineNode) -> Self {
        Self {
            label: Label::decode(&node.label),
            children: node.children.iter().map(DisplayNode::from_outline).collect(),
        }
    }

    /// Single root for the engine; several top-level nodes get a synthetic root
    /// labelled with `title` (empty when absent).
    pub fn root_of(forest: &[DisplayNode], title: Option<&str>) -> Option<DisplayNode> {
        match forest {
            [] => None,
            [only] => Some(only.clone()),
            many => Some(DisplayNode {
                label: Label {
                    body: title.unwrap_or_default().to_string(),
                    ..Label::default()
                },
                children: many.to_vec(),
            }),
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&DisplayNode> {
        let mut node = self;
        for index in path {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    pub fn size(&self) -> usize {
        1 + self.children.iter().map(DisplayNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorLine {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceNode {
    pub path: NodePath,
    pub depth: usize,
    pub label: Label,
    /// Display text without markup.
    pub text: String,
    pub bbox: BBox,
    pub line: ConnectorLine,
    /// Toggle circle, only on nodes that have children.
    pub circle: Option<Circle>,
    pub collapsed: bool,
    /// Set by the color pass.
    pub stroke: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLink {
    pub source: NodePath,
    pub target: NodePath,
    pub d: String,
    pub stroke: Option<String>,
    pub classes: Vec<String>,
}

/// Drawn state of one tree. `revision` changes whenever nodes or links are rebuilt.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub nodes: Vec<SurfaceNode>,
    pub links: Vec<SurfaceLink>,
    pub transform: ViewTransform,
    pub client_width: f32,
    pub client_height: f32,
    pub revision: u64,
    pub collapsed: HashSet<NodePath>,
    pub font_size: f32,
    pub line_width: f32,
    pub padding_x: f32,
}

impl Surface {
    pub fn empty(client_width: f32, client_height: f32) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            transform: ViewTransform::IDENTITY,
            client_width,
            client_height,
            revision: 0,
            collapsed: HashSet::new(),
            font_size: 16.0,
            line_width: 1.5,
            padding_x: 8.0,
        }
    }

    pub fn node(&self, path: &[usize]) -> Option<&SurfaceNode> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// Position of every node in `nodes`, keyed by path. Build once per pass instead of
    /// calling [`Surface::node`] in a loop.
    pub fn path_index(&self) -> HashMap<&[usize], usize> {
        path_index(&self.nodes)
    }

    /// Tight bounds of everything drawn, ignoring the view transform.
    pub fn content_bbox(&self) -> Option<BBox> {
        let mut boxes = self.nodes.iter().map(|node| {
            let mut bbox = node.bbox;
            if let Some(c) = &node.circle {
                bbox = bbox.union(&BBox::new(c.cx - c.r, c.cy - c.r, c.r * 2.0, c.r * 2.0));
            }
            bbox
        });
        let first = boxes.next()?;
        Some(boxes.fold(first, |acc, b| acc.union(&b)))
    }

    /// Visible client rectangle expressed in content coordinates.
    pub fn visible_content_rect(&self) -> BBox {
        let (x0, y0) = self.transform.invert(0.0, 0.0);
        let (x1, y1) = self.transform.invert(self.client_width, self.client_height);
        BBox::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.transform.x += dx;
        self.transform.y += dy;
    }

    /// Zoom by `factor` around the client point `(cx, cy)`.
    pub fn zoom(&mut self, factor: f32, cx: f32, cy: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let (px, py) = self.transform.invert(cx, cy);
        self.transform.k *= factor;
        self.transform.x = cx - px * self.transform.k;
        self.transform.y = cy - py * self.transform.k;
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.client_width = width.max(0.0);
        self.client_height = height.max(0.0);
    }
}

/// Engine options derived from [`RenderSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub font_size: f32,
    pub line_height: f32,
    pub spacing_horizontal: f32,
    pub spacing_vertical: f32,
    pub padding_x: f32,
    pub line_width: f32,
    pub circle_radius: f32,
    pub initial_expand_level: Option<usize>,
    pub fit_ratio: f32,
    pub max_width: Option<f32>,
    pub max_initial_scale: f32,
}

impl From<&RenderSettings> for RenderOptions {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            font_size: settings.font_size,
            line_height: settings.line_height,
            spacing_horizontal: settings.spacing_horizontal,
            spacing_vertical: settings.spacing_vertical,
            padding_x: settings.padding_x,
            line_width: settings.line_width,
            circle_radius: settings.circle_radius,
            initial_expand_level: settings.initial_expand_level,
            fit_ratio: settings.fit_ratio,
            max_width: settings.max_width,
            max_initial_scale: 2.0,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&RenderSettings::default())
    }
}

/// Hierarchy renderer. Implementations draw into a [`Surface`]; the adapter drives them
/// and owns the error boundary.
pub trait RenderEngine {
    fn create(
        &mut self,
        root: &DisplayNode,
        client_width: f32,
        client_height: f32,
    ) -> Result<Surface, RenderError>;

    /// Incremental update: keeps collapse state and transform.
    fn set_data(&mut self, surface: &mut Surface, root: &DisplayNode) -> Result<(), RenderError>;

    /// Map the content into the client area.
    fn fit(&mut self, surface: &mut Surface);

    fn layout_status(&self, surface: &Surface) -> LayoutStatus;
}

fn path_index(nodes: &[SurfaceNode]) -> HashMap<&[usize], usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.path.as_slice(), i))
        .collect()
}

/// Tint nodes, connectors, circles and incoming links by rank band (falling back to the
/// participant color), and tag links with participant edge classes. Safe to repeat.
/// Returns the number of colored nodes.
pub fn apply_colors(surface: &mut Surface) -> usize {
    let mut colored = 0;
    for node in &mut surface.nodes {
        let color = node
            .label
            .band
            .as_ref()
            .and_then(|band| band.color())
            .map(str::to_string)
            .or_else(|| node.label.participant.as_ref().map(|p| p.color().to_string()));
        if color.is_some() {
            colored += 1;
        }
        node.stroke = color;
    }

    let index = path_index(&surface.nodes);
    for link in &mut surface.links {
        let Some(target) = index.get(link.target.as_slice()).map(|&i| &surface.nodes[i]) else {
            continue;
        };
        if let Some(stroke) = &target.stroke {
            link.stroke = Some(stroke.clone());
        }
        if let Some(participant) = &target.label.participant {
            for class in participant.edge_classes() {
                if !link.classes.iter().any(|c| c == class) {
                    link.classes.push((*class).to_string());
                }
            }
        }
    }

    log::debug!("color pass tinted {colored} node(s)");
    colored
}
