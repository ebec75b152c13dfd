use std::collections::HashSet;

use super::{
    BBox, Circle, ConnectorLine, DisplayNode, LayoutStatus, NodePath, RenderEngine,
    RenderOptions, Surface, SurfaceLink, SurfaceNode,
};
use crate::error::RenderError;
use crate::fonts::TextMeasure;

/// Left-to-right tidy tree: columns by depth, leaves stacked top to bottom, parents
/// centred on their visible children. Layout is synchronous, so it is always settled.
pub struct TidyTreeEngine<M: TextMeasure> {
    measure: M,
    options: RenderOptions,
}

struct Frame<'a> {
    collapsed: &'a HashSet<NodePath>,
    nodes: Vec<SurfaceNode>,
    links: Vec<SurfaceLink>,
    cursor_y: f32,
}

impl<M: TextMeasure> TidyTreeEngine<M> {
    pub fn new(measure: M, options: RenderOptions) -> Self {
        Self { measure, options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn initial_collapse(&self, root: &DisplayNode) -> HashSet<NodePath> {
        let mut collapsed = HashSet::new();
        if let Some(level) = self.options.initial_expand_level {
            collect_deep_parents(root, &mut Vec::new(), level, &mut collapsed);
        }
        collapsed
    }

    fn layout(&mut self, surface: &mut Surface, root: &DisplayNode) -> Result<(), RenderError> {
        if root.label.text().is_empty() && root.children.is_empty() {
            return Err(RenderError::NoDrawableContent);
        }

        surface.collapsed.retain(|path| {
            root.get(path).is_some_and(|node| !node.children.is_empty())
        });

        let mut frame = Frame {
            collapsed: &surface.collapsed,
            nodes: Vec::with_capacity(root.size()),
            links: Vec::new(),
            cursor_y: 0.0,
        };
        self.place(root, &mut Vec::new(), 0.0, &mut frame);

        let (nodes, links) = (frame.nodes, frame.links);
        if nodes.iter().all(|n| n.bbox.is_empty()) {
            return Err(RenderError::NoDrawableContent);
        }
        surface.nodes = nodes;
        surface.links = links;
        surface.font_size = self.options.font_size;
        surface.line_width = self.options.line_width;
        surface.padding_x = self.options.padding_x;
        surface.revision += 1;
        Ok(())
    }

    /// Places `node` and its visible subtree; returns the node's box.
    fn place(
        &mut self,
        node: &DisplayNode,
        path: &mut NodePath,
        x: f32,
        frame: &mut Frame<'_>,
    ) -> BBox {
        let opts = &self.options;
        let text = node.label.text();
        let measured_text = match node.label.glyph {
            Some(glyph) => format!("{text} {glyph}"),
            None => text.clone(),
        };
        let (text_width, text_height) =
            self.measure
                .measure_text(&measured_text, opts.font_size, opts.max_width);
        let width = text_width + opts.padding_x * 2.0;
        let height = text_height.max(opts.line_height);

        let has_children = !node.children.is_empty();
        let collapsed = has_children && frame.collapsed.contains(path.as_slice());

        let index = frame.nodes.len();
        frame.nodes.push(SurfaceNode {
            path: path.clone(),
            depth: path.len(),
            label: node.label.clone(),
            text,
            bbox: BBox::default(),
            line: ConnectorLine {
                x1: 0.0,
                y1: 0.0,
                x2: 0.0,
                y2: 0.0,
            },
            circle: None,
            collapsed,
            stroke: None,
        });

        let start_y = frame.cursor_y;
        let child_x = x + width + opts.spacing_horizontal;
        let spacing_vertical = opts.spacing_vertical;
        let mut child_boxes = Vec::new();
        if has_children && !collapsed {
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                let bbox = self.place(child, path, child_x, frame);
                child_boxes.push((path.clone(), bbox));
                path.pop();
            }
        }

        let y = match (child_boxes.first(), child_boxes.last()) {
            (Some((_, first)), Some((_, last))) => {
                ((first.bottom() + last.bottom()) / 2.0 - height).max(start_y)
            }
            _ => start_y,
        };
        frame.cursor_y = frame.cursor_y.max(y + height + spacing_vertical);

        let bbox = BBox::new(x, y, width, height);
        let opts = &self.options;
        let slot = &mut frame.nodes[index];
        slot.bbox = bbox;
        slot.line = ConnectorLine {
            x1: bbox.x,
            y1: bbox.bottom(),
            x2: bbox.right(),
            y2: bbox.bottom(),
        };
        if has_children {
            slot.circle = Some(Circle {
                cx: bbox.right(),
                cy: bbox.bottom(),
                r: opts.circle_radius,
            });
        }

        let (sx, sy) = (bbox.right(), bbox.bottom());
        for (target, child) in child_boxes {
            let (tx, ty) = (child.x, child.bottom());
            let mx = (sx + tx) / 2.0;
            frame.links.push(SurfaceLink {
                source: path.clone(),
                target,
                d: format!("M{sx:.1},{sy:.1}C{mx:.1},{sy:.1} {mx:.1},{ty:.1} {tx:.1},{ty:.1}"),
                stroke: None,
                classes: Vec::new(),
            });
        }

        bbox
    }
}

fn collect_deep_parents(
    node: &DisplayNode,
    path: &mut NodePath,
    level: usize,
    out: &mut HashSet<NodePath>,
) {
    if node.children.is_empty() {
        return;
    }
    if path.len() >= level {
        out.insert(path.clone());
    }
    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        collect_deep_parents(child, path, level, out);
        path.pop();
    }
}

impl<M: TextMeasure> RenderEngine for TidyTreeEngine<M> {
    fn create(
        &mut self,
        root: &DisplayNode,
        client_width: f32,
        client_height: f32,
    ) -> Result<Surface, RenderError> {
        let mut surface = Surface::empty(client_width, client_height);
        surface.collapsed = self.initial_collapse(root);
        self.layout(&mut surface, root)?;
        Ok(surface)
    }

    fn set_data(&mut self, surface: &mut Surface, root: &DisplayNode) -> Result<(), RenderError> {
        self.layout(surface, root)
    }

    fn fit(&mut self, surface: &mut Surface) {
        let Some(bbox) = surface.content_bbox() else {
            return;
        };
        if bbox.is_empty() || surface.client_width <= 0.0 || surface.client_height <= 0.0 {
            return;
        }
        let k = (surface.client_width / bbox.width)
            .min(surface.client_height / bbox.height)
            * self.options.fit_ratio;
        let k = k.min(self.options.max_initial_scale);
        surface.transform.k = k;
        surface.transform.x = (surface.client_width - bbox.width * k) / 2.0 - bbox.x * k;
        surface.transform.y = (surface.client_height - bbox.height * k) / 2.0 - bbox.y * k;
    }

    fn layout_status(&self, _surface: &Surface) -> LayoutStatus {
        LayoutStatus::Settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::ApproxTextMeasure;
    use crate::outline::parse_outline;

    fn root(outline: &str) -> DisplayNode {
        let forest: Vec<DisplayNode> = parse_outline(outline)
            .iter()
            .map(DisplayNode::from_outline)
            .collect();
        DisplayNode::root_of(&forest, None).unwrap()
    }

    fn engine(options: RenderOptions) -> TidyTreeEngine<ApproxTextMeasure> {
        TidyTreeEngine::new(ApproxTextMeasure::default(), options)
    }

    #[test]
    fn lays_out_left_to_right_with_stacked_leaves() {
        let mut engine = engine(RenderOptions::default());
        let surface = engine
            .create(&root("- Root\n  - A\n  - B\n  - C"), 800.0, 600.0)
            .unwrap();
        assert_eq!(surface.nodes.len(), 4);
        assert_eq!(surface.links.len(), 3);

        let root = surface.node(&[]).unwrap();
        let a = surface.node(&[0]).unwrap();
        let b = surface.node(&[1]).unwrap();
        let c = surface.node(&[2]).unwrap();
        assert!(a.bbox.x > root.bbox.right());
        assert_eq!(a.bbox.x, b.bbox.x);
        assert!(b.bbox.y >= a.bbox.bottom());
        assert!(c.bbox.y >= b.bbox.bottom());
        // Parent line sits at the middle child's line.
        assert!((root.bbox.bottom() - b.bbox.bottom()).abs() < 0.01);
        assert!(root.circle.is_some());
        assert!(a.circle.is_none());
    }

    #[test]
    fn links_run_from_parent_circle_to_child_line() {
        let mut engine = engine(RenderOptions::default());
        let surface = engine.create(&root("- P\n  - C"), 800.0, 600.0).unwrap();
        let link = &surface.links[0];
        assert_eq!(link.source, Vec::<usize>::new());
        assert_eq!(link.target, vec![0]);
        assert!(link.d.starts_with('M'));
        assert!(link.d.contains('C'));
    }

    #[test]
    fn initial_expand_level_collapses_deep_parents() {
        let options = RenderOptions {
            initial_expand_level: Some(1),
            ..RenderOptions::default()
        };
        let mut engine = engine(options);
        let surface = engine
            .create(&root("- R\n  - A\n    - A1\n  - B"), 800.0, 600.0)
            .unwrap();
        assert_eq!(surface.nodes.len(), 3);
        assert!(surface.node(&[0]).unwrap().collapsed);
        assert!(surface.collapsed.contains(&vec![0]));
    }

    #[test]
    fn set_data_keeps_collapse_state_and_bumps_revision() {
        let mut engine = engine(RenderOptions::default());
        let first = root("- R\n  - A\n    - A1");
        let mut surface = engine.create(&first, 800.0, 600.0).unwrap();
        let revision = surface.revision;
        surface.collapsed.insert(vec![0]);
        engine.set_data(&mut surface, &first).unwrap();
        assert_eq!(surface.nodes.len(), 2);
        assert!(surface.revision > revision);

        // Collapse marks on nodes that lost their children are pruned.
        engine.set_data(&mut surface, &root("- R\n  - A")).unwrap();
        assert!(surface.collapsed.is_empty());
    }

    #[test]
    fn fit_centres_content_within_ratio() {
        let mut engine = engine(RenderOptions::default());
        let mut surface = engine
            .create(&root("- Felidae\n  - Felis\n  - Lynx"), 800.0, 600.0)
            .unwrap();
        engine.fit(&mut surface);
        let bbox = surface.content_bbox().unwrap();
        let (x0, y0) = surface.transform.apply(bbox.x, bbox.y);
        let (x1, y1) = surface.transform.apply(bbox.right(), bbox.bottom());
        assert!(x0 >= 0.0 && y0 >= 0.0);
        assert!(x1 <= 800.0 && y1 <= 600.0);
        assert!(((x0 + x1) / 2.0 - 400.0).abs() < 0.01);
        assert!(surface.transform.k <= 2.0);
    }

    #[test]
    fn empty_label_without_children_is_not_drawable() {
        let mut engine = engine(RenderOptions::default());
        let err = engine.create(&DisplayNode::default(), 800.0, 600.0).unwrap_err();
        assert!(matches!(err, RenderError::NoDrawableContent));
    }
}
