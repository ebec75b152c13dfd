//! Overview of the whole tree with the main view's visible rectangle on top.

use crate::rank::NEUTRAL_STROKE;
use crate::render::svg::fmt_num;
use crate::render::{BBox, Surface};
use crate::theme::Theme;
use crate::xml::{attr, class_list};

const FALLBACK_VIEW_BOX: BBox = BBox {
    x: 0.0,
    y: 0.0,
    width: 100.0,
    height: 100.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MiniLink {
    pub d: String,
    pub stroke: String,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MiniLine {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub stroke: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MiniMap {
    pub links: Vec<MiniLink>,
    pub lines: Vec<MiniLine>,
    pub view_box: BBox,
    pub viewport: BBox,
    /// Surface revision the copy was taken from.
    pub revision: u64,
}

impl MiniMap {
    pub fn build(surface: &Surface) -> Self {
        let mut minimap = Self {
            links: Vec::new(),
            lines: Vec::new(),
            view_box: FALLBACK_VIEW_BOX,
            viewport: BBox::default(),
            revision: 0,
        };
        minimap.rebuild(surface);
        minimap
    }

    /// Re-copy links and connector lines from the surface.
    pub fn rebuild(&mut self, surface: &Surface) {
        let index = surface.path_index();
        self.links = surface
            .links
            .iter()
            .map(|link| {
                let own = link
                    .stroke
                    .as_deref()
                    .filter(|stroke| !stroke.eq_ignore_ascii_case(NEUTRAL_STROKE));
                // Uncolored links borrow the stroke of the connector they lead to.
                let stroke = own
                    .or_else(|| {
                        index
                            .get(link.target.as_slice())
                            .and_then(|&i| surface.nodes[i].stroke.as_deref())
                    })
                    .or(link.stroke.as_deref())
                    .unwrap_or(NEUTRAL_STROKE);
                MiniLink {
                    d: link.d.clone(),
                    stroke: stroke.to_string(),
                    classes: link.classes.clone(),
                }
            })
            .collect();

        self.lines = surface
            .nodes
            .iter()
            .map(|node| MiniLine {
                x1: node.line.x1,
                y1: node.line.y1,
                x2: node.line.x2,
                y2: node.line.y2,
                stroke: node
                    .stroke
                    .clone()
                    .unwrap_or_else(|| NEUTRAL_STROKE.to_string()),
            })
            .collect();

        self.view_box = surface
            .content_bbox()
            .filter(|bbox| !bbox.is_empty())
            .unwrap_or(FALLBACK_VIEW_BOX);
        self.revision = surface.revision;
        self.update_viewport(surface);
    }

    /// Visible rectangle of the main view, in content coordinates.
    pub fn update_viewport(&mut self, surface: &Surface) {
        self.viewport = surface.visible_content_rect();
    }

    /// Rebuild when the surface was redrawn, otherwise only move the viewport. Returns
    /// whether a rebuild happened.
    pub fn sync(&mut self, surface: &Surface) -> bool {
        if self.revision != surface.revision {
            self.rebuild(surface);
            true
        } else {
            self.update_viewport(surface);
            false
        }
    }

    pub fn to_svg(&self, theme: &Theme) -> String {
        let vb = &self.view_box;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="minimap" viewBox="{} {} {} {}" preserveAspectRatio="xMidYMid meet">"#,
            fmt_num(vb.x),
            fmt_num(vb.y),
            fmt_num(vb.width),
            fmt_num(vb.height),
        );
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" {}/>"#,
            fmt_num(vb.x),
            fmt_num(vb.y),
            fmt_num(vb.width),
            fmt_num(vb.height),
            attr("fill", &theme.background_color),
        ));
        for link in &self.links {
            let classes =
                class_list(std::iter::once("mini-link").chain(link.classes.iter().map(String::as_str)));
            svg.push_str(&format!(
                r#"<path {} {} {} fill="none"/>"#,
                attr("class", &classes),
                attr("d", &link.d),
                attr("stroke", &link.stroke),
            ));
        }
        for line in &self.lines {
            svg.push_str(&format!(
                r#"<line class="mini-line" x1="{}" y1="{}" x2="{}" y2="{}" {}/>"#,
                fmt_num(line.x1),
                fmt_num(line.y1),
                fmt_num(line.x2),
                fmt_num(line.y2),
                attr("stroke", &line.stroke),
            ));
        }
        let vp = &self.viewport;
        svg.push_str(&format!(
            r#"<rect class="mini-viewport" x="{}" y="{}" width="{}" height="{}" fill="none" {}/>"#,
            fmt_num(vp.x),
            fmt_num(vp.y),
            fmt_num(vp.width),
            fmt_num(vp.height),
            attr("stroke", &theme.text_color),
        ));
        svg.push_str("</svg>");
        svg
    }
}
