//! Surface → SVG text.
//!
//! The live view keeps the pan/zoom transform on the content group. The export view
//! drops it and crops the viewBox to the padded content bounds over a solid background.

use super::{BBox, Surface, SurfaceLink, SurfaceNode, ViewTransform};
use crate::theme::Theme;
use crate::xml::{attr, class_list, escape_xml};

const BADGE_GAP: f32 = 4.0;
const TEXT_BASELINE_OFFSET: f32 = 5.0;

/// SVG of the client area as currently panned and zoomed.
pub fn live_svg(surface: &Surface, theme: &Theme) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="markmap" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = fmt_num(surface.client_width),
        h = fmt_num(surface.client_height),
    ));
    write_content(&mut svg, surface, theme, surface.transform);
    svg.push_str("</svg>");
    svg
}

/// SVG cropped to the content, transform neutralised, theme background filled.
/// Returns the padded bounds alongside; `None` when nothing is drawn.
pub fn export_svg(surface: &Surface, theme: &Theme, padding: f32) -> Option<(String, BBox)> {
    let bbox = surface.content_bbox()?.with_padding(padding.max(0.0));
    if bbox.is_empty() {
        return None;
    }

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="markmap" width="{w}" height="{h}" viewBox="{x} {y} {w} {h}">"#,
        x = fmt_num(bbox.x),
        y = fmt_num(bbox.y),
        w = fmt_num(bbox.width),
        h = fmt_num(bbox.height),
    ));
    svg.push_str(&format!(
        r#"<rect x="{}" y="{}" width="{}" height="{}" {}/>"#,
        fmt_num(bbox.x),
        fmt_num(bbox.y),
        fmt_num(bbox.width),
        fmt_num(bbox.height),
        attr("fill", &theme.background_color),
    ));
    write_content(&mut svg, surface, theme, ViewTransform::IDENTITY);
    svg.push_str("</svg>");
    Some((svg, bbox))
}

fn write_content(svg: &mut String, surface: &Surface, theme: &Theme, transform: ViewTransform) {
    if transform.is_identity() {
        svg.push_str("<g>");
    } else {
        svg.push_str(&format!(
            r#"<g transform="translate({},{}) scale({})">"#,
            fmt_num(transform.x),
            fmt_num(transform.y),
            fmt_num(transform.k)
        ));
    }
    for link in &surface.links {
        write_link(svg, link, surface.line_width, theme);
    }
    for node in &surface.nodes {
        write_node(svg, node, surface, theme);
    }
    svg.push_str("</g>");
}

fn write_link(svg: &mut String, link: &SurfaceLink, line_width: f32, theme: &Theme) {
    let stroke = link.stroke.as_deref().unwrap_or(&theme.link_color);
    let classes = class_list(
        std::iter::once("markmap-link").chain(link.classes.iter().map(String::as_str)),
    );
    svg.push_str(&format!(
        r#"<path {} {} {} fill="none" stroke-width="{}"/>"#,
        attr("class", &classes),
        attr("d", &link.d),
        attr("stroke", stroke),
        fmt_num(line_width),
    ));
}

fn write_node(svg: &mut String, node: &SurfaceNode, surface: &Surface, theme: &Theme) {
    let stroke = node.stroke.as_deref().unwrap_or(&theme.link_color);
    let participant = node.label.participant.as_ref().map(|p| p.node_class());
    let classes = class_list(["markmap-node", participant.unwrap_or_default()]);

    svg.push_str(&format!(
        r#"<g {} {}"#,
        attr("class", &classes),
        attr("data-path", &super::path_key(&node.path))
    ));
    if let Some(rank) = &node.label.rank {
        svg.push(' ');
        svg.push_str(&attr("data-rank", rank));
    }
    svg.push('>');

    let line = &node.line;
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {} stroke-width="{}"/>"#,
        fmt_num(line.x1),
        fmt_num(line.y1),
        fmt_num(line.x2),
        fmt_num(line.y2),
        attr("stroke", stroke),
        fmt_num(surface.line_width),
    ));
    if let Some(circle) = &node.circle {
        let fill = if node.collapsed {
            stroke
        } else {
            theme.background_color.as_str()
        };
        svg.push_str(&format!(
            r#"<circle cx="{}" cy="{}" r="{}" {} {} stroke-width="{}"/>"#,
            fmt_num(circle.cx),
            fmt_num(circle.cy),
            fmt_num(circle.r),
            attr("fill", fill),
            attr("stroke", stroke),
            fmt_num(surface.line_width),
        ));
    }

    let text_x = node.bbox.x + surface.padding_x;
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" {} {} font-size="{}">"#,
        fmt_num(text_x),
        fmt_num(node.bbox.bottom() - TEXT_BASELINE_OFFSET),
        attr("fill", &theme.text_color),
        attr("font-family", &theme.font_family),
        fmt_num(surface.font_size),
    ));
    match node.label.href() {
        Some(href) => svg.push_str(&format!(
            "<a {}>{}</a>",
            attr("href", &href),
            escape_xml(&node.text)
        )),
        None => svg.push_str(&escape_xml(&node.text)),
    }
    if let (Some(glyph), Some(band)) = (node.label.glyph, &node.label.band) {
        let color = band.color().unwrap_or(theme.link_color.as_str());
        svg.push_str(&format!(
            r#"<tspan class="mm-badge mm-rank" dx="{}" {} {}>{}</tspan>"#,
            fmt_num(BADGE_GAP),
            attr("fill", color),
            attr("data-band", band.as_str()),
            escape_xml(&glyph.to_string()),
        ));
    }
    svg.push_str("</text></g>");
}

pub(crate) fn fmt_num(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
