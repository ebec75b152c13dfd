//! Graph-derived interchange formats.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::graph::{GraphIndex, GraphNode, TreeGraph};
use super::newick::quote;
use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertFormat {
    Nhx,
    PhyloXml,
    NodesCsv,
    EdgesCsv,
}

impl ConvertFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConvertFormat::Nhx => "nhx",
            ConvertFormat::PhyloXml => "phyloxml",
            ConvertFormat::NodesCsv | ConvertFormat::EdgesCsv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ConvertFormat::Nhx => "text/plain",
            ConvertFormat::PhyloXml => "application/xml",
            ConvertFormat::NodesCsv | ConvertFormat::EdgesCsv => "text/csv",
        }
    }
}

/// Turns a [`TreeGraph`] into a file body.
pub trait GraphConverter {
    fn convert(&self, graph: &TreeGraph, format: ConvertFormat) -> Result<String, ExportError>;
}

/// In-process converter for every [`ConvertFormat`].
#[derive(Debug, Clone, Default)]
pub struct LocalConverter {
    /// `<name>` of each PhyloXML phylogeny.
    pub phylogeny_name: Option<String>,
}

impl LocalConverter {
    pub fn new(phylogeny_name: Option<String>) -> Self {
        Self { phylogeny_name }
    }

    fn nhx(&self, graph: &TreeGraph) -> String {
        let index = graph.index();
        index
            .roots()
            .map(|root| format!("{};", nhx_node(&index, root)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn phyloxml(&self, graph: &TreeGraph) -> Result<String, ExportError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::Start(
                BytesStart::new("phyloxml").with_attributes([("xmlns", "http://www.phyloxml.org")]),
            ))
            .map_err(xml_error)?;
        let index = graph.index();
        for root in index.roots() {
            writer
                .write_event(Event::Start(
                    BytesStart::new("phylogeny").with_attributes([("rooted", "true")]),
                ))
                .map_err(xml_error)?;
            if let Some(name) = &self.phylogeny_name {
                text_element(&mut writer, "name", name)?;
            }
            write_clade(&mut writer, &index, root)?;
            writer
                .write_event(Event::End(BytesEnd::new("phylogeny")))
                .map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("phyloxml")))
            .map_err(xml_error)?;

        String::from_utf8(writer.into_inner()).map_err(|e| ExportError::Xml {
            message: e.to_string(),
        })
    }
}

impl GraphConverter for LocalConverter {
    fn convert(&self, graph: &TreeGraph, format: ConvertFormat) -> Result<String, ExportError> {
        if graph.nodes.is_empty() {
            return Err(ExportError::Empty);
        }
        match format {
            ConvertFormat::Nhx => Ok(self.nhx(graph)),
            ConvertFormat::PhyloXml => self.phyloxml(graph),
            ConvertFormat::NodesCsv => Ok(csv(
                ["id", "name", "rank"],
                graph
                    .nodes
                    .iter()
                    .map(|n| [n.id.as_str(), n.name.as_str(), n.rank.as_str()]),
            )),
            ConvertFormat::EdgesCsv => Ok(csv(
                ["parent_id", "child_id"],
                graph
                    .edges
                    .iter()
                    .map(|e| [e.parent_id.as_str(), e.child_id.as_str()]),
            )),
        }
    }
}

fn nhx_node(index: &GraphIndex<'_>, node: &GraphNode) -> String {
    let children: Vec<String> = index
        .children(&node.id)
        .map(|child| nhx_node(index, child))
        .collect();
    let mut out = String::new();
    if !children.is_empty() {
        out.push('(');
        out.push_str(&children.join(","));
        out.push(')');
    }
    out.push_str(&quote(&node.name));
    if !node.rank.is_empty() {
        out.push_str(&format!("[&&NHX:rank={}]", node.rank));
    }
    out
}

fn write_clade(
    writer: &mut Writer<Vec<u8>>,
    index: &GraphIndex<'_>,
    node: &GraphNode,
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new("clade")))
        .map_err(xml_error)?;
    text_element(writer, "name", &node.name)?;
    if !node.rank.is_empty() {
        writer
            .write_event(Event::Start(BytesStart::new("taxonomy")))
            .map_err(xml_error)?;
        text_element(writer, "rank", &node.rank)?;
        writer
            .write_event(Event::End(BytesEnd::new("taxonomy")))
            .map_err(xml_error)?;
    }
    for child in index.children(&node.id) {
        write_clade(writer, index, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("clade")))
        .map_err(xml_error)?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error(err: impl std::fmt::Display) -> ExportError {
    ExportError::Xml {
        message: err.to_string(),
    }
}

fn csv<'a, const N: usize>(
    header: [&str; N],
    rows: impl Iterator<Item = [&'a str; N]>,
) -> String {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        let fields: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
