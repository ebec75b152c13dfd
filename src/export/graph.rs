use std::collections::HashMap;

use serde::Serialize;

use crate::error::ExportError;
use crate::label::clean_graph_label;
use crate::render::DisplayNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    /// Fine rank, empty when the label carries none.
    pub rank: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub parent_id: String,
    pub child_id: String,
}

/// Flat `{nodes, edges}` view of a tree. Ids are `n1`, `n2`, … in depth-first order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl TreeGraph {
    /// Graph of the whole forest; several tops hang under a node named `title`.
    pub fn from_forest(forest: &[DisplayNode], title: Option<&str>) -> Self {
        match DisplayNode::root_of(forest, title) {
            Some(root) => Self::from_root(&root),
            None => Self::default(),
        }
    }

    pub fn from_root(root: &DisplayNode) -> Self {
        let mut graph = Self::default();
        let mut top = root;
        while top.label.text().is_empty() && top.children.len() == 1 {
            top = &top.children[0];
        }
        graph.visit(top, None);
        graph
    }

    fn visit(&mut self, node: &DisplayNode, parent: Option<&str>) {
        let id = format!("n{}", self.nodes.len() + 1);
        let name = clean_graph_label(&node.label.body);
        self.nodes.push(GraphNode {
            name: if name.is_empty() {
                format!("node_{}", self.nodes.len() + 1)
            } else {
                name
            },
            id: id.clone(),
            rank: node.label.rank.clone().unwrap_or_default(),
        });
        if let Some(parent) = parent {
            self.edges.push(GraphEdge {
                parent_id: parent.to_string(),
                child_id: id.clone(),
            });
        }
        for child in &node.children {
            self.visit(child, Some(&id));
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Adjacency built in one pass over nodes and edges. Traversals should take this once
    /// rather than walking `edges` per node.
    pub fn index(&self) -> GraphIndex<'_> {
        let position: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let mut children = vec![Vec::new(); self.nodes.len()];
        let mut has_parent = vec![false; self.nodes.len()];
        for edge in &self.edges {
            let (Some(&parent), Some(&child)) = (
                position.get(edge.parent_id.as_str()),
                position.get(edge.child_id.as_str()),
            ) else {
                continue;
            };
            children[parent].push(child);
            has_parent[child] = true;
        }
        let roots = (0..self.nodes.len()).filter(|&i| !has_parent[i]).collect();
        GraphIndex {
            graph: self,
            position,
            children,
            roots,
        }
    }

    pub fn children_of<'a>(&'a self, id: &str) -> Vec<&'a GraphNode> {
        self.index().children(id).collect()
    }

    /// Nodes that are nobody's child.
    pub fn roots(&self) -> Vec<&GraphNode> {
        self.index().roots().collect()
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self).map_err(|e| ExportError::Json {
            message: e.to_string(),
        })
    }
}

/// Parent to children lookup over a [`TreeGraph`], in edge order.
#[derive(Debug)]
pub struct GraphIndex<'a> {
    graph: &'a TreeGraph,
    position: HashMap<&'a str, usize>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a> GraphIndex<'a> {
    pub fn node(&self, id: &str) -> Option<&'a GraphNode> {
        self.position.get(id).map(|&i| &self.graph.nodes[i])
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &'a GraphNode> + '_ {
        let graph = self.graph;
        self.position
            .get(id)
            .map(|&i| self.children[i].as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&c| &graph.nodes[c])
    }

    pub fn roots(&self) -> impl Iterator<Item = &'a GraphNode> + '_ {
        let graph = self.graph;
        self.roots.iter().map(move |&i| &graph.nodes[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::parse_outline;

    fn graph(outline: &str) -> TreeGraph {
        let forest: Vec<DisplayNode> = parse_outline(outline)
            .iter()
            .map(DisplayNode::from_outline)
            .collect();
        TreeGraph::from_forest(&forest, None)
    }

    #[test]
    fn numbers_nodes_depth_first() {
        let g = graph("- Felidae {rank:family}\n  - Felis {rank:genus}\n    - Felis catus {rank:species}\n  - Lynx");
        let names: Vec<_> = g.nodes.iter().map(|n| (n.id.as_str(), n.name.as_str())).collect();
        assert_eq!(
            names,
            [("n1", "Felidae"), ("n2", "Felis"), ("n3", "Felis catus"), ("n4", "Lynx")]
        );
        assert_eq!(g.nodes[0].rank, "family");
        assert_eq!(g.nodes[3].rank, "");
        assert_eq!(
            g.edges,
            [
                GraphEdge { parent_id: "n1".into(), child_id: "n2".into() },
                GraphEdge { parent_id: "n2".into(), child_id: "n3".into() },
                GraphEdge { parent_id: "n1".into(), child_id: "n4".into() },
            ]
        );
        assert_eq!(g.roots().len(), 1);
        assert_eq!(g.children_of("n1").len(), 2);
        assert_eq!(g.index().node("n3").map(|n| n.name.as_str()), Some("Felis catus"));
        assert_eq!(g.children_of("n9").len(), 0);
    }

    #[test]
    fn strips_markup_and_glyph_remnants() {
        let g = graph("- {color:red}<a href=\"https://x\">Puma</a>{/color} sG");
        assert_eq!(g.nodes[0].name, "Puma");
    }

    #[test]
    fn unlabelled_top_with_many_children_gets_placeholder_name() {
        let g = graph("- A\n- B");
        assert_eq!(g.nodes[0].name, "node_1");
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn serialises_with_snake_case_edges() {
        let json = graph("- A\n  - B").to_json().unwrap();
        assert!(json.contains("\"parent_id\": \"n1\""));
        assert!(json.contains("\"child_id\": \"n2\""));
    }
}
