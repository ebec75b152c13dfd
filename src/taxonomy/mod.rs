//! Flat taxon rows and the forest built from them.

mod builder;

pub use builder::{LIFE_TAXON_ID, MAX_OUTLINE_DEPTH, TaxonomyGraphBuilder, build, build_forest};

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::rank::RankBand;

pub type TaxonId = i64;

/// One input record. `ancestor_ids` runs root → nearest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonRow {
    pub id: TaxonId,
    pub name: Option<String>,
    pub rank: Option<String>,
    pub parent_id: Option<TaxonId>,
    pub ancestor_ids: Vec<TaxonId>,
}

impl TaxonRow {
    pub fn new(id: TaxonId, name: &str, rank: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            rank: Some(rank.to_string()),
            parent_id: None,
            ancestor_ids: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: TaxonId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_ancestors(mut self, ancestor_ids: &[TaxonId]) -> Self {
        self.ancestor_ids = ancestor_ids.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonNode {
    pub id: TaxonId,
    pub name: String,
    pub rank: String,
    pub band: RankBand,
    pub children: Vec<TaxonNode>,
}

impl TaxonNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TaxonNode::size).sum::<usize>()
    }
}

/// Result of one build: the reachable roots plus the ids a forced base root cut off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub roots: Vec<TaxonNode>,
    pub unreachable: Vec<TaxonId>,
}

impl Forest {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.roots.iter().map(TaxonNode::size).sum()
    }

    /// Depth-first `(depth, node)` pairs in emission order.
    pub fn walk(&self) -> Vec<(usize, &TaxonNode)> {
        fn visit<'a>(node: &'a TaxonNode, depth: usize, out: &mut Vec<(usize, &'a TaxonNode)>) {
            out.push((depth, node));
            for child in &node.children {
                visit(child, depth + 1, out);
            }
        }

        let mut out = Vec::with_capacity(self.node_count());
        for root in &self.roots {
            visit(root, 0, &mut out);
        }
        out
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<i64> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAncestors {
    List(Vec<RawId>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default, alias = "taxon_id", alias = "taxonId")]
    id: Option<RawId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rank: Option<String>,
    #[serde(default, alias = "parentId")]
    parent_id: Option<RawId>,
    #[serde(default, alias = "ancestorIds")]
    ancestor_ids: Option<RawAncestors>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Rows(Vec<RawRow>),
    Wrapped { rows: Vec<RawRow> },
}

/// Parse `"{1,2,3}"` style ancestor lists. Anything unparsable yields an empty chain.
pub fn parse_ancestor_text(text: &str) -> Vec<TaxonId> {
    let Some(open) = text.find('{') else {
        return Vec::new();
    };
    let Some(close) = text[open..].find('}') else {
        return Vec::new();
    };
    text[open + 1..open + close]
        .split(',')
        .filter_map(|part| part.trim().parse::<TaxonId>().ok())
        .collect()
}

/// Decode a JSON row payload: either an array of rows or `{"rows": [...]}`.
/// Rows without a usable id are skipped.
pub fn rows_from_json(json: &str) -> Result<Vec<TaxonRow>, BuildError> {
    let payload: RawPayload = serde_json::from_str(json).map_err(|e| BuildError::RowsJson {
        message: e.to_string(),
    })?;
    let raw_rows = match payload {
        RawPayload::Rows(rows) | RawPayload::Wrapped { rows } => rows,
    };

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (index, raw) in raw_rows.into_iter().enumerate() {
        let Some(id) = raw.id.as_ref().and_then(RawId::value).filter(|id| *id != 0) else {
            log::warn!("skipping taxon row {index}: missing id");
            continue;
        };
        let ancestor_ids = match raw.ancestor_ids {
            Some(RawAncestors::List(ids)) => ids.iter().filter_map(RawId::value).collect(),
            Some(RawAncestors::Text(text)) => parse_ancestor_text(&text),
            None => Vec::new(),
        };
        rows.push(TaxonRow {
            id,
            name: raw.name,
            rank: raw.rank,
            parent_id: raw.parent_id.as_ref().and_then(RawId::value),
            ancestor_ids,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_postgres_style_ancestor_lists() {
        assert_eq!(parse_ancestor_text("{48460,1,47126}"), vec![48460, 1, 47126]);
        assert_eq!(parse_ancestor_text("{ 3 , x, 4 }"), vec![3, 4]);
        assert!(parse_ancestor_text("").is_empty());
        assert!(parse_ancestor_text("{1,2").is_empty());
    }

    #[test]
    fn decodes_rows_with_mixed_field_names() {
        let json = r#"[
            {"taxon_id": 1, "name": "Felidae", "rank": "family", "parent_id": null, "ancestor_ids": "{48460,1}"},
            {"id": "2", "name": "Felis", "rank": "genus", "parentId": 1, "ancestorIds": [1, "2"]},
            {"name": "no id"}
        ]"#;
        let rows = rows_from_json(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].ancestor_ids, vec![48460, 1]);
        assert_eq!(rows[1].id, 2);
        assert_eq!(rows[1].parent_id, Some(1));
        assert_eq!(rows[1].ancestor_ids, vec![1, 2]);
    }

    #[test]
    fn decodes_wrapped_payload() {
        let rows = rows_from_json(r#"{"rows": [{"id": 5, "name": "Aves"}]}"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, None);
    }

    #[test]
    fn rejects_non_row_json() {
        assert!(rows_from_json("42").is_err());
    }
}
