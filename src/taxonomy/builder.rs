use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::{Forest, TaxonId, TaxonNode, TaxonRow};
use crate::rank::RankBand;

/// Synthetic universal root ("Life"); never part of an ancestor chain.
pub const LIFE_TAXON_ID: TaxonId = 48460;

/// Deepest indentation level written to an outline.
pub const MAX_OUTLINE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
struct Entry {
    id: TaxonId,
    name: String,
    rank: String,
    band: RankBand,
    parent_id: Option<TaxonId>,
    ancestors: Vec<TaxonId>,
}

/// Reconciles flat rows into a forest of display parents.
///
/// Explicit parents always win. Species-band rows then prefer the nearest in-set
/// species-band ancestor, then the nearest genus-band ancestor, so infraspecific chains
/// stay intact and species bridge straight to genus-level structure when intermediate
/// ranks are missing. Everything else takes the nearest in-set ancestor.
#[derive(Debug, Clone)]
pub struct TaxonomyGraphBuilder {
    entries: HashMap<TaxonId, Entry>,
    parents: HashMap<TaxonId, Option<TaxonId>>,
}

impl TaxonomyGraphBuilder {
    pub fn new(rows: &[TaxonRow]) -> Self {
        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            // Later duplicates replace earlier ones.
            entries.insert(row.id, Entry::from_row(row));
        }

        let mut builder = Self {
            entries,
            parents: HashMap::new(),
        };
        builder.parents = builder
            .entries
            .values()
            .map(|entry| (entry.id, builder.pick_display_parent(entry)))
            .collect();
        break_cycles(&mut builder.parents);
        builder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved display parent, `None` for root candidates and unknown ids.
    pub fn display_parent(&self, id: TaxonId) -> Option<TaxonId> {
        self.parents.get(&id).copied().flatten()
    }

    fn pick_display_parent(&self, row: &Entry) -> Option<TaxonId> {
        if row.parent_id == Some(row.id) {
            log::debug!("taxon {} names itself as parent; treating as root", row.id);
            return None;
        }
        if let Some(parent) = row.parent_id.filter(|p| self.entries.contains_key(p)) {
            return Some(parent);
        }

        let present = || {
            row.ancestors
                .iter()
                .rev()
                .filter(|id| **id != row.id)
                .filter_map(|id| self.entries.get(id))
        };

        if row.band.is_species() {
            if let Some(found) = present().find(|a| a.band.is_species()) {
                return Some(found.id);
            }
            if let Some(found) = present().find(|a| a.band.is_genus()) {
                return Some(found.id);
            }
        }

        present().next().map(|a| a.id)
    }

    /// Assemble the forest. A present `base_id` becomes the only root; rows outside its
    /// subtree are dropped and listed in [`Forest::unreachable`].
    pub fn forest(&self, base_id: Option<TaxonId>) -> Forest {
        if self.entries.is_empty() {
            return Forest::default();
        }

        let mut children: HashMap<TaxonId, Vec<TaxonId>> = HashMap::new();
        let mut roots = Vec::new();
        for (&id, parent) in &self.parents {
            match parent {
                Some(parent) => children.entry(*parent).or_default().push(id),
                None => roots.push(id),
            }
        }

        let mut top = match base_id.filter(|id| self.entries.contains_key(id)) {
            Some(base) => vec![base],
            None => roots,
        };
        top.sort_by(|a, b| self.compare(*a, *b));
        let roots: Vec<TaxonNode> = top.iter().map(|id| self.assemble(*id, &children)).collect();

        let mut reached = HashSet::new();
        for root in &roots {
            collect_ids(root, &mut reached);
        }
        let mut unreachable: Vec<TaxonId> = self
            .entries
            .keys()
            .filter(|id| !reached.contains(*id))
            .copied()
            .collect();
        unreachable.sort_unstable();
        if !unreachable.is_empty() {
            log::debug!(
                "base taxon {:?} leaves {} row(s) unreachable",
                base_id,
                unreachable.len()
            );
        }

        Forest { roots, unreachable }
    }

    fn assemble(&self, id: TaxonId, children: &HashMap<TaxonId, Vec<TaxonId>>) -> TaxonNode {
        let entry = &self.entries[&id];
        let mut kids = children.get(&id).cloned().unwrap_or_default();
        kids.sort_by(|a, b| self.compare(*a, *b));
        TaxonNode {
            id,
            name: entry.name.clone(),
            rank: entry.rank.clone(),
            band: entry.band.clone(),
            children: kids.iter().map(|kid| self.assemble(*kid, children)).collect(),
        }
    }

    /// Band order, then case-insensitive name, then exact name, then id.
    fn compare(&self, a: TaxonId, b: TaxonId) -> Ordering {
        let (a, b) = (&self.entries[&a], &self.entries[&b]);
        a.band
            .sort_index()
            .cmp(&b.band.sort_index())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl Entry {
    fn from_row(row: &TaxonRow) -> Self {
        let name = row
            .name
            .as_deref()
            .map(|n| n.replace(['\r', '\n'], " ").trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Taxon {}", row.id));
        let rank = row
            .rank
            .as_deref()
            .map(|r| r.trim().to_lowercase())
            .unwrap_or_default();
        Self {
            id: row.id,
            band: RankBand::of(&rank),
            name,
            rank,
            parent_id: row.parent_id,
            ancestors: row
                .ancestor_ids
                .iter()
                .copied()
                .filter(|id| *id != LIFE_TAXON_ID)
                .collect(),
        }
    }
}

fn collect_ids(node: &TaxonNode, out: &mut HashSet<TaxonId>) {
    out.insert(node.id);
    for child in &node.children {
        collect_ids(child, out);
    }
}

/// Inconsistent parent data can still loop; cut each loop at its smallest id.
fn break_cycles(parents: &mut HashMap<TaxonId, Option<TaxonId>>) {
    let mut ids: Vec<TaxonId> = parents.keys().copied().collect();
    ids.sort_unstable();

    let mut settled: HashSet<TaxonId> = HashSet::new();
    for start in ids {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if settled.contains(&id) {
                break;
            }
            if !on_path.insert(id) {
                let from = path.iter().position(|p| *p == id).unwrap_or(0);
                if let Some(cut) = path[from..].iter().min().copied() {
                    log::debug!("parent cycle through taxon {cut}; detaching it");
                    parents.insert(cut, None);
                }
                break;
            }
            path.push(id);
            cursor = parents.get(&id).copied().flatten();
        }
        settled.extend(path);
    }
}

impl Forest {
    /// Annotated outline: one bullet per node, two spaces per level, `{rank:*}` token.
    pub fn to_outline(&self) -> String {
        let mut lines = Vec::with_capacity(self.node_count());
        for (depth, node) in self.walk() {
            let indent = "  ".repeat(depth.min(MAX_OUTLINE_DEPTH));
            if node.rank.is_empty() {
                lines.push(format!("{indent}- {}", node.name));
            } else {
                lines.push(format!("{indent}- {} {{rank:{}}}", node.name, node.rank));
            }
        }
        lines.join("\n")
    }
}

/// Rows → forest.
pub fn build_forest(rows: &[TaxonRow], base_id: Option<TaxonId>) -> Forest {
    TaxonomyGraphBuilder::new(rows).forest(base_id)
}

/// Rows → annotated outline text.
pub fn build(rows: &[TaxonRow], base_id: Option<TaxonId>) -> String {
    build_forest(rows, base_id).to_outline()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn felidae() -> Vec<TaxonRow> {
        vec![
            TaxonRow::new(1, "Felidae", "family"),
            TaxonRow::new(2, "Felis", "genus")
                .with_parent(1)
                .with_ancestors(&[1]),
            TaxonRow::new(3, "Felis catus", "species")
                .with_parent(2)
                .with_ancestors(&[1, 2]),
        ]
    }

    #[test]
    fn felidae_scenario_with_base_id() {
        let outline = build(&felidae(), Some(1));
        assert_eq!(
            outline,
            "- Felidae {rank:family}\n  - Felis {rank:genus}\n    - Felis catus {rank:species}"
        );
    }

    #[test]
    fn explicit_parent_wins_over_ancestors() {
        let rows = vec![
            TaxonRow::new(1, "Carnivora", "order"),
            TaxonRow::new(2, "Felidae", "family").with_ancestors(&[1]),
            TaxonRow::new(3, "Panthera", "genus")
                .with_parent(1)
                .with_ancestors(&[1, 2]),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(3), Some(1));
        assert_eq!(builder.display_parent(2), Some(1));
    }

    #[test]
    fn species_prefers_species_band_ancestor() {
        let rows = vec![
            TaxonRow::new(10, "Quercus", "genus"),
            TaxonRow::new(11, "Quercus robur complex", "complex").with_ancestors(&[10]),
            TaxonRow::new(12, "Quercus robur", "species")
                .with_parent(99)
                .with_ancestors(&[48460, 10, 11]),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(12), Some(11));
    }

    #[test]
    fn species_bridges_to_genus_band_when_intermediates_missing() {
        let rows = vec![
            TaxonRow::new(1, "Plantae", "kingdom"),
            TaxonRow::new(5, "Quercus", "genus").with_ancestors(&[1]),
            TaxonRow::new(6, "Lepidobalanus", "section").with_ancestors(&[1, 5]),
            // Nearest present ancestor is the kingdom row, but the section wins.
            TaxonRow::new(7, "Quercus alba", "species").with_ancestors(&[6, 1]),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(7), Some(6));
    }

    #[test]
    fn non_species_takes_nearest_present_ancestor() {
        let rows = vec![
            TaxonRow::new(1, "Animalia", "kingdom"),
            TaxonRow::new(2, "Chordata", "phylum").with_ancestors(&[1]),
            TaxonRow::new(4, "Felidae", "family").with_ancestors(&[1, 2, 3]),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(4), Some(2));
    }

    #[test]
    fn rows_without_present_ancestors_become_roots() {
        let rows = vec![
            TaxonRow::new(2, "Zeta", "genus").with_ancestors(&[100]),
            TaxonRow::new(1, "Alpha", "family"),
        ];
        let forest = TaxonomyGraphBuilder::new(&rows).forest(None);
        let names: Vec<&str> = forest.roots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn forced_base_drops_unreachable_rows() {
        let mut rows = felidae();
        rows.push(TaxonRow::new(50, "Canidae", "family"));
        let forest = TaxonomyGraphBuilder::new(&rows).forest(Some(2));
        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.roots[0].name, "Felis");
        assert_eq!(forest.unreachable, vec![1, 50]);
    }

    #[test]
    fn missing_base_falls_back_to_rootless_rows() {
        let forest = TaxonomyGraphBuilder::new(&felidae()).forest(Some(777));
        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.roots[0].id, 1);
        assert!(forest.unreachable.is_empty());
    }

    #[test]
    fn duplicate_ids_keep_last_row() {
        let rows = vec![
            TaxonRow::new(1, "Old name", "genus"),
            TaxonRow::new(1, "New name", "genus"),
        ];
        assert_eq!(build(&rows, None), "- New name {rank:genus}");
    }

    #[test]
    fn self_parent_is_rootless() {
        let rows = vec![
            TaxonRow::new(1, "Felidae", "family"),
            TaxonRow::new(2, "Felis", "genus")
                .with_parent(2)
                .with_ancestors(&[1]),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(2), None);
        assert_eq!(builder.forest(None).roots.len(), 2);
    }

    #[test]
    fn parent_cycles_are_cut_at_smallest_id() {
        let rows = vec![
            TaxonRow::new(3, "C", "genus").with_parent(4),
            TaxonRow::new(4, "D", "genus").with_parent(5),
            TaxonRow::new(5, "E", "genus").with_parent(3),
        ];
        let builder = TaxonomyGraphBuilder::new(&rows);
        assert_eq!(builder.display_parent(3), None);
        let forest = builder.forest(None);
        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.node_count(), 3);
    }

    #[test]
    fn malformed_rows_get_placeholders() {
        let rows = vec![TaxonRow {
            id: 9,
            name: None,
            rank: None,
            parent_id: None,
            ancestor_ids: vec![],
        }];
        assert_eq!(build(&rows, None), "- Taxon 9");
    }

    #[test]
    fn empty_input_gives_empty_outline() {
        assert_eq!(build(&[], Some(1)), "");
    }

    #[test]
    fn siblings_sort_by_band_then_name() {
        let rows = vec![
            TaxonRow::new(1, "Root", "order"),
            TaxonRow::new(2, "zeta", "species").with_parent(1),
            TaxonRow::new(3, "Beta", "genus").with_parent(1),
            TaxonRow::new(4, "alpha", "genus").with_parent(1),
            TaxonRow::new(5, "Gamma", "clade").with_parent(1),
            TaxonRow::new(6, "Delta", "subfamily").with_parent(1),
        ];
        let forest = TaxonomyGraphBuilder::new(&rows).forest(Some(1));
        let names: Vec<&str> = forest.roots[0]
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Delta", "alpha", "Beta", "zeta", "Gamma"]);
    }

    #[test]
    fn outline_indentation_is_capped() {
        let mut rows = vec![TaxonRow::new(1, "n1", "")];
        for id in 2..=40 {
            rows.push(TaxonRow::new(id, &format!("n{id}"), "").with_parent(id - 1));
        }
        let outline = build(&rows, None);
        let deepest = outline.lines().last().unwrap();
        assert_eq!(deepest, format!("{}- n40", "  ".repeat(MAX_OUTLINE_DEPTH)));
    }

    fn arb_rows() -> impl Strategy<Value = Vec<TaxonRow>> {
        let ranks = prop::sample::select(vec![
            "kingdom", "phylum", "class", "order", "family", "tribe", "genus", "subgenus",
            "species", "subspecies", "clade",
        ]);
        prop::collection::vec(
            (ranks, prop::option::of(0usize..40), prop::collection::vec(0usize..40, 0..6)),
            1..40,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(index, (rank, parent, ancestors))| {
                    let id = index as TaxonId + 1;
                    // Explicit parents and ancestors only point at smaller ids (or absent ones).
                    let parent = parent.map(|p| (p as TaxonId) % id).filter(|p| *p > 0);
                    let mut ancestors: Vec<TaxonId> = ancestors
                        .into_iter()
                        .map(|a| (a as TaxonId) % id)
                        .filter(|a| *a > 0)
                        .collect();
                    ancestors.sort_unstable();
                    ancestors.dedup();
                    TaxonRow {
                        id,
                        name: Some(format!("Taxon{}", (id * 7919) % 97)),
                        rank: Some(rank.to_string()),
                        parent_id: parent,
                        ancestor_ids: ancestors,
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_row_appears_once(rows in arb_rows()) {
            let forest = TaxonomyGraphBuilder::new(&rows).forest(None);
            let mut seen = HashSet::new();
            for (_, node) in forest.walk() {
                prop_assert!(seen.insert(node.id), "node {} emitted twice", node.id);
            }
            prop_assert_eq!(seen.len(), rows.len());
        }

        #[test]
        fn building_twice_is_byte_identical(rows in arb_rows()) {
            let mut reversed = rows.clone();
            reversed.reverse();
            prop_assert_eq!(build(&rows, None), build(&rows, None));
            prop_assert_eq!(build(&rows, None), build(&reversed, None));
        }

        #[test]
        fn present_parent_always_wins(rows in arb_rows()) {
            let builder = TaxonomyGraphBuilder::new(&rows);
            for row in &rows {
                if let Some(parent) = row.parent_id {
                    prop_assert_eq!(builder.display_parent(row.id), Some(parent));
                }
            }
        }
    }
}
