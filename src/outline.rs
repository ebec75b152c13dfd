//! Outline text → forest of raw labels.

use std::sync::LazyLock;

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use regex::Regex;

use crate::taxonomy::MAX_OUTLINE_DEPTH;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)(?:[-*+]|\d+\.)\s+(.*)$").expect("bullet regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    /// Raw label text, annotations included.
    pub label: String,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::size).sum::<usize>()
    }
}

/// Parse bullet lines into a forest. Text without a single bullet line falls back to
/// its Markdown heading hierarchy.
pub fn parse_outline(text: &str) -> Vec<OutlineNode> {
    let mut items = Vec::new();
    for line in text.lines() {
        let Some(caps) = BULLET.captures(line) else {
            continue;
        };
        let label = caps[2].trim();
        if label.is_empty() {
            continue;
        }
        let width: usize = caps[1].chars().map(|c| if c == '\t' { 2 } else { 1 }).sum();
        items.push(((width / 2).min(MAX_OUTLINE_DEPTH), label.to_string()));
    }

    if items.is_empty() {
        items = heading_items(text);
    }
    assemble(items)
}

fn heading_items(text: &str) -> Vec<(usize, String)> {
    let mut items = Vec::new();
    for (event, range) in Parser::new(text).into_offset_iter() {
        if let Event::Start(Tag::Heading { level, .. }) = event {
            // Setext headings span two lines; the label is the first.
            let source = text[range].lines().next().unwrap_or_default();
            let label = source.trim().trim_start_matches('#').trim_end_matches('#').trim();
            if !label.is_empty() {
                items.push((heading_depth(level), label.to_string()));
            }
        }
    }
    items
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 0,
        HeadingLevel::H2 => 1,
        HeadingLevel::H3 => 2,
        HeadingLevel::H4 => 3,
        HeadingLevel::H5 => 4,
        HeadingLevel::H6 => 5,
    }
}

/// Attach each item under the nearest preceding item that is shallower.
fn assemble(items: Vec<(usize, String)>) -> Vec<OutlineNode> {
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(items.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for (index, (depth, _)) in items.iter().enumerate() {
        while stack.last().is_some_and(|(d, _)| *d >= *depth) {
            stack.pop();
        }
        parents.push(stack.last().map(|(_, i)| *i));
        stack.push((*depth, index));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (index, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(index),
            None => roots.push(index),
        }
    }

    fn build(index: usize, items: &[(usize, String)], children: &[Vec<usize>]) -> OutlineNode {
        OutlineNode {
            label: items[index].1.clone(),
            children: children[index]
                .iter()
                .map(|c| build(*c, items, children))
                .collect(),
        }
    }

    roots.iter().map(|r| build(*r, &items, &children)).collect()
}
