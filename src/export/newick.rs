use crate::label::phylo_label;
use crate::render::DisplayNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewickOptions {
    /// Write labels on internal nodes too; leaves are always labelled.
    pub include_internal_labels: bool,
    /// Used for an unlabelled top with several children, for unlabelled leaves and
    /// for an empty tree.
    pub root_label: String,
}

impl Default for NewickOptions {
    fn default() -> Self {
        Self {
            include_internal_labels: false,
            root_label: "root".to_string(),
        }
    }
}

/// Nested-parenthesis Newick without branch lengths, terminated by `;`.
pub fn to_newick(forest: &[DisplayNode], options: &NewickOptions) -> String {
    let Some(root) = DisplayNode::root_of(forest, None) else {
        return format!("{};", quote(&options.root_label));
    };
    let top = first_labelled(&root);

    let core = if phylo_label(&top.label).is_empty() && top.children.len() > 1 {
        format!(
            "({}){}",
            join_children(top, options),
            quote(&options.root_label)
        )
    } else {
        write_node(top, true, options)
    };
    format!("{core};")
}

/// Skip empty wrappers that have exactly one child.
fn first_labelled(node: &DisplayNode) -> &DisplayNode {
    let mut node = node;
    while phylo_label(&node.label).is_empty() && node.children.len() == 1 {
        node = &node.children[0];
    }
    node
}

fn join_children(node: &DisplayNode, options: &NewickOptions) -> String {
    node.children
        .iter()
        .map(|child| write_node(child, false, options))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_node(node: &DisplayNode, is_root: bool, options: &NewickOptions) -> String {
    let text = phylo_label(&node.label);
    if node.children.is_empty() {
        return if text.is_empty() {
            quote(&options.root_label)
        } else {
            quote(&text)
        };
    }

    let children = join_children(node, options);
    let internal = if options.include_internal_labels && !text.is_empty() {
        quote(&text)
    } else {
        String::new()
    };
    if is_root && internal.is_empty() && text.is_empty() {
        return format!("({children}){}", quote(&options.root_label));
    }
    format!("({children}){internal}")
}

/// Single-quote labels holding structural characters or whitespace; inner quotes are
/// doubled.
pub(super) fn quote(label: &str) -> String {
    let needs_quotes = label
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ',' | ':' | ';' | '\''));
    if needs_quotes {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
