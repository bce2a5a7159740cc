//! Comment tree assembly and thread statistics.

use std::collections::HashMap;

use super::{Comment, Visibility};

/// One node of an assembled comment tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

/// Aggregates for one article's thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadStats {
    pub total: usize,
    pub visible: usize,
    pub moderated: usize,
    pub deleted: usize,
    pub max_depth: u32,
    pub participants: usize,
}

/// Assemble a nested tree from a flat comment list.
///
/// Roots are ordered newest-first; children oldest-first, so threads
/// read top-down. Replies whose parent is missing from the input are
/// treated as roots rather than dropped.
pub fn build_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let ids: Vec<String> = comments.iter().map(|c| c.comment_id.clone()).collect();
    let mut children_of: HashMap<String, Vec<Comment>> = HashMap::new();
    let mut roots: Vec<Comment> = Vec::new();

    for comment in comments {
        match &comment.parent_comment_id {
            Some(parent) if ids.contains(parent) => {
                children_of.entry(parent.clone()).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    roots
        .into_iter()
        .map(|root| attach_children(root, &mut children_of))
        .collect()
}

fn attach_children(
    comment: Comment,
    children_of: &mut HashMap<String, Vec<Comment>>,
) -> CommentNode {
    let mut children = children_of.remove(&comment.comment_id).unwrap_or_default();
    children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    CommentNode {
        children: children
            .into_iter()
            .map(|child| attach_children(child, children_of))
            .collect(),
        comment,
    }
}

/// Flatten a tree back to a depth-annotated list, depth-first.
pub fn flatten_tree(tree: &[CommentNode]) -> Vec<(u32, &Comment)> {
    let mut out = Vec::new();
    for node in tree {
        flatten_into(node, 0, &mut out);
    }
    out
}

fn flatten_into<'a>(node: &'a CommentNode, depth: u32, out: &mut Vec<(u32, &'a Comment)>) {
    out.push((depth, &node.comment));
    for child in &node.children {
        flatten_into(child, depth + 1, out);
    }
}

/// Compute thread statistics over a flat comment list.
pub fn thread_stats(comments: &[Comment]) -> ThreadStats {
    let mut stats = ThreadStats {
        total: comments.len(),
        ..Default::default()
    };
    let mut authors: Vec<&str> = Vec::new();
    for comment in comments {
        match comment.visibility {
            Visibility::Public => stats.visible += 1,
            Visibility::Moderated => stats.moderated += 1,
            Visibility::Deleted => stats.deleted += 1,
        }
        stats.max_depth = stats.max_depth.max(comment.depth);
        if !authors.contains(&comment.author.as_str()) {
            authors.push(&comment.author);
        }
    }
    stats.participants = authors.len();
    stats
}
