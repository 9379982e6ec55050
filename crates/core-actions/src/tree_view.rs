//! Plain-text outline of the visible tree.
//!
//! The innermost hoisted node (if any) is the single top-level entry; otherwise
//! every root is. Collapsed nodes hide their children. Each line shows
//! markers, the node id, and a one-line preview of its text:
//!
//! ```text
//! * 0f3c.. "Once upon"
//!   + 9a1b.. " a time"
//! ```
//!
//! Markers: `*` active node, `+` unread, `#` bookmarked, `>` collapsed with
//! children, `?` search result, `.` search ancestor.

use core_state::Document;
use core_tree::{NodeId, SearchState};
use std::fmt::Write;

const PREVIEW_CHARS: usize = 48;

pub fn render(doc: &Document) -> String {
    let tops = match doc.hoisted().last() {
        Some(id) => vec![id.clone()],
        None => doc.nodes().roots(),
    };
    let mut out = String::new();
    let mut stack: Vec<(NodeId, usize)> = tops.into_iter().rev().map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Ok(node) = doc.node(&id) else {
            continue;
        };
        let children = doc.nodes().children(&id);
        let markers = [
            (doc.current() == &id, '*'),
            (node.unread, '+'),
            (node.bookmarked, '#'),
            (node.collapsed && !children.is_empty(), '>'),
            (node.search_result_state == Some(SearchState::Result), '?'),
            (node.search_result_state == Some(SearchState::Ancestor), '.'),
        ];
        let flags: String = markers.iter().filter(|(on, _)| *on).map(|(_, c)| *c).collect();
        let _ = writeln!(
            out,
            "{:indent$}{:<2}{} {:?}",
            "",
            flags,
            id,
            preview(&node.text),
            indent = depth * 2
        );
        if !node.collapsed {
            stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
        }
    }
    out
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let mut short: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        short.push_str("..");
    }
    short
}
