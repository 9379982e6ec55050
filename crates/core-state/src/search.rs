//! Search classification. Recomputed over the whole tree on every call.

use crate::Document;
use core_tree::{NodeId, SearchState};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub results: usize,
    pub ancestors: usize,
}

impl Document {
    /// Store `term` and classify every node as a result, an ancestor of one,
    /// or neither. An empty term clears all classification.
    pub fn search(&mut self, term: &str) -> SearchSummary {
        self.search_term = term.to_string();
        if term.is_empty() {
            for (_, node) in self.nodes.iter_mut() {
                node.search_result_state = None;
            }
            debug!(target: "state.search", "cleared");
            return SearchSummary::default();
        }

        let needle = term.to_lowercase();
        let matches: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.text.to_lowercase().contains(&needle))
            .map(|(id, _)| id.clone())
            .collect();
        let mut ancestor_set: HashSet<NodeId> = HashSet::new();
        for id in &matches {
            // A corrupt chain only loses its ancestor marks.
            if let Ok(chain) = self.nodes.ancestors(id) {
                ancestor_set.extend(chain);
            }
        }
        let results: HashSet<&NodeId> = matches.iter().collect();

        let mut summary = SearchSummary::default();
        for (id, node) in self.nodes.iter_mut() {
            let state = if results.contains(id) {
                summary.results += 1;
                SearchState::Result
            } else if ancestor_set.contains(id) {
                summary.ancestors += 1;
                SearchState::Ancestor
            } else {
                SearchState::None
            };
            node.search_result_state = Some(state);
        }
        debug!(target: "state.search", term, results = summary.results, ancestors = summary.ancestors, "search");
        summary
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use core_tree::SearchState;
    use pretty_assertions::assert_eq;

    #[test]
    fn cat_matches_root_only() {
        let mut d = doc(&[("root", None, "cat"), ("child", Some("root"), "dog")], "child");
        let summary = d.search("cat");
        assert_eq!(summary.results, 1);
        assert_eq!(
            d.node(&id("root")).unwrap().search_result_state,
            Some(SearchState::Result)
        );
        assert_eq!(
            d.node(&id("child")).unwrap().search_result_state,
            Some(SearchState::None)
        );
        assert_eq!(d.search_term(), "cat");
    }

    #[test]
    fn match_marks_ancestors_case_insensitively() {
        let mut d = doc(
            &[
                ("r", None, "a"),
                ("m", Some("r"), "b"),
                ("l", Some("m"), "The DOG ran"),
            ],
            "l",
        );
        let summary = d.search("dog");
        assert_eq!(summary.results, 1);
        assert_eq!(summary.ancestors, 2);
        assert_eq!(
            d.node(&id("m")).unwrap().search_result_state,
            Some(SearchState::Ancestor)
        );
    }

    #[test]
    fn empty_term_clears_state() {
        let mut d = doc(&[("root", None, "cat"), ("child", Some("root"), "dog")], "child");
        d.search("cat");
        d.search("");
        assert!(d.nodes().iter().all(|(_, n)| n.search_result_state.is_none()));
        assert_eq!(d.search_term(), "");
    }
}
