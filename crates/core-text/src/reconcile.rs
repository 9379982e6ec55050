//! Buffer reconciliation planner.
//!
//! Given the ordered texts of the active path `[t0, t1, .., tk]` (root first,
//! `tk` the active node) and the live buffer value `B`, decide which segments
//! an edit touched. The only information available is textual: node ids do not
//! survive in the buffer, so the planner works with prefix/suffix comparison.
//!
//! Algorithm:
//! 1. Walk cumulative prefixes `P(i) = t0+..+ti` for `i < k`; the first `i`
//!    where `B` does not start with `P(i)` is the first edited segment. When
//!    every ancestor prefix matches, the edit is local to `tk`.
//! 2. Past the untouched head `P(i-1)`, find the longest suffix of the path
//!    `S(m) = t(m)+..+tk` (`m > i`) the remainder still ends with. Segments
//!    `i..m-1` are replaced by whatever lies between head and suffix.
//! 3. The policy decides whether that replacement mutates the segments in
//!    place or forks a new branch beside segment `i`.
//!
//! Invariant: applying the returned plan to the path always yields segments
//! whose concatenation equals `B`.

use tracing::trace;

/// How edits to shared history are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPolicy {
    /// Mutate the edited segments; every branch sharing them changes.
    #[default]
    InPlace,
    /// Fork a new branch instead of rewriting an ancestor or a leaf that already
    /// has children. Childless leaf edits stay in place.
    CloneOnEdit,
}

/// Outcome of diffing the buffer against the active path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Buffer already equals the path.
    Unchanged,
    /// Set segment `first` to `text` and empty segments `first+1..=last`.
    Rewrite {
        first: usize,
        last: usize,
        text: String,
    },
    /// Create a sibling of segment `at` holding `text`, then chain fresh copies
    /// of segments `replay_from..` underneath it. The last created node becomes
    /// the active node.
    Branch {
        at: usize,
        text: String,
        replay_from: usize,
    },
}

impl ReconcilePlan {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ReconcilePlan::Unchanged)
    }
}

/// Compute the plan for `buffer` against `segments` (root first).
///
/// `leaf_has_children` reports whether the last segment's node has children;
/// under [`EditPolicy::CloneOnEdit`] a local edit to such a leaf forks instead of
/// silently changing the prefix its children were generated from.
pub fn plan<S: AsRef<str>>(
    segments: &[S],
    buffer: &str,
    policy: EditPolicy,
    leaf_has_children: bool,
) -> ReconcilePlan {
    let Some(k) = segments.len().checked_sub(1) else {
        return ReconcilePlan::Unchanged;
    };

    let mut head = 0usize;
    let mut first = k;
    for (i, seg) in segments[..k].iter().enumerate() {
        let seg = seg.as_ref();
        let end = head + seg.len();
        if buffer.get(head..end) != Some(seg) {
            first = i;
            break;
        }
        head = end;
    }

    let remainder = &buffer[head..];
    if first == k && remainder == segments[k].as_ref() {
        return ReconcilePlan::Unchanged;
    }

    // Longest preserved suffix: smallest m in first+1..=k whose S(m) still ends the buffer.
    let mut preserved = k + 1;
    let mut suffix_len = 0usize;
    for m in (first + 1)..=k {
        let suffix: String = segments[m..].iter().map(AsRef::as_ref).collect();
        if remainder.ends_with(suffix.as_str()) {
            preserved = m;
            suffix_len = suffix.len();
            break;
        }
    }
    let text = remainder[..remainder.len() - suffix_len].to_string();

    let forks = first < k || leaf_has_children;
    let plan = match policy {
        EditPolicy::CloneOnEdit if forks => ReconcilePlan::Branch {
            at: first,
            text,
            replay_from: preserved,
        },
        _ => ReconcilePlan::Rewrite {
            first,
            last: preserved - 1,
            text,
        },
    };
    trace!(
        target: "text.reconcile",
        segments = segments.len(),
        first,
        preserved,
        ?policy,
        "plan"
    );
    plan
}
