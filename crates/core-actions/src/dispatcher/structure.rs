//! Structural commands: branch creation, split/merge, delete, flags, hoist, search.

use super::navigate::switch;
use super::DispatchResult;
use crate::{ActionError, Command};
use core_state::{BreakOutcome, Document};
use core_text::HostBuffer;
use tracing::info;

pub(super) fn handle(
    cmd: Command,
    doc: &mut Document,
    host: &mut dyn HostBuffer,
) -> Result<DispatchResult, ActionError> {
    let current = doc.current().clone();
    match cmd {
        Command::CreateChild => {
            let id = doc.create_child(&current, "")?;
            switch(doc, &id, host)
        }
        Command::CreateSibling => {
            let id = doc.create_sibling(&current)?;
            switch(doc, &id, host)
        }
        Command::Clone => {
            let id = doc.clone_node(&current)?;
            switch(doc, &id, host)
        }
        Command::SplitAtPoint => match doc.break_at_point(host.cursor())? {
            BreakOutcome::Split { .. } => Ok(DispatchResult::dirty()),
            _ => Ok(DispatchResult::clean().with_notice("cursor is on a node boundary")),
        },
        Command::BranchAtPoint => {
            let id = doc.branch_at_point(host.cursor())?;
            switch(doc, &id, host)
        }
        Command::MergeWithParent => {
            doc.merge_with_parent(&current)?;
            Ok(DispatchResult::dirty())
        }
        Command::Delete(ids) => {
            let ids = if ids.is_empty() { vec![current] } else { ids };
            let report = doc.delete(&ids)?;
            for rejected in &report.rejected {
                info!(target: "actions.dispatch", error = %rejected, "delete_rejected");
            }
            let mut result = if let Some(next) = &report.new_current {
                switch(doc, next, host)?
            } else if report.removed.is_empty() {
                DispatchResult::clean()
            } else {
                DispatchResult::dirty()
            };
            if !report.rejected.is_empty() {
                result = result.with_notice("cannot delete the last root");
            }
            Ok(result)
        }
        Command::ClearChildren => {
            let report = doc.clear_children(&current)?;
            Ok(removed_result(report.removed.len()))
        }
        Command::ClearSiblings => {
            let report = doc.clear_siblings(&current)?;
            Ok(removed_result(report.removed.len()))
        }
        Command::ToggleCollapse(target) => {
            doc.toggle_collapse(target.as_ref().unwrap_or(&current))?;
            Ok(DispatchResult::dirty())
        }
        Command::ToggleBookmark(target) => {
            doc.toggle_bookmark(target.as_ref().unwrap_or(&current))?;
            Ok(DispatchResult::dirty())
        }
        Command::Hoist(target) => {
            doc.hoist(target.as_ref().unwrap_or(&current))?;
            Ok(DispatchResult::dirty())
        }
        Command::Unhoist => Ok(match doc.unhoist() {
            Some(_) => DispatchResult::dirty(),
            None => DispatchResult::clean().with_notice("nothing hoisted"),
        }),
        Command::Search(term) => {
            let summary = doc.search(&term);
            let result = DispatchResult::dirty();
            Ok(if term.is_empty() {
                result
            } else {
                result.with_notice(format!("{} matching nodes", summary.results))
            })
        }
        other => {
            tracing::warn!(target: "actions.dispatch", ?other, "unrouted_command");
            Ok(DispatchResult::clean())
        }
    }
}

fn removed_result(count: usize) -> DispatchResult {
    if count == 0 {
        DispatchResult::clean()
    } else {
        DispatchResult::dirty().with_notice(format!("removed {count} nodes"))
    }
}
