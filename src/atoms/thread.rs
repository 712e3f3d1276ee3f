//! # Thread Atom
//!
//! Collects the messages belonging to the same conversation as the context
//! message, by following `Message-Id`/`References` links.
//!
//! Linking works on the 32-bit message-id hashes: every candidate is put in
//! an index sorted by hash, each message finds its parent with a binary
//! search, and the full id strings are compared only when several candidates
//! share the parent's hash. Roots are then resolved once per message, with
//! results memoised so shared ancestor chains are walked a single time.

use std::rc::Rc;

use crate::ast::value::Value;
use crate::atoms::helpers::opt_bool;
use crate::atoms::{Arity, EagerFn, FunctionDef};
use crate::diagnostics::ErrorCode;
use crate::mail::{normalize_message_id, MessageHolder};
use crate::runtime::registry::FunctionRegistry;

const UNRESOLVED: usize = usize::MAX;

/// Messages of the context message's thread.
///
/// Usage: @Thread([<allFolders>])
///   - Candidates are the messages of the context folder, or of every folder
///     of the account when `<allFolders>` is true.
///
///   Returns: MessageList ordered by depth in the thread, then by id.
///
/// Example:
///   @ForEach(@Thread(), @Seen(@True()))
pub const ATOM_THREAD: EagerFn = |call, args, context| {
    let focal = context
        .message_holder()
        .cloned()
        .ok_or_else(|| call.fail(ErrorCode::NoContextMessage))?;

    let mut candidates: Vec<Rc<dyn MessageHolder>> = if opt_bool(&args, 0, false) {
        let account = context
            .account()
            .ok_or_else(|| call.fail(ErrorCode::NoContextAccount))?;
        account
            .folders()
            .iter()
            .flat_map(|folder| folder.messages())
            .collect()
    } else {
        context
            .folder()
            .map(|folder| folder.messages())
            .unwrap_or_default()
    };

    let focal_index = match candidates.iter().position(|c| same_message(c, &focal)) {
        Some(index) => index,
        None => {
            candidates.push(Rc::clone(&focal));
            candidates.len() - 1
        }
    };

    let thread = collect_thread(&candidates, focal_index);
    tracing::debug!(
        candidates = candidates.len(),
        members = thread.len(),
        "collected thread"
    );
    let messages = thread
        .into_iter()
        .map(|index| Rc::downgrade(&candidates[index]))
        .collect();
    Ok(Value::new_message_list(messages))
};

fn same_message(a: &Rc<dyn MessageHolder>, b: &Rc<dyn MessageHolder>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Indices of the members of `focal`'s thread, ordered by (depth, id).
pub fn collect_thread(messages: &[Rc<dyn MessageHolder>], focal: usize) -> Vec<usize> {
    let parents = link_parents(messages);
    let (roots, depths) = resolve_roots(&parents);

    let focal_root = roots[focal];
    let mut members: Vec<usize> = (0..messages.len())
        .filter(|&index| roots[index] == focal_root)
        .collect();
    members.sort_by_key(|&index| (depths[index], messages[index].id()));
    members
}

/// Parent index of every message, if its parent is among `messages`.
fn link_parents(messages: &[Rc<dyn MessageHolder>]) -> Vec<Option<usize>> {
    let mut by_hash: Vec<(u32, usize)> = messages
        .iter()
        .enumerate()
        .map(|(index, message)| (message.message_id_hash(), index))
        .filter(|(hash, _)| *hash != 0)
        .collect();
    by_hash.sort_unstable();

    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let reference = message.reference_hash();
            if reference == 0 {
                return None;
            }
            let start = by_hash.partition_point(|(hash, _)| *hash < reference);
            let end = by_hash.partition_point(|(hash, _)| *hash <= reference);
            let candidates: Vec<usize> = by_hash[start..end]
                .iter()
                .map(|(_, candidate)| *candidate)
                .filter(|candidate| *candidate != index)
                .collect();
            match candidates.as_slice() {
                [] => None,
                [only] => Some(*only),
                _ => {
                    let wanted = message.reference();
                    let wanted = normalize_message_id(&wanted);
                    candidates.into_iter().find(|candidate| {
                        normalize_message_id(&messages[*candidate].message_id()) == wanted
                    })
                }
            }
        })
        .collect()
}

/// Root and depth of every node. A reference cycle is cut at the node where
/// the walk first re-enters it.
fn resolve_roots(parents: &[Option<usize>]) -> (Vec<usize>, Vec<usize>) {
    let n = parents.len();
    let mut roots = vec![UNRESOLVED; n];
    let mut depths = vec![0; n];
    let mut visiting = vec![UNRESOLVED; n];

    for start in 0..n {
        if roots[start] != UNRESOLVED {
            continue;
        }
        let mut path = Vec::new();
        let mut current = start;
        let (root, mut next_depth) = loop {
            if roots[current] != UNRESOLVED {
                break (roots[current], depths[current] + 1);
            }
            let parent = if visiting[current] == start {
                None
            } else {
                visiting[current] = start;
                path.push(current);
                parents[current]
            };
            match parent {
                Some(parent) => current = parent,
                None => {
                    // The last node of the path becomes a root.
                    let Some(root) = path.pop() else {
                        break (current, 0);
                    };
                    roots[root] = root;
                    depths[root] = 0;
                    break (root, 1);
                }
            }
        };
        for &node in path.iter().rev() {
            roots[node] = root;
            depths[node] = next_depth;
            next_depth += 1;
        }
    }
    (roots, depths)
}

/// Registers the thread atom with the given registry.
pub fn register_thread_atoms(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::eager("Thread", Arity::Range(0, 1), ATOM_THREAD));
}
