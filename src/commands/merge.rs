use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::assemble::images_to_pdf;
use crate::cli::MergeArgs;
use crate::reorder::{GridLayout, Point, move_left, move_right, move_to, remove, reorder};

pub fn run(args: MergeArgs) -> Result<()> {
    let ordered = apply_edits(args.images.clone(), &args)?;
    for (index, path) in ordered.iter().enumerate() {
        debug!(position = index + 1, path = %path.display(), "page order");
    }

    let pages = images_to_pdf(&ordered, &args.output)?;
    info!(path = %args.output.display(), pages, "wrote merged PDF");
    Ok(())
}

/// Apply the reorder edits of `args` to `items`.
pub fn apply_edits<T: Clone>(mut items: Vec<T>, args: &MergeArgs) -> Result<Vec<T>> {
    let mut removals = args.remove.clone();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for position in removals {
        let index = checked_index(position, items.len())?;
        items = remove(&items, index);
    }

    for edit in &args.moves {
        let from = checked_index(edit.from, items.len())?;
        let to = checked_index(edit.to, items.len())?;
        items = move_to(&items, from, to);
    }
    for &position in &args.left {
        items = move_left(&items, checked_index(position, items.len())?);
    }
    for &position in &args.right {
        items = move_right(&items, checked_index(position, items.len())?);
    }

    let layout = GridLayout::default();
    for edit in &args.drops {
        let source = checked_index(edit.source, items.len())?;
        items = reorder(&items, source, Point::new(edit.x, edit.y), &layout);
    }

    if items.is_empty() {
        bail!("every image was removed; nothing to merge");
    }
    Ok(items)
}

fn checked_index(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        bail!("position {position} is outside 1..={len}");
    }
    Ok(position - 1)
}
