use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::SelectArgs;
use crate::model::RunManifest;
use crate::registry::SelectionRegistry;
use crate::util::{now_utc_string, read_json, write_json_pretty};

pub fn run(args: SelectArgs) -> Result<()> {
    let mut manifest: RunManifest = read_json(&args.run_path)?;
    apply_selection(&mut manifest.selection, &args)?;
    manifest.updated_at = now_utc_string();

    for (page_number, segments) in &manifest.segments {
        let included = segments
            .iter()
            .filter(|segment| manifest.selection.is_included(segment.id()))
            .count();
        debug!(page = page_number, included, segments = segments.len(), "page selection");
    }

    write_json_pretty(&args.run_path, &manifest)?;
    info!(
        path = %args.run_path.display(),
        included = manifest.selection.included_count(),
        total = manifest.selection.len(),
        "selection updated"
    );
    Ok(())
}

/// Apply `--all`/`--none`, then pages, includes, excludes and toggles.
/// Any unknown page or segment aborts before the registry is written.
pub fn apply_selection(registry: &mut SelectionRegistry, args: &SelectArgs) -> Result<()> {
    if args.all {
        registry.set_all(true);
    }
    if args.none {
        registry.set_all(false);
    }

    for &page_number in &args.pages {
        if registry.set_page(page_number, true) == 0 {
            bail!("page {page_number} has no segments in this run");
        }
    }
    for &id in &args.include {
        if !registry.set(id, true) {
            bail!("segment {id} is not part of this run");
        }
    }
    for &id in &args.exclude {
        if !registry.set(id, false) {
            bail!("segment {id} is not part of this run");
        }
    }
    for &id in &args.toggle {
        match registry.toggle(id) {
            Some(included) => debug!(segment = %id, included, "toggled"),
            None => bail!("segment {id} is not part of this run"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::{Rect, Run, Segment, SegmentId};

    fn run_with_split_page() -> Run {
        let segment = |page_number, sub_index| Segment {
            page_number,
            sub_index,
            rect: Rect::new(0, 0, 10, 10).expect("rect"),
            source_width: 10,
        };
        let mut run = Run::new();
        run.insert(1, vec![segment(1, 1)]);
        run.insert(2, vec![segment(2, 1), segment(2, 2)]);
        run
    }

    fn args() -> SelectArgs {
        SelectArgs {
            run_path: PathBuf::from("run.json"),
            all: false,
            none: false,
            pages: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            toggle: Vec::new(),
        }
    }

    #[test]
    fn none_then_page_selects_only_that_page() {
        let run = run_with_split_page();
        let mut registry = SelectionRegistry::all_included(&run);
        let args = SelectArgs {
            none: true,
            pages: vec![2],
            ..args()
        };

        apply_selection(&mut registry, &args).expect("apply");
        assert_eq!(registry.included_count(), 2);
        assert!(!registry.is_included(SegmentId::new(1, 1)));
    }

    #[test]
    fn exclude_and_toggle_compose() {
        let run = run_with_split_page();
        let mut registry = SelectionRegistry::all_included(&run);
        let args = SelectArgs {
            exclude: vec![SegmentId::new(2, 1)],
            toggle: vec![SegmentId::new(2, 1), SegmentId::new(1, 1)],
            ..args()
        };

        apply_selection(&mut registry, &args).expect("apply");
        assert!(registry.is_included(SegmentId::new(2, 1)));
        assert!(!registry.is_included(SegmentId::new(1, 1)));
    }

    #[test]
    fn unknown_targets_are_errors() {
        let run = run_with_split_page();
        let mut registry = SelectionRegistry::all_included(&run);

        let err = apply_selection(
            &mut registry,
            &SelectArgs {
                include: vec![SegmentId::new(1, 2)],
                ..args()
            },
        )
        .expect_err("unknown segment");
        assert!(err.to_string().contains("1:2"));

        assert!(
            apply_selection(
                &mut registry,
                &SelectArgs {
                    pages: vec![9],
                    ..args()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn highest_page_number_is_an_unknown_page() {
        let run = run_with_split_page();
        let mut registry = SelectionRegistry::all_included(&run);
        let last_page = SelectArgs {
            pages: vec![u32::MAX],
            ..args()
        };

        let err = apply_selection(&mut registry, &last_page).expect_err("no such page");
        assert!(err.to_string().contains(&u32::MAX.to_string()));
        assert_eq!(registry.included_count(), 3);
    }
}
