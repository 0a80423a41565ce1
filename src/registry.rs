use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Run, Segment, SegmentId};

/// Per-segment inclusion flags. Serialized as a list of entries so the JSON stays readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SelectionEntry>", into = "Vec<SelectionEntry>")]
pub struct SelectionRegistry {
    flags: BTreeMap<SegmentId, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub page_number: u32,
    pub sub_index: u32,
    pub included: bool,
}

impl From<Vec<SelectionEntry>> for SelectionRegistry {
    fn from(entries: Vec<SelectionEntry>) -> Self {
        let flags = entries
            .into_iter()
            .map(|entry| {
                (
                    SegmentId::new(entry.page_number, entry.sub_index),
                    entry.included,
                )
            })
            .collect();
        Self { flags }
    }
}

impl From<SelectionRegistry> for Vec<SelectionEntry> {
    fn from(registry: SelectionRegistry) -> Self {
        registry
            .flags
            .into_iter()
            .map(|(id, included)| SelectionEntry {
                page_number: id.page_number,
                sub_index: id.sub_index,
                included,
            })
            .collect()
    }
}

impl SelectionRegistry {
    /// Every segment of `run`, included.
    pub fn all_included(run: &Run) -> Self {
        let flags = run
            .values()
            .flatten()
            .map(|segment| (segment.id(), true))
            .collect();
        Self { flags }
    }

    pub fn is_included(&self, id: SegmentId) -> bool {
        self.flags.get(&id).copied().unwrap_or(false)
    }

    /// Returns `false` when `id` is not part of the run.
    pub fn set(&mut self, id: SegmentId, included: bool) -> bool {
        match self.flags.get_mut(&id) {
            Some(flag) => {
                *flag = included;
                true
            }
            None => false,
        }
    }

    /// Flip `id`; returns the new state, or `None` when `id` is unknown.
    pub fn toggle(&mut self, id: SegmentId) -> Option<bool> {
        let flag = self.flags.get_mut(&id)?;
        *flag = !*flag;
        Some(*flag)
    }

    pub fn set_page(&mut self, page_number: u32, included: bool) -> usize {
        let mut changed = 0;
        for (_, flag) in self
            .flags
            .range_mut(SegmentId::new(page_number, 0)..=SegmentId::new(page_number, u32::MAX))
        {
            *flag = included;
            changed += 1;
        }
        changed
    }

    pub fn set_all(&mut self, included: bool) {
        for flag in self.flags.values_mut() {
            *flag = included;
        }
    }

    pub fn included_count(&self) -> usize {
        self.flags.values().filter(|included| **included).count()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Included segments grouped by page, pages ascending, segments in run order.
    /// Pages with nothing included are absent.
    pub fn included_segments(&self, run: &Run) -> Run {
        run.iter()
            .filter_map(|(page_number, segments)| {
                let kept = segments
                    .iter()
                    .filter(|segment| self.is_included(segment.id()))
                    .cloned()
                    .collect::<Vec<Segment>>();
                (!kept.is_empty()).then_some((*page_number, kept))
            })
            .collect()
    }
}
