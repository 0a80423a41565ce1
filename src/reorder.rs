//! Drag-to-reorder over a fixed card grid.
//!
//! Cards are laid out row-major, `columns` per row. A drop lands on the card
//! whose center is nearest; the right half of that card means "after it".

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns: usize,
    pub card_width: f64,
    pub card_height: f64,
    /// Space on every side of a card.
    pub padding: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: 4,
            card_width: 180.0,
            card_height: 240.0,
            padding: 10.0,
        }
    }
}

impl GridLayout {
    pub fn card_center(&self, index: usize) -> Point {
        let columns = self.columns.max(1);
        let column = (index % columns) as f64;
        let row = (index / columns) as f64;
        let cell_width = self.card_width + 2.0 * self.padding;
        let cell_height = self.card_height + 2.0 * self.padding;
        Point::new(
            column * cell_width + self.padding + self.card_width / 2.0,
            row * cell_height + self.padding + self.card_height / 2.0,
        )
    }

    /// Index of the card nearest to `point`; the first card wins ties.
    pub fn nearest_card(&self, count: usize, point: Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for index in 0..count {
            let distance = self.card_center(index).distance(point);
            if best.is_none_or(|(_, current)| distance < current) {
                best = Some((index, distance));
            }
        }
        best.map(|(index, _)| index)
    }
}

/// Move `items[source]` to wherever a drop at `drop` points. Returns the new
/// order; an out-of-range source leaves the order unchanged.
pub fn reorder<T: Clone>(items: &[T], source: usize, drop: Point, layout: &GridLayout) -> Vec<T> {
    let mut reordered = items.to_vec();
    if source >= items.len() {
        return reordered;
    }
    let Some(closest) = layout.nearest_card(items.len(), drop) else {
        return reordered;
    };

    let mut insert_at = closest;
    if drop.x > layout.card_center(closest).x {
        insert_at += 1;
    }
    if insert_at == source {
        return reordered;
    }

    let item = reordered.remove(source);
    if insert_at > source {
        insert_at -= 1;
    }
    reordered.insert(insert_at.min(reordered.len()), item);
    reordered
}

/// Move the item at `from` so it ends up at index `to` (clamped).
pub fn move_to<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut moved = items.to_vec();
    if from < moved.len() {
        let item = moved.remove(from);
        moved.insert(to.min(moved.len()), item);
    }
    moved
}

/// Swap with the left neighbor; no-op for the first item.
pub fn move_left<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    let mut moved = items.to_vec();
    if index > 0 && index < moved.len() {
        moved.swap(index, index - 1);
    }
    moved
}

/// Swap with the right neighbor; no-op for the last item.
pub fn move_right<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    let mut moved = items.to_vec();
    if index + 1 < moved.len() {
        moved.swap(index, index + 1);
    }
    moved
}

pub fn remove<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    let mut kept = items.to_vec();
    if index < kept.len() {
        kept.remove(index);
    }
    kept
}
