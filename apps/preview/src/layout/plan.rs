//! Placement plan — the paginator's output.
//!
//! A plan is an ordered list of pages; each page is an ordered list of slices; each slice
//! places all (`Whole`) or a contiguous sub-block range (`Partial`) of one block. The plan is
//! ephemeral: built per content/geometry change, consumed once by the materializer.

use serde::{Deserialize, Serialize};

use crate::layout::block::{Block, BlockId, SubBlock};

// ────────────────────────────────────────────────────────────────────────────
// Slice
// ────────────────────────────────────────────────────────────────────────────

/// How much of a block a slice places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SliceKind {
    Whole,
    /// Sub-blocks `[from, to)` of a block split across pages.
    Partial { from: usize, to: usize },
}

/// A placement of all or part of one block onto one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slice {
    /// Position of the block in the paginated sequence.
    pub block_index: usize,
    pub block_id: BlockId,
    #[serde(flatten)]
    pub kind: SliceKind,
    /// Height contribution on its page, margins included only at the block's true edges.
    pub height: f64,
}

/// Everything the materializer needs to render a slice without re-running placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceMeta {
    pub block_index: usize,
    pub from: usize,
    pub to: usize,
    pub is_first_of_block: bool,
    pub is_last_of_block: bool,
}

impl Slice {
    pub fn whole(block_index: usize, block: &Block) -> Self {
        Self {
            block_index,
            block_id: block.id.clone(),
            kind: SliceKind::Whole,
            height: block.base_height(),
        }
    }

    /// Builds a partial slice over `subs[from..to]`, computing its height.
    ///
    /// `margin_top` counts only when `from == 0`; `margin_bottom` only when `to` reaches
    /// the final sub-block.
    pub fn partial(
        block_index: usize,
        block: &Block,
        subs: &[SubBlock],
        from: usize,
        to: usize,
    ) -> Self {
        Self {
            block_index,
            block_id: block.id.clone(),
            kind: SliceKind::Partial { from, to },
            height: range_height(block, subs, from, to),
        }
    }

    /// Resolves the slice into materializer metadata. `total_sub_blocks` is the block's
    /// sub-block count (ignored for whole slices).
    pub fn meta(&self, total_sub_blocks: usize) -> SliceMeta {
        match self.kind {
            SliceKind::Whole => SliceMeta {
                block_index: self.block_index,
                from: 0,
                to: total_sub_blocks,
                is_first_of_block: true,
                is_last_of_block: true,
            },
            SliceKind::Partial { from, to } => SliceMeta {
                block_index: self.block_index,
                from,
                to,
                is_first_of_block: from == 0,
                is_last_of_block: to == total_sub_blocks,
            },
        }
    }
}

/// Height of sub-blocks `[from, to)` with the block's boundary margins where they apply.
pub fn range_height(block: &Block, subs: &[SubBlock], from: usize, to: usize) -> f64 {
    let mut height: f64 = subs[from..to].iter().map(|s| s.height).sum();
    if from == 0 {
        height += block.margin_top;
    }
    if to == subs.len() {
        height += block.margin_bottom;
    }
    height
}

// ────────────────────────────────────────────────────────────────────────────
// Page / PlacementPlan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub slices: Vec<Slice>,
    pub content_height: f64,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn push(&mut self, slice: Slice) {
        self.content_height += slice.height;
        self.slices.push(slice);
    }

    /// Swaps the last slice for `replacement`, keeping `content_height` in step.
    pub fn replace_last(&mut self, replacement: Slice) {
        if let Some(last) = self.slices.pop() {
            self.content_height -= last.height;
        }
        self.push(replacement);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPlan {
    pub pages: Vec<Page>,
    pub total_height: f64,
}

impl PlacementPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(heights: &[f64]) -> Vec<SubBlock> {
        heights.iter().copied().map(SubBlock::new).collect()
    }

    #[test]
    fn test_partial_height_counts_margins_only_at_true_edges() {
        let block = Block::new("exp", 90.0).with_margins(5.0, 7.0).splittable();
        let s = subs(&[30.0, 30.0, 30.0]);

        assert!((Slice::partial(0, &block, &s, 0, 1).height - 35.0).abs() < 1e-9);
        assert!((Slice::partial(0, &block, &s, 1, 2).height - 30.0).abs() < 1e-9);
        assert!((Slice::partial(0, &block, &s, 2, 3).height - 37.0).abs() < 1e-9);
        assert!((Slice::partial(0, &block, &s, 0, 3).height - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_meta_flags_first_and_last() {
        let block = Block::new("exp", 90.0).splittable();
        let s = subs(&[30.0, 30.0, 30.0]);

        let head = Slice::partial(3, &block, &s, 0, 2).meta(3);
        assert!(head.is_first_of_block && !head.is_last_of_block);
        assert_eq!((head.block_index, head.from, head.to), (3, 0, 2));

        let tail = Slice::partial(3, &block, &s, 2, 3).meta(3);
        assert!(!tail.is_first_of_block && tail.is_last_of_block);

        let whole = Slice::whole(3, &block).meta(0);
        assert!(whole.is_first_of_block && whole.is_last_of_block);
    }

    #[test]
    fn test_page_replace_last_keeps_running_total() {
        let block = Block::new("exp", 90.0).splittable();
        let s = subs(&[30.0, 30.0, 30.0]);
        let mut page = Page::default();
        page.push(Slice::whole(0, &Block::new("heading", 20.0)));
        page.push(Slice::partial(1, &block, &s, 0, 2));
        assert!((page.content_height - 80.0).abs() < 1e-9);

        page.replace_last(Slice::partial(1, &block, &s, 0, 1));
        assert!((page.content_height - 50.0).abs() < 1e-9);
        assert_eq!(page.slices.len(), 2);
    }
}
