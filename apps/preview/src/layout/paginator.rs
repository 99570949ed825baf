//! Paginator — distributes measured blocks across fixed-height pages.
//!
//! # Algorithm
//! Single forward pass, greedy, O(blocks + sub-blocks):
//! 1. Group guard: a block opening a new group that does not fit the remaining space starts
//!    a fresh page instead of being opened and immediately interrupted.
//! 2. A block that fits whole is placed whole.
//! 3. A non-splittable block that does not fit gets a page of its own: the current page is
//!    closed, the block is placed (even if it overflows; content is never dropped) and the
//!    page is closed again behind it.
//! 4. A splittable block is sliced at sub-block boundaries, greedily filling each page.
//!    Without `allow_widow_orphans`, a lone continuation sub-block pulls one sub-block back
//!    from the preceding slice of the same block, and the slice is re-extended from there.
//!
//! The function is pure: no shared state, no suspension points. Identical inputs always
//! produce identical plans.

use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::block::{Block, BlockId, GroupId, SubBlock, SubBlockSource};
use crate::layout::plan::{Page, PlacementPlan, Slice, SliceKind};

/// Tolerance absorbing floating-point noise in height sums.
pub const EPSILON: f64 = 0.001;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Invalid pagination input. Rejected before any placement; no partial plan is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("page inner height must be positive, got {0}")]
    NonPositivePageHeight(f64),

    #[error("block '{id}' has invalid height {height}")]
    InvalidBlockHeight { id: BlockId, height: f64 },

    #[error("block '{id}' has invalid margin {margin}")]
    InvalidBlockMargin { id: BlockId, margin: f64 },

    #[error("duplicate block id '{0}'")]
    DuplicateBlockId(BlockId),

    #[error("page margin {margin} leaves no content height on a {page_height}px page")]
    InvalidMargin { margin: f64, page_height: f64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Partitions `blocks` into pages of `page_inner_height`.
///
/// Fails only on invalid configuration (non-positive page height, negative or non-finite
/// block dimensions). Otherwise always returns a complete plan, tolerating localized
/// overflow rather than dropping content.
pub fn paginate<S>(
    blocks: &[Block],
    sub_blocks: &S,
    page_inner_height: f64,
    allow_widow_orphans: bool,
) -> Result<PlacementPlan, ConfigurationError>
where
    S: SubBlockSource + ?Sized,
{
    validate(blocks, page_inner_height)?;

    let mut flow = Flow::new(page_inner_height);
    let mut previous_group: Option<&GroupId> = None;

    for (index, block) in blocks.iter().enumerate() {
        let base_height = block.base_height();

        // Group guard: start the group on a fresh page rather than interrupting it.
        let opens_group = block.group_id.is_some() && block.group_id.as_ref() != previous_group;
        if opens_group && !flow.current.is_empty() && !flow.fits(base_height) {
            flow.break_page();
        }
        previous_group = block.group_id.as_ref();

        if flow.fits(base_height) {
            flow.current.push(Slice::whole(index, block));
            continue;
        }

        if !block.splittable {
            flow.place_unsplit(index, block);
            continue;
        }

        match sub_blocks.sub_blocks(block) {
            Ok(subs) if subs.is_empty() => flow.place_unsplit(index, block),
            Ok(subs) => flow.place_split(index, block, &subs, allow_widow_orphans),
            Err(err) => {
                warn!(block_id = %block.id, error = %err, "Placing splittable block whole");
                flow.place_unsplit(index, block);
            }
        }
    }

    let plan = flow.finish();
    debug!(
        blocks = blocks.len(),
        pages = plan.page_count(),
        total_height = plan.total_height,
        "Pagination pass complete"
    );
    Ok(plan)
}

fn validate(blocks: &[Block], page_inner_height: f64) -> Result<(), ConfigurationError> {
    if !page_inner_height.is_finite() || page_inner_height <= 0.0 {
        return Err(ConfigurationError::NonPositivePageHeight(page_inner_height));
    }
    for block in blocks {
        if !block.height.is_finite() || block.height < 0.0 {
            return Err(ConfigurationError::InvalidBlockHeight {
                id: block.id.clone(),
                height: block.height,
            });
        }
        for margin in [block.margin_top, block.margin_bottom] {
            if !margin.is_finite() || margin < 0.0 {
                return Err(ConfigurationError::InvalidBlockMargin {
                    id: block.id.clone(),
                    margin,
                });
            }
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Flow state
// ────────────────────────────────────────────────────────────────────────────

/// Local accumulators of one pass: closed pages plus the page being filled.
struct Flow {
    page_inner_height: f64,
    pages: Vec<Page>,
    current: Page,
}

impl Flow {
    fn new(page_inner_height: f64) -> Self {
        Self {
            page_inner_height,
            pages: Vec::new(),
            current: Page::default(),
        }
    }

    fn remaining(&self) -> f64 {
        self.page_inner_height - self.current.content_height
    }

    fn fits(&self, height: f64) -> bool {
        height <= self.remaining() + EPSILON
    }

    fn is_full(&self) -> bool {
        self.remaining() <= EPSILON
    }

    /// Closes the current page. Empty pages are never emitted.
    fn break_page(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }
    }

    /// The last slice emitted so far, on the current page or the end of the previous one.
    fn last_emitted(&self) -> Option<&Slice> {
        self.current
            .slices
            .last()
            .or_else(|| self.pages.last().and_then(|p| p.slices.last()))
    }

    fn replace_last_emitted(&mut self, replacement: Slice) {
        if !self.current.is_empty() {
            self.current.replace_last(replacement);
        } else if let Some(page) = self.pages.last_mut() {
            page.replace_last(replacement);
        }
    }

    /// Places a block whole on a page of its own.
    fn place_unsplit(&mut self, index: usize, block: &Block) {
        self.break_page();
        self.current.push(Slice::whole(index, block));
        if !self.fits(0.0) {
            warn!(
                block_id = %block.id,
                height = block.base_height(),
                page_inner_height = self.page_inner_height,
                "Block overflows page"
            );
        }
        self.break_page();
    }

    /// Slices a splittable block across pages at sub-block boundaries.
    fn place_split(
        &mut self,
        index: usize,
        block: &Block,
        subs: &[SubBlock],
        allow_widow_orphans: bool,
    ) {
        let count = subs.len();
        let mut from = 0;

        while from < count {
            if self.is_full() {
                self.break_page();
            }

            let mut to = self.extend(block, subs, from);
            if to == from {
                if !self.current.is_empty() {
                    self.break_page();
                    continue;
                }
                // Nothing fits an empty page: force one sub-block for forward progress.
                warn!(block_id = %block.id, sub_block = from, "Sub-block overflows page");
                to = from + 1;
            }

            if !allow_widow_orphans && to - from == 1 {
                if let Some((new_from, new_to)) = self.pull_back(index, block, subs, from) {
                    from = new_from;
                    to = new_to;
                }
            }

            self.current.push(Slice::partial(index, block, subs, from, to));
            if to == count {
                break;
            }
            self.break_page();
            from = to;
        }
    }

    /// Largest `to` such that `[from, to)` fits the current page's remaining space.
    fn extend(&self, block: &Block, subs: &[SubBlock], from: usize) -> usize {
        let available = self.remaining() + EPSILON;
        let mut used = if from == 0 { block.margin_top } else { 0.0 };
        let mut to = from;

        while to < subs.len() {
            let mut next = used + subs[to].height;
            if to + 1 == subs.len() {
                next += block.margin_bottom;
            }
            if next > available {
                break;
            }
            used = next;
            to += 1;
        }
        to
    }

    /// Orphan correction for a lone continuation sub-block starting at `from`.
    ///
    /// When the preceding slice is a multi-sub-block partial of the same block, it gives
    /// up its last sub-block and the current slice is re-extended from the new boundary.
    /// Returns the new `[from, to)`.
    fn pull_back(
        &mut self,
        index: usize,
        block: &Block,
        subs: &[SubBlock],
        from: usize,
    ) -> Option<(usize, usize)> {
        let prev = self.last_emitted()?;
        let prev_from = match prev.kind {
            SliceKind::Partial { from: f, to: t } if prev.block_index == index && t == from => f,
            _ => return None,
        };
        if from - prev_from < 2 {
            return None;
        }

        let new_from = from - 1;
        self.replace_last_emitted(Slice::partial(index, block, subs, prev_from, new_from));

        let new_to = self.extend(block, subs, new_from).max(new_from + 1);
        debug!(block_id = %block.id, boundary = new_from, "Pulled sub-block back to avoid orphan");
        Some((new_from, new_to))
    }

    fn finish(mut self) -> PlacementPlan {
        self.break_page();
        let total_height = self.pages.iter().map(|p| p.content_height).sum();
        PlacementPlan {
            pages: self.pages,
            total_height,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
