//! Measured content blocks — the unit of input to the paginator.
//!
//! A `Block` is one top-level content unit (a work-experience entry, a paragraph, a
//! section heading). Its height is measured upstream by the layout pass and is immutable
//! for the duration of a pagination pass. Splittable blocks additionally expose their
//! `SubBlock`s (e.g. one bullet line each) through a `SubBlockSource`, queried lazily only
//! when the block does not fit whole.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Stable reference to a block, assigned by the flow catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.to_string())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Group affinity hint: blocks sharing a group should start together on one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        GroupId(s.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block / SubBlock
// ────────────────────────────────────────────────────────────────────────────

/// One top-level content unit participating in pagination. Heights are CSS px.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// Whether the block may be divided at sub-block boundaries.
    pub splittable: bool,
    pub group_id: Option<GroupId>,
}

impl Block {
    /// Height the block occupies when placed whole: content plus both margins.
    pub fn base_height(&self) -> f64 {
        self.height + self.margin_top + self.margin_bottom
    }
}

#[cfg(test)]
impl Block {
    /// A non-splittable block with no margins and no group.
    pub fn new(id: impl Into<BlockId>, height: f64) -> Self {
        Self {
            id: id.into(),
            height,
            margin_top: 0.0,
            margin_bottom: 0.0,
            splittable: false,
            group_id: None,
        }
    }

    pub fn splittable(mut self) -> Self {
        self.splittable = true;
        self
    }

    pub fn with_margins(mut self, top: f64, bottom: f64) -> Self {
        self.margin_top = top;
        self.margin_bottom = bottom;
        self
    }

    pub fn in_group(mut self, group: impl Into<GroupId>) -> Self {
        self.group_id = Some(group.into());
        self
    }
}

/// A finer unit inside a splittable block; the smallest unit that can move to another page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubBlock {
    pub height: f64,
}

impl SubBlock {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sub-block accessor
// ────────────────────────────────────────────────────────────────────────────

/// The sub-block measurement for a splittable block could not be obtained.
///
/// Not fatal: the paginator places the block as if it were non-splittable.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("sub-block measurement unavailable for block '{block_id}': {reason}")]
pub struct MeasurementUnavailable {
    pub block_id: BlockId,
    pub reason: String,
}

impl MeasurementUnavailable {
    pub fn new(block_id: &BlockId, reason: impl Into<String>) -> Self {
        Self {
            block_id: block_id.clone(),
            reason: reason.into(),
        }
    }
}

/// On-demand accessor for the ordered sub-blocks of a splittable block.
///
/// Only called for blocks that are marked splittable and do not fit whole in the
/// remaining page space. Must return sub-blocks in document order.
pub trait SubBlockSource {
    fn sub_blocks(&self, block: &Block) -> Result<Vec<SubBlock>, MeasurementUnavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_height_includes_both_margins() {
        let block = Block::new("exp-1", 120.0).with_margins(8.0, 12.0);
        assert!((block.base_height() - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_builder_sets_split_and_group() {
        let block = Block::new("exp-1", 10.0).splittable().in_group("experience");
        assert!(block.splittable);
        assert_eq!(block.group_id, Some(GroupId::from("experience")));
    }
}
