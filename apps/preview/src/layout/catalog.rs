//! Flow catalog — the measured output of the preview layout pass.
//!
//! The browser lays out the current document with its template, measures every top-level
//! block (and, for splittable blocks, every sub-block), and posts the result as a list of
//! `FlowBlock`s in document order. The catalog turns that into paginator input and serves
//! the on-demand sub-block lookups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::block::{Block, BlockId, GroupId, MeasurementUnavailable, SubBlock, SubBlockSource};
use crate::layout::paginator::ConfigurationError;

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// One measured sub-block (e.g. a single bullet line) and its rendered fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredSubBlock {
    pub height: f64,
    #[serde(default)]
    pub content: Value,
}

/// One measured top-level block as produced by the layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowBlock {
    pub id: BlockId,
    pub height: f64,
    #[serde(default)]
    pub margin_top: f64,
    #[serde(default)]
    pub margin_bottom: f64,
    #[serde(default)]
    pub splittable: bool,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Rendered content of the whole block.
    #[serde(default)]
    pub content: Value,
    /// Sub-block measurements; absent when the layout pass did not measure them.
    #[serde(default)]
    pub sub_blocks: Option<Vec<MeasuredSubBlock>>,
    /// Set by the layout pass when sub-block measurement failed for this block.
    #[serde(default)]
    pub measurement_error: Option<String>,
}

impl FlowBlock {
    pub fn to_block(&self) -> Block {
        Block {
            id: self.id.clone(),
            height: self.height,
            margin_top: self.margin_top,
            margin_bottom: self.margin_bottom,
            splittable: self.splittable,
            group_id: self.group_id.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// Measured blocks of one document state, in document order.
#[derive(Debug, Clone, Default)]
pub struct FlowCatalog {
    entries: Vec<FlowBlock>,
    blocks: Vec<Block>,
    by_id: HashMap<BlockId, usize>,
}

impl FlowCatalog {
    /// Builds a catalog, rejecting duplicate block ids.
    pub fn new(entries: Vec<FlowBlock>) -> Result<Self, ConfigurationError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id.clone(), index).is_some() {
                return Err(ConfigurationError::DuplicateBlockId(entry.id.clone()));
            }
        }
        let blocks = entries.iter().map(FlowBlock::to_block).collect();
        Ok(Self {
            entries,
            blocks,
            by_id,
        })
    }

    /// Paginator input, in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The measured entry at a block index of the paginated sequence.
    pub fn entry(&self, block_index: usize) -> Option<&FlowBlock> {
        self.entries.get(block_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry_for(&self, id: &BlockId) -> Option<&FlowBlock> {
        self.by_id.get(id).map(|&index| &self.entries[index])
    }
}

impl SubBlockSource for FlowCatalog {
    fn sub_blocks(&self, block: &Block) -> Result<Vec<SubBlock>, MeasurementUnavailable> {
        let entry = self
            .entry_for(&block.id)
            .ok_or_else(|| MeasurementUnavailable::new(&block.id, "block not in catalog"))?;

        if let Some(reason) = &entry.measurement_error {
            return Err(MeasurementUnavailable::new(&block.id, reason.clone()));
        }
        let measured = entry
            .sub_blocks
            .as_ref()
            .ok_or_else(|| MeasurementUnavailable::new(&block.id, "sub-blocks not measured"))?;

        measured
            .iter()
            .enumerate()
            .map(|(i, sub)| {
                if sub.height.is_finite() && sub.height >= 0.0 {
                    Ok(SubBlock::new(sub.height))
                } else {
                    Err(MeasurementUnavailable::new(
                        &block.id,
                        format!("sub-block {i} has invalid height {}", sub.height),
                    ))
                }
            })
            .collect()
    }
}
