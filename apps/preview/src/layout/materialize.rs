//! Slice materialization — turns a placement plan into renderable preview pages.
//!
//! Materializing never re-runs placement: each slice is rendered from its block's measured
//! content plus the slice metadata alone. A partial slice keeps only the sub-block fragments
//! in its range and drops the boundary margin on any edge that is not the block's true
//! start or end.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::layout::block::BlockId;
use crate::layout::catalog::{FlowBlock, FlowCatalog};
use crate::layout::geometry::PageGeometry;
use crate::layout::plan::{PlacementPlan, Slice, SliceKind};

/// Cooperative cancellation, polled between pages.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SliceBody {
    /// The block's rendered content, unchanged.
    Whole { content: Value },
    /// Only the sub-block fragments visible on this page.
    Partial { fragments: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedSlice {
    pub block_id: BlockId,
    pub from: usize,
    pub to: usize,
    pub is_first_of_block: bool,
    pub is_last_of_block: bool,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub height: f64,
    pub body: SliceBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedPage {
    pub index: usize,
    /// Top of the page in the scrolled preview.
    pub offset_px: f64,
    pub content_height: f64,
    pub slices: Vec<MaterializedSlice>,
}

// ────────────────────────────────────────────────────────────────────────────
// Materialization
// ────────────────────────────────────────────────────────────────────────────

/// Renders `entry` restricted to the range of `slice`.
pub fn materialize_slice(entry: &FlowBlock, slice: &Slice) -> MaterializedSlice {
    let fragments = entry.sub_blocks.as_deref().unwrap_or_default();
    let meta = slice.meta(fragments.len());

    let body = match slice.kind {
        SliceKind::Whole => SliceBody::Whole {
            content: entry.content.clone(),
        },
        SliceKind::Partial { from, to } => SliceBody::Partial {
            fragments: fragments
                .get(from..to)
                .unwrap_or_default()
                .iter().map(|f| f.content.clone()).collect(),
        },
    };

    MaterializedSlice {
        block_id: entry.id.clone(),
        from: meta.from,
        to: meta.to,
        is_first_of_block: meta.is_first_of_block,
        is_last_of_block: meta.is_last_of_block,
        margin_top: if meta.is_first_of_block { entry.margin_top } else { 0.0 },
        margin_bottom: if meta.is_last_of_block { entry.margin_bottom } else { 0.0 },
        height: slice.height,
        body,
    }
}

/// Renders every page of `plan`. Returns `None` if `cancel` fires mid-way; the partial
/// output is dropped.
pub fn materialize_plan<C>(
    plan: &PlacementPlan,
    catalog: &FlowCatalog,
    geometry: &PageGeometry,
    cancel: &C,
) -> Option<Vec<MaterializedPage>>
where
    C: CancelToken + ?Sized,
{
    let offsets = geometry.page_offsets(plan.page_count());
    let mut pages = Vec::with_capacity(plan.page_count());

    for (index, page) in plan.pages.iter().enumerate() {
        if cancel.is_cancelled() {
            return None;
        }
        let slices = page
            .slices
            .iter()
            .filter_map(|slice| match catalog.entry(slice.block_index) {
                Some(entry) => Some(materialize_slice(entry, slice)),
                None => {
                    warn!(block_id = %slice.block_id, "Slice refers to a block outside the catalog");
                    None
                }
            })
            .collect();

        pages.push(MaterializedPage {
            index,
            offset_px: offsets[index],
            content_height: page.content_height,
            slices,
        });
    }
    Some(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::catalog::tests::{bullet_block, fixed_block};
    use crate::layout::geometry::default_geometry;
    use crate::layout::paginator::paginate;
    use serde_json::json;
    use std::cell::Cell;

    struct CancelAfter(Cell<usize>);

    impl CancelToken for CancelAfter {
        fn is_cancelled(&self) -> bool {
            let left = self.0.get();
            if left == 0 {
                return true;
            }
            self.0.set(left - 1);
            false
        }
    }

    fn never() -> CancelAfter {
        CancelAfter(Cell::new(usize::MAX))
    }

    #[test]
    fn test_whole_slice_reuses_block_content() {
        let mut entry = fixed_block("summary", 40.0);
        entry.margin_top = 6.0;
        entry.margin_bottom = 9.0;
        let slice = Slice::whole(0, &entry.to_block());

        let out = materialize_slice(&entry, &slice);
        assert_eq!(out.body, SliceBody::Whole { content: json!({ "id": "summary" }) });
        assert!(out.is_first_of_block && out.is_last_of_block);
        assert_eq!((out.margin_top, out.margin_bottom), (6.0, 9.0));
    }

    #[test]
    fn test_partial_slices_keep_range_and_true_edge_margins() {
        let mut entry = bullet_block("exp", &[10.0, 10.0, 10.0]);
        entry.margin_top = 4.0;
        entry.margin_bottom = 8.0;
        let block = entry.to_block();
        let subs: Vec<_> = entry
            .sub_blocks
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| crate::layout::block::SubBlock::new(s.height))
            .collect();

        let head = materialize_slice(&entry, &Slice::partial(0, &block, &subs, 0, 2));
        assert_eq!(
            head.body,
            SliceBody::Partial {
                fragments: vec![json!("exp:0"), json!("exp:1")]
            }
        );
        assert_eq!((head.margin_top, head.margin_bottom), (4.0, 0.0));

        let tail = materialize_slice(&entry, &Slice::partial(0, &block, &subs, 2, 3));
        assert_eq!(tail.body, SliceBody::Partial { fragments: vec![json!("exp:2")] });
        assert_eq!((tail.margin_top, tail.margin_bottom), (0.0, 8.0));
        assert!(!tail.is_first_of_block && tail.is_last_of_block);
    }

    #[test]
    fn test_plan_pages_carry_offsets() {
        let catalog = FlowCatalog::new(vec![
            fixed_block("header", 600.0),
            bullet_block("exp", &[300.0, 300.0, 300.0]),
        ])
        .unwrap();
        let geometry = default_geometry();
        let plan = paginate(catalog.blocks(), &catalog, geometry.inner_height(), true).unwrap();

        let pages = materialize_plan(&plan, &catalog, &geometry, &never()).unwrap();
        assert_eq!(pages.len(), plan.page_count());
        assert_eq!(pages[0].offset_px, 0.0);
        assert_eq!(pages[1].offset_px, geometry.page_height());
        let fragments: usize = pages
            .iter()
            .flat_map(|p| p.slices.iter())
            .filter(|s| s.block_id.0 == "exp")
            .map(|s| s.to - s.from)
            .sum();
        assert_eq!(fragments, 3);
    }

    #[test]
    fn test_cancelled_materialization_is_discarded() {
        let catalog = FlowCatalog::new(vec![
            fixed_block("a", 900.0),
            fixed_block("b", 900.0),
            fixed_block("c", 900.0),
        ])
        .unwrap();
        let geometry = default_geometry();
        let plan = paginate(catalog.blocks(), &catalog, geometry.inner_height(), false).unwrap();
        assert_eq!(plan.page_count(), 3);

        let cancel = CancelAfter(Cell::new(1));
        assert!(materialize_plan(&plan, &catalog, &geometry, &cancel).is_none());
    }
}
