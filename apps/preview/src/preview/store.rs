//! Preview Store — last-write-wins scheduling of pagination passes per document.
//!
//! # Generations
//! Every content or geometry change starts a new pass via `begin`, which bumps the
//! document's generation counter and hands back a `PassTicket`. A ticket is cancelled as
//! soon as a newer generation exists: the pass stops at its next check (after the settle
//! delay, between materialized pages, at commit) and its output is discarded. Stale passes
//! are never queued.
//!
//! # spawn_blocking pattern
//! Pagination and materialization are CPU-bound and synchronous. They run inside
//! `tokio::task::spawn_blocking` with owned inputs, so the executor is never blocked.
//! Commit happens under the store lock and re-checks the generation, so a stale plan can
//! never overwrite a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{
    materialize_plan, paginate, CancelToken, FlowCatalog, MaterializedPage, PageGeometry,
};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Committed preview state of one document. Replaced only by a completed, current pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewState {
    pub document_id: Uuid,
    pub generation: u64,
    pub geometry: PageGeometry,
    pub page_count: usize,
    pub page_height: f64,
    /// Top offset of each page in the scrolled preview.
    pub page_offsets: Vec<f64>,
    pub current_page: usize,
    pub scroll_ratio: f64,
    pub committed_at: DateTime<Utc>,
}

/// Inputs of one pass. Owned so it can move into `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct PassInput {
    pub catalog: FlowCatalog,
    pub geometry: PageGeometry,
    pub allow_widow_orphans: bool,
}

/// Output of a pass that completed and was committed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPass {
    pub state: PreviewState,
    pub total_height: f64,
    pub pages: Vec<MaterializedPage>,
}

/// Handle on one pass; cancelled once a newer pass for the same document begins.
#[derive(Debug, Clone)]
pub struct PassTicket {
    pub document_id: Uuid,
    pub generation: u64,
    latest: Arc<AtomicU64>,
}

impl PassTicket {
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    fn ensure_current(&self) -> Result<(), AppError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(self.superseded())
        }
    }

    fn superseded(&self) -> AppError {
        AppError::Superseded {
            generation: self.generation,
            latest: self.latest.load(Ordering::SeqCst),
        }
    }
}

impl CancelToken for PassTicket {
    fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}

#[derive(Default)]
struct DocumentSlot {
    generation: Arc<AtomicU64>,
    committed: Option<PreviewState>,
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

pub struct PreviewStore {
    documents: Mutex<HashMap<Uuid, DocumentSlot>>,
    settle_delay: Duration,
}

impl PreviewStore {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            settle_delay,
        }
    }

    fn slots(&self) -> Result<MutexGuard<'_, HashMap<Uuid, DocumentSlot>>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("preview store lock poisoned")))
    }

    /// Starts a new pass for `document_id`, superseding any pass still in flight.
    pub fn begin(&self, document_id: Uuid) -> Result<PassTicket, AppError> {
        let mut slots = self.slots()?;
        let slot = slots.entry(document_id).or_default();
        let generation = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%document_id, generation, "Preview pass started");
        Ok(PassTicket {
            document_id,
            generation,
            latest: Arc::clone(&slot.generation),
        })
    }

    /// Runs a pass to completion: settle delay, pagination, materialization, commit.
    ///
    /// Returns `AppError::Superseded` if a newer pass began at any point before commit.
    pub async fn run_pass(
        &self,
        ticket: PassTicket,
        input: PassInput,
    ) -> Result<CompletedPass, AppError> {
        input.geometry.validate()?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        ticket.ensure_current()?;

        let geometry = input.geometry;
        let block_count = input.catalog.len();
        let token = ticket.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let PassInput {
                catalog,
                geometry,
                allow_widow_orphans,
            } = input;
            let plan = paginate(
                catalog.blocks(),
                &catalog,
                geometry.inner_height(),
                allow_widow_orphans,
            )?;
            let pages = materialize_plan(&plan, &catalog, &geometry, &token);
            Ok::<_, crate::layout::ConfigurationError>(pages.map(|pages| (plan.total_height, pages)))
        })
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("spawn_blocking failed in preview pass: {e}"))
        })??;

        let Some((total_height, pages)) = outcome else {
            return Err(ticket.superseded());
        };

        let state = self.commit(&ticket, geometry, pages.len())?;
        info!(
            document_id = %ticket.document_id,
            generation = ticket.generation,
            blocks = block_count,
            pages = state.page_count,
            "Preview pass committed"
        );
        Ok(CompletedPass {
            state,
            total_height,
            pages,
        })
    }

    /// Commits a finished pass if its ticket is still current.
    ///
    /// The reader's scroll ratio carries over; the current page is clamped to the new count.
    pub fn commit(
        &self,
        ticket: &PassTicket,
        geometry: PageGeometry,
        page_count: usize,
    ) -> Result<PreviewState, AppError> {
        let mut slots = self.slots()?;
        // A slot recreated after `remove` has a fresh counter; tickets of the old one never match.
        let slot = slots
            .get_mut(&ticket.document_id)
            .filter(|slot| Arc::ptr_eq(&slot.generation, &ticket.latest))
            .ok_or_else(|| ticket.superseded())?;
        if slot.generation.load(Ordering::SeqCst) != ticket.generation {
            return Err(ticket.superseded());
        }

        let (current_page, scroll_ratio) = slot
            .committed
            .as_ref()
            .map(|prev| (prev.current_page, prev.scroll_ratio))
            .unwrap_or((0, 0.0));

        let state = PreviewState {
            document_id: ticket.document_id,
            generation: ticket.generation,
            geometry,
            page_count,
            page_height: geometry.page_height(),
            page_offsets: geometry.page_offsets(page_count),
            current_page: current_page.min(page_count.saturating_sub(1)),
            scroll_ratio,
            committed_at: Utc::now(),
        };
        slot.committed = Some(state.clone());
        Ok(state)
    }

    /// Last committed state of a document.
    pub fn state(&self, document_id: Uuid) -> Result<Option<PreviewState>, AppError> {
        let slots = self.slots()?;
        Ok(slots.get(&document_id).and_then(|s| s.committed.clone()))
    }

    /// Drops a document's preview state and cancels any pass still running for it.
    /// Returns `false` if the store held nothing for the document.
    pub fn remove(&self, document_id: Uuid) -> Result<bool, AppError> {
        let mut slots = self.slots()?;
        let Some(slot) = slots.remove(&document_id) else {
            return Ok(false);
        };
        slot.generation.fetch_add(1, Ordering::SeqCst);
        debug!(%document_id, "Preview state removed");
        Ok(true)
    }

    /// Scroll synchronisation: recomputes current page and scroll ratio from a scroll offset.
    pub fn update_scroll(
        &self,
        document_id: Uuid,
        scroll_top: f64,
    ) -> Result<PreviewState, AppError> {
        if !scroll_top.is_finite() {
            return Err(AppError::Validation(format!(
                "scrollTop must be finite, got {scroll_top}"
            )));
        }
        let mut slots = self.slots()?;
        let state = slots
            .get_mut(&document_id)
            .and_then(|s| s.committed.as_mut())
            .ok_or_else(|| AppError::NotFound(format!("No preview for document {document_id}")))?;

        state.current_page = state.geometry.page_index_at(scroll_top, state.page_count);
        state.scroll_ratio = state.geometry.scroll_ratio(scroll_top, state.page_count);
        Ok(state.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::catalog::tests::{bullet_block, fixed_block};
    use crate::layout::{default_geometry, PageFormat};

    const SETTLE: Duration = Duration::from_millis(150);

    /// `pages` fixed blocks each filling most of a default page.
    fn input_with_pages(pages: usize) -> PassInput {
        let blocks = (0..pages)
            .map(|i| fixed_block(&format!("block-{i}"), 900.0))
            .collect();
        PassInput {
            catalog: FlowCatalog::new(blocks).unwrap(),
            geometry: default_geometry(),
            allow_widow_orphans: false,
        }
    }

    #[tokio::test]
    async fn test_pass_commits_state() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();

        let ticket = store.begin(doc).unwrap();
        let done = store.run_pass(ticket, input_with_pages(3)).await.unwrap();

        assert_eq!(done.state.page_count, 3);
        assert_eq!(done.pages.len(), 3);
        assert_eq!(done.state.page_offsets, vec![0.0, 1123.0, 2246.0]);
        assert_eq!(store.state(doc).unwrap(), Some(done.state));
    }

    #[tokio::test]
    async fn test_split_blocks_are_materialized() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();
        let input = PassInput {
            catalog: FlowCatalog::new(vec![
                fixed_block("header", 700.0),
                bullet_block("exp", &[200.0, 200.0, 200.0]),
            ])
            .unwrap(),
            geometry: default_geometry(),
            allow_widow_orphans: true,
        };

        let done = store.run_pass(store.begin(doc).unwrap(), input).await.unwrap();
        assert_eq!(done.state.page_count, 2);
        assert_eq!(done.pages[0].slices.len(), 2);
        assert_eq!((done.pages[0].slices[1].from, done.pages[0].slices[1].to), (0, 1));
        assert!((done.total_height - 1300.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_older_ticket_is_superseded() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();

        let stale = store.begin(doc).unwrap();
        let fresh = store.begin(doc).unwrap();
        assert!(!stale.is_current());

        let err = store.run_pass(stale, input_with_pages(2)).await.unwrap_err();
        assert!(matches!(err, AppError::Superseded { generation: 1, latest: 2 }));
        assert_eq!(store.state(doc).unwrap(), None);

        let done = store.run_pass(fresh, input_with_pages(1)).await.unwrap();
        assert_eq!(done.state.generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_during_settle_delay_cancels_pending_pass() {
        let store = PreviewStore::new(SETTLE);
        let doc = Uuid::new_v4();

        let first = store.begin(doc).unwrap();
        let (first_result, second_result) = tokio::join!(
            store.run_pass(first, input_with_pages(4)),
            async {
                tokio::time::sleep(SETTLE / 2).await;
                let second = store.begin(doc).unwrap();
                store.run_pass(second, input_with_pages(2)).await
            }
        );

        assert!(matches!(first_result, Err(AppError::Superseded { .. })));
        let state = second_result.unwrap().state;
        assert_eq!(state.page_count, 2);
        assert_eq!(store.state(doc).unwrap().map(|s| s.generation), Some(2));
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();

        let stale = store.begin(doc).unwrap();
        let _fresh = store.begin(doc).unwrap();
        let err = store.commit(&stale, default_geometry(), 5).unwrap_err();
        assert!(matches!(err, AppError::Superseded { .. }));
    }

    #[tokio::test]
    async fn test_documents_do_not_supersede_each_other() {
        let store = PreviewStore::new(Duration::ZERO);
        let a = store.begin(Uuid::new_v4()).unwrap();
        let _b = store.begin(Uuid::new_v4()).unwrap();
        assert!(a.is_current());
        assert!(store.run_pass(a, input_with_pages(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_scroll_sync_and_clamp_on_recommit() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();
        store
            .run_pass(store.begin(doc).unwrap(), input_with_pages(3))
            .await
            .unwrap();

        let scrolled = store.update_scroll(doc, 2300.0).unwrap();
        assert_eq!(scrolled.current_page, 2);
        assert!((scrolled.scroll_ratio - 2300.0 / 3369.0).abs() < 1e-9);

        // Content shrank to one page: current page clamps, scroll ratio carries over.
        let done = store
            .run_pass(store.begin(doc).unwrap(), input_with_pages(1))
            .await
            .unwrap();
        assert_eq!(done.state.current_page, 0);
        assert!((done.state.scroll_ratio - scrolled.scroll_ratio).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remove_drops_state_and_cancels_running_pass() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();
        store
            .run_pass(store.begin(doc).unwrap(), input_with_pages(2))
            .await
            .unwrap();

        let in_flight = store.begin(doc).unwrap();
        assert!(store.remove(doc).unwrap());
        assert!(!in_flight.is_current());
        assert_eq!(store.state(doc).unwrap(), None);
        assert!(!store.remove(doc).unwrap());

        let err = store.run_pass(in_flight, input_with_pages(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Superseded { .. }));
        assert_eq!(store.state(doc).unwrap(), None);
    }

    #[tokio::test]
    async fn test_ticket_from_removed_document_cannot_commit_into_new_one() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();

        let old = store.begin(doc).unwrap();
        store.remove(doc).unwrap();
        let new = store.begin(doc).unwrap();
        assert_eq!(old.generation, new.generation);

        let err = store.commit(&old, default_geometry(), 7).unwrap_err();
        assert!(matches!(err, AppError::Superseded { .. }));
        let done = store.run_pass(new, input_with_pages(1)).await.unwrap();
        assert_eq!(done.state.page_count, 1);
    }

    #[tokio::test]
    async fn test_scroll_without_preview_is_not_found() {
        let store = PreviewStore::new(Duration::ZERO);
        let err = store.update_scroll(Uuid::new_v4(), 10.0).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_geometry_fails_before_pagination() {
        let store = PreviewStore::new(Duration::ZERO);
        let doc = Uuid::new_v4();
        let mut input = input_with_pages(1);
        input.geometry = PageGeometry {
            format: PageFormat::Letter,
            margin_px: 600.0,
        };

        let err = store.run_pass(store.begin(doc).unwrap(), input).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
