// Live preview: last-write-wins pagination passes per document, committed page state,
// and scroll synchronisation.

pub mod handlers;
pub mod store;

pub use store::PreviewStore;
