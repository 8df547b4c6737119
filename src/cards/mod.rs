//! Card sets: the content narrated by listening mode.
//!
//! * [`Card`] / [`CardSet`]: word/example pairs and their named collection.
//! * [`ContentProvider`]: async trait implemented by all card sources.
//! * [`HttpContentProvider`]: the flashcard app's `/api/cards/<name>` endpoint.
//! * [`FileContentProvider`]: local `<name>.json` files.

pub mod model;
pub mod provider;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use model::{Card, CardSet};
pub use provider::{ContentError, ContentProvider, FileContentProvider, HttpContentProvider};
