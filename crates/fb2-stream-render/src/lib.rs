//! Line breaking and resumable pagination for `fb2-stream` books.
//!
//! A [`Paginator`] walks a [`Book`](fb2_stream::Book)'s flat event stream and
//! produces one [`RenderPage`] of [`DrawItem`]s per call, remembering a
//! [`ReadingInfo`] cursor so the next page resumes exactly where the last one
//! stopped, mid-paragraph included.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod render_engine;
mod render_ir;
mod render_layout;
mod render_page;
mod render_style;

pub use render_engine::{LayoutParams, PaginateError, Pages, Paginator};
pub use render_ir::{DrawItem, PageDiagnostics, ReadingInfo, RenderPage, TextStyle};
pub use render_layout::{FixedWidthMeasurer, LayoutError, LineBreaker, TextMeasurer, Wrap};
pub use render_page::PageAggregator;
pub use render_style::{StyleTracker, DEFAULT_TITLE_SIZE_DELTA};
