//! FictionBook (FB2) loading for paginated readers.
//!
//! Documents are parsed into a small [`Node`] tree and flattened once into a
//! linear stream of [`FlatEvent`]s held by a [`Book`]. Layout and pagination
//! live in `fb2-stream-render`.
//!
//! ```
//! let book = fb2_stream::parse_book(
//!     "<FictionBook><body><p>Hello <strong>world</strong></p></body></FictionBook>",
//! )
//! .expect("well-formed FB2");
//! assert_eq!(book.plain_text(), "Hello world");
//! ```

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

mod book;
mod error;
mod flatten;
mod markup;
mod parser;

pub use book::{parse_book, parse_book_bytes, write_ignored, Book, LoadInfo};
pub use error::Fb2Error;
pub use flatten::{flatten, flatten_nodes, Flattened};
pub use markup::{FlatEvent, Node, NodeKind, TagPhase};
pub use parser::parse_document;
