//! Loaded, flattened books.

use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Fb2Error;
use crate::flatten::{flatten_nodes, Flattened};
use crate::markup::{FlatEvent, Node, NodeKind, TagPhase};
use crate::parser::parse_document;

/// Diagnostics captured while loading one book.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadInfo {
    /// Unsupported element names in first-seen order.
    pub ignored_names: Vec<String>,
    /// Wall time spent parsing and flattening.
    pub parse_duration: Duration,
}

impl fmt::Display for LoadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time: {:?}", self.parse_duration)?;
        write_ignored(f, &self.ignored_names)
    }
}

/// Shared report tail: "Ignored tags:" with one indented name per line.
pub fn write_ignored(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    if names.is_empty() {
        return writeln!(f, "No ignored tags");
    }
    writeln!(f, "Ignored tags:")?;
    for name in names {
        writeln!(f, "    {}", name)?;
    }
    Ok(())
}

/// Immutable flattened event sequence plus load diagnostics.
///
/// Cloning is cheap: the events are shared.
#[derive(Clone, Debug)]
pub struct Book {
    events: Arc<[FlatEvent]>,
    load_info: LoadInfo,
}

impl Book {
    /// Build a book from already-flattened events.
    ///
    /// Everything before the first `<body>` is discarded. Without a body the
    /// book is empty.
    pub fn from_flattened(flattened: Flattened) -> Self {
        let Flattened { events, ignored } = flattened;
        let start = events
            .iter()
            .position(|event| event.is_tag(NodeKind::Body, TagPhase::Open))
            .unwrap_or(events.len());
        let events: Arc<[FlatEvent]> = if start == 0 {
            events.into()
        } else {
            events[start..].into()
        };
        Self {
            events,
            load_info: LoadInfo {
                ignored_names: ignored,
                parse_duration: Duration::ZERO,
            },
        }
    }

    /// Flatten a parsed forest into a book.
    pub fn from_nodes(nodes: &[Node]) -> Self {
        Self::from_flattened(flatten_nodes(nodes))
    }

    /// Book with no events.
    pub fn empty() -> Self {
        Self::from_flattened(Flattened::default())
    }

    fn with_parse_duration(mut self, elapsed: Duration) -> Self {
        self.load_info.parse_duration = elapsed;
        self
    }

    pub fn events(&self) -> &[FlatEvent] {
        &self.events
    }

    /// Shared handle to the event storage.
    pub fn events_shared(&self) -> Arc<[FlatEvent]> {
        Arc::clone(&self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn load_info(&self) -> &LoadInfo {
        &self.load_info
    }

    /// Concatenated text of every text event.
    pub fn plain_text(&self) -> String {
        self.events.iter().filter_map(FlatEvent::as_text).collect()
    }
}

/// Parse and flatten an FB2 document.
pub fn parse_book(xml: &str) -> Result<Book, Fb2Error> {
    parse_book_bytes(xml.as_bytes())
}

/// Parse and flatten an FB2 document from raw bytes.
pub fn parse_book_bytes(bytes: &[u8]) -> Result<Book, Fb2Error> {
    let started = Instant::now();
    let nodes = parse_document(bytes)?;
    let book = Book::from_nodes(&nodes);
    let elapsed = started.elapsed();
    if !book.load_info.ignored_names.is_empty() {
        log::warn!(
            "FB2 load ignored {} unsupported element name(s): {}",
            book.load_info.ignored_names.len(),
            book.load_info.ignored_names.join(", ")
        );
    }
    log::debug!(
        "FB2 loaded: events={} bytes={} elapsed={:?}",
        book.len(),
        bytes.len(),
        elapsed
    );
    Ok(book.with_parse_duration(elapsed))
}
