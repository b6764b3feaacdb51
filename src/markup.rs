//! Markup tree and flat event model.

use core::fmt;

/// Supported FB2 element kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Body,
    Section,
    Title,
    Paragraph,
    Strong,
    Emphasis,
    EmptyLine,
}

impl NodeKind {
    /// Map an FB2 element local name to a supported kind.
    ///
    /// Matching is ASCII case-insensitive. Returns `None` for names the
    /// model does not support.
    pub fn from_element_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "body" => Some(Self::Body),
            "section" => Some(Self::Section),
            "title" => Some(Self::Title),
            "p" => Some(Self::Paragraph),
            "strong" => Some(Self::Strong),
            "emphasis" => Some(Self::Emphasis),
            "empty-line" => Some(Self::EmptyLine),
            _ => None,
        }
    }

    /// Canonical FB2 element name.
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Section => "section",
            Self::Title => "title",
            Self::Paragraph => "p",
            Self::Strong => "strong",
            Self::Emphasis => "emphasis",
            Self::EmptyLine => "empty-line",
        }
    }

    /// Whether nodes of this kind hold children.
    pub fn is_container(self) -> bool {
        !matches!(self, Self::EmptyLine)
    }

    /// Whether whitespace-only text inside this kind is significant.
    pub fn is_inline_container(self) -> bool {
        matches!(self, Self::Paragraph | Self::Strong | Self::Emphasis)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// Parsed markup tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Body(Vec<Node>),
    Section(Vec<Node>),
    Title(Vec<Node>),
    Paragraph(Vec<Node>),
    Strong(Vec<Node>),
    Emphasis(Vec<Node>),
    EmptyLine,
    Text(String),
    /// Element outside the supported set. Dropped during flattening.
    Unknown { name: String, children: Vec<Node> },
}

impl Node {
    /// Build a container node of `kind`.
    ///
    /// `EmptyLine` ignores `children`.
    pub fn container(kind: NodeKind, children: Vec<Node>) -> Self {
        match kind {
            NodeKind::Body => Self::Body(children),
            NodeKind::Section => Self::Section(children),
            NodeKind::Title => Self::Title(children),
            NodeKind::Paragraph => Self::Paragraph(children),
            NodeKind::Strong => Self::Strong(children),
            NodeKind::Emphasis => Self::Emphasis(children),
            NodeKind::EmptyLine => Self::EmptyLine,
        }
    }

    /// Shorthand for a text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Supported kind of this node, `None` for text and unknown elements.
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Self::Body(_) => Some(NodeKind::Body),
            Self::Section(_) => Some(NodeKind::Section),
            Self::Title(_) => Some(NodeKind::Title),
            Self::Paragraph(_) => Some(NodeKind::Paragraph),
            Self::Strong(_) => Some(NodeKind::Strong),
            Self::Emphasis(_) => Some(NodeKind::Emphasis),
            Self::EmptyLine => Some(NodeKind::EmptyLine),
            Self::Text(_) | Self::Unknown { .. } => None,
        }
    }

    /// Children of a container node. Leaves return an empty slice.
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Body(children)
            | Self::Section(children)
            | Self::Title(children)
            | Self::Paragraph(children)
            | Self::Strong(children)
            | Self::Emphasis(children)
            | Self::Unknown { children, .. } => children,
            Self::EmptyLine | Self::Text(_) => &[],
        }
    }
}

/// Open/close phase of a flattened tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagPhase {
    Open,
    Close,
    SelfClose,
}

/// One entry of the flattened event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlatEvent {
    Tag { kind: NodeKind, phase: TagPhase },
    Text(String),
}

impl FlatEvent {
    pub fn open(kind: NodeKind) -> Self {
        Self::Tag {
            kind,
            phase: TagPhase::Open,
        }
    }

    pub fn close(kind: NodeKind) -> Self {
        Self::Tag {
            kind,
            phase: TagPhase::Close,
        }
    }

    pub fn self_close(kind: NodeKind) -> Self {
        Self::Tag {
            kind,
            phase: TagPhase::SelfClose,
        }
    }

    /// Text payload for text events.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Tag { .. } => None,
        }
    }

    /// Whether this event is `kind` in `phase`.
    pub fn is_tag(&self, kind: NodeKind, phase: TagPhase) -> bool {
        matches!(self, Self::Tag { kind: k, phase: p } if *k == kind && *p == phase)
    }
}

impl fmt::Display for FlatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag {
                kind,
                phase: TagPhase::Open,
            } => write!(f, "<{}>", kind),
            Self::Tag {
                kind,
                phase: TagPhase::Close,
            } => write!(f, "</{}>", kind),
            Self::Tag {
                kind,
                phase: TagPhase::SelfClose,
            } => write!(f, "<{}/>", kind),
            Self::Text(text) => f.write_str(text),
        }
    }
}
