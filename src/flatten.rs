//! Tree to flat event stream conversion.

use crate::markup::{FlatEvent, Node, NodeKind};

/// Flattened event stream plus the names of dropped elements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Flattened {
    /// Events in document order.
    pub events: Vec<FlatEvent>,
    /// Unsupported element names, once each, in first-seen order.
    pub ignored: Vec<String>,
}

impl Flattened {
    fn record_ignored(&mut self, name: &str) {
        if !self.ignored.iter().any(|seen| seen == name) {
            self.ignored.push(name.to_string());
        }
    }
}

enum Step<'a> {
    Enter(&'a Node),
    Exit(NodeKind),
}

/// Flatten a single tree, including `root` itself.
pub fn flatten(root: &Node) -> Flattened {
    flatten_nodes(core::slice::from_ref(root))
}

/// Flatten a sequence of sibling trees in order.
///
/// Unknown elements are skipped together with their whole subtree.
pub fn flatten_nodes(nodes: &[Node]) -> Flattened {
    let mut out = Flattened::default();
    // Explicit work stack so deeply nested input cannot exhaust the call stack.
    let mut work: Vec<Step<'_>> = nodes.iter().rev().map(Step::Enter).collect();

    while let Some(step) = work.pop() {
        match step {
            Step::Exit(kind) => out.events.push(FlatEvent::close(kind)),
            Step::Enter(Node::Text(value)) => out.events.push(FlatEvent::Text(value.clone())),
            Step::Enter(Node::EmptyLine) => {
                out.events.push(FlatEvent::self_close(NodeKind::EmptyLine))
            }
            Step::Enter(Node::Unknown { name, .. }) => out.record_ignored(name),
            Step::Enter(node) => {
                let Some(kind) = node.kind() else {
                    continue;
                };
                out.events.push(FlatEvent::open(kind));
                work.push(Step::Exit(kind));
                work.extend(node.children().iter().rev().map(Step::Enter));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::TagPhase;

    fn unknown(name: &str, children: Vec<Node>) -> Node {
        Node::Unknown {
            name: name.to_string(),
            children,
        }
    }

    #[test]
    fn containers_emit_open_children_close() {
        let tree = Node::Body(vec![Node::Paragraph(vec![
            Node::text("a "),
            Node::Strong(vec![Node::text("b")]),
        ])]);
        let flat = flatten(&tree);
        assert_eq!(
            flat.events,
            vec![
                FlatEvent::open(NodeKind::Body),
                FlatEvent::open(NodeKind::Paragraph),
                FlatEvent::Text("a ".to_string()),
                FlatEvent::open(NodeKind::Strong),
                FlatEvent::Text("b".to_string()),
                FlatEvent::close(NodeKind::Strong),
                FlatEvent::close(NodeKind::Paragraph),
                FlatEvent::close(NodeKind::Body),
            ]
        );
        assert!(flat.ignored.is_empty());
    }

    #[test]
    fn empty_line_is_single_self_close() {
        let flat = flatten(&Node::Section(vec![Node::EmptyLine]));
        assert_eq!(flat.events.len(), 3);
        assert!(flat.events[1].is_tag(NodeKind::EmptyLine, TagPhase::SelfClose));
    }

    #[test]
    fn unknown_subtree_is_dropped_and_named_once() {
        let tree = Node::Body(vec![
            unknown("image", vec![]),
            unknown("epigraph", vec![Node::Paragraph(vec![Node::text("hidden")])]),
            Node::Paragraph(vec![Node::text("shown")]),
            unknown("image", vec![]),
        ]);
        let flat = flatten(&tree);
        assert_eq!(flat.ignored, vec!["image".to_string(), "epigraph".to_string()]);
        let texts: Vec<_> = flat.events.iter().filter_map(FlatEvent::as_text).collect();
        assert_eq!(texts, vec!["shown"]);
    }

    #[test]
    fn opens_and_closes_stay_balanced() {
        let tree = Node::Body(vec![Node::Section(vec![
            Node::Title(vec![Node::Paragraph(vec![Node::text("t")])]),
            Node::Paragraph(vec![Node::Emphasis(vec![Node::Strong(vec![
                Node::text("x"),
            ])])]),
            Node::EmptyLine,
        ])]);
        let mut stack = Vec::new();
        for event in flatten(&tree).events {
            match event {
                FlatEvent::Tag {
                    kind,
                    phase: TagPhase::Open,
                } => stack.push(kind),
                FlatEvent::Tag {
                    kind,
                    phase: TagPhase::Close,
                } => assert_eq!(stack.pop(), Some(kind)),
                _ => {}
            }
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut node = Node::text("leaf");
        for _ in 0..50_000 {
            node = Node::Emphasis(vec![node]);
        }
        let flat = flatten(&node);
        assert_eq!(flat.events.len(), 100_001);
        // Drop iteratively as well; the derived drop would recurse.
        let mut current = node;
        while let Node::Emphasis(mut children) = current {
            current = children.pop().unwrap_or(Node::EmptyLine);
        }
    }
}
