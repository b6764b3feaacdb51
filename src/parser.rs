//! FB2 tokenizer and tree builder built on `quick-xml`.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Fb2Error;
use crate::markup::{Node, NodeKind};

const ROOT_ELEMENT: &str = "FictionBook";
const TOKENIZE_ERROR: &str = "FB2_TOKENIZE_ERROR";

struct Frame {
    kind: Option<NodeKind>,
    name: String,
    children: Vec<Node>,
}

impl Frame {
    fn new(kind: Option<NodeKind>, name: String) -> Self {
        Self {
            kind,
            name,
            children: Vec::with_capacity(4),
        }
    }

    fn keeps_blank_text(&self) -> bool {
        self.kind.is_some_and(NodeKind::is_inline_container)
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(prev)) = self.children.last_mut() {
            let text = if prev.ends_with(' ') {
                text.strip_prefix(' ').unwrap_or(text)
            } else {
                text
            };
            prev.push_str(text);
            return;
        }
        self.children.push(Node::Text(text.to_string()));
    }

    fn into_node(self) -> Node {
        match self.kind {
            Some(kind) => Node::container(kind, self.children),
            None => Node::Unknown {
                name: self.name,
                children: self.children,
            },
        }
    }
}

/// Parse an FB2 document and return the children of its `FictionBook` root.
///
/// Unsupported elements are kept as childless [`Node::Unknown`] entries so the
/// flattener can report them; their content is never materialized.
pub fn parse_document(bytes: &[u8]) -> Result<Vec<Node>, Fb2Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(64);
    let mut entity_buf = String::with_capacity(16);
    let mut stack: Vec<Frame> = Vec::with_capacity(8);
    let mut root_seen = false;
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if !root_seen {
                    check_root(&tag)?;
                    root_seen = true;
                    stack.push(Frame::new(None, tag));
                } else if let Some(parent) = stack.last_mut() {
                    match NodeKind::from_element_name(&tag) {
                        Some(NodeKind::EmptyLine) => {
                            parent.children.push(Node::EmptyLine);
                            skip_depth = 1;
                        }
                        Some(kind) => stack.push(Frame::new(Some(kind), tag)),
                        None => {
                            log::trace!("skipping unsupported element <{}>", tag);
                            parent.children.push(Node::Unknown {
                                name: tag,
                                children: Vec::new(),
                            });
                            skip_depth = 1;
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                if skip_depth > 0 {
                    buf.clear();
                    continue;
                }
                if !root_seen {
                    check_root(&tag)?;
                    return Ok(Vec::new());
                }
                if let Some(parent) = stack.last_mut() {
                    let node = match NodeKind::from_element_name(&tag) {
                        Some(kind) => Node::container(kind, Vec::new()),
                        None => Node::Unknown {
                            name: tag,
                            children: Vec::new(),
                        },
                    };
                    parent.children.push(node);
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    buf.clear();
                    continue;
                }
                let Some(frame) = stack.pop() else {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    return Err(Fb2Error::UnbalancedClose {
                        name: tag.into_boxed_str(),
                        offset: reader_token_offset(&reader),
                    });
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(frame.into_node()),
                    None => return Ok(frame.children),
                }
            }
            Ok(Event::Text(e)) => {
                if skip_depth == 0 {
                    let text = e.decode().map_err(|err| {
                        Fb2Error::tokenize(
                            TOKENIZE_ERROR,
                            format!("Decode error: {:?}", err),
                            "text node decode",
                            reader_token_offset(&reader),
                        )
                    })?;
                    push_text(&mut stack, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if skip_depth == 0 {
                    let text = reader.decoder().decode(&e).map_err(|err| {
                        Fb2Error::tokenize(
                            TOKENIZE_ERROR,
                            format!("Decode error: {:?}", err),
                            "cdata decode",
                            reader_token_offset(&reader),
                        )
                    })?;
                    push_text(&mut stack, &text);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if skip_depth == 0 {
                    let entity_name = e.decode().map_err(|err| {
                        Fb2Error::tokenize(
                            TOKENIZE_ERROR,
                            format!("Decode error: {:?}", err),
                            "entity decode",
                            reader_token_offset(&reader),
                        )
                    })?;
                    entity_buf.clear();
                    entity_buf.push('&');
                    entity_buf.push_str(entity_name.as_ref());
                    entity_buf.push(';');
                    let resolved = quick_xml::escape::unescape(&entity_buf).map_err(|err| {
                        Fb2Error::tokenize(
                            TOKENIZE_ERROR,
                            format!("Unescape error: {:?}", err),
                            "entity unescape",
                            reader_token_offset(&reader),
                        )
                    })?;
                    push_text(&mut stack, &resolved);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(Fb2Error::tokenize(
                    TOKENIZE_ERROR,
                    format!("XML error: {:?}", err),
                    "xml tokenizer",
                    reader_token_offset(&reader),
                ));
            }
        }
        buf.clear();
    }

    if !root_seen {
        return Err(Fb2Error::MissingRoot);
    }
    log::warn!(
        "FB2 input ended with {} unclosed element(s); closing implicitly",
        stack.len()
    );
    let mut children = Vec::new();
    while let Some(frame) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(frame.into_node()),
            None => children = frame.children,
        }
    }
    Ok(children)
}

fn check_root(tag: &str) -> Result<(), Fb2Error> {
    if tag.eq_ignore_ascii_case(ROOT_ELEMENT) {
        Ok(())
    } else {
        Err(Fb2Error::RootMismatch {
            found: tag.into(),
        })
    }
}

fn push_text(stack: &mut [Frame], raw: &str) {
    // Text outside the root element carries no content.
    let Some(frame) = stack.last_mut() else {
        return;
    };
    let collapsed = collapse_whitespace(raw);
    if collapsed.is_empty() || (collapsed == " " && !frame.keeps_blank_text()) {
        return;
    }
    frame.push_text(&collapsed);
}

/// Collapse ASCII whitespace runs to a single space, keeping edge spaces.
fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, Fb2Error> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        Fb2Error::tokenize(
            TOKENIZE_ERROR,
            format!("Decode error: {:?}", err),
            "tag name decode",
            reader_token_offset(reader),
        )
    })?;
    // Case is kept for diagnostics; kind lookup ignores it.
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Vec<Node> {
        parse_document(xml.as_bytes()).expect("parse should succeed")
    }

    #[test]
    fn rejects_non_fictionbook_root() {
        let err = parse_document(b"<html><body/></html>").expect_err("root mismatch");
        assert_eq!(
            err,
            Fb2Error::RootMismatch {
                found: "html".into()
            }
        );
    }

    #[test]
    fn rejects_document_without_elements() {
        let err = parse_document(b"<?xml version=\"1.0\"?>").expect_err("no root");
        assert_eq!(err, Fb2Error::MissingRoot);
    }

    #[test]
    fn namespaced_root_is_accepted() {
        let nodes = parse(
            r#"<fb:FictionBook xmlns:fb="http://www.gribuser.ru/xml/fictionbook/2.0"><fb:body><fb:p>x</fb:p></fb:body></fb:FictionBook>"#,
        );
        assert_eq!(
            nodes,
            vec![Node::Body(vec![Node::Paragraph(vec![Node::text("x")])])]
        );
    }

    #[test]
    fn unknown_elements_become_childless_placeholders() {
        let nodes = parse(
            "<FictionBook><description><title-info><p>meta</p></title-info></description>\
             <body><p>a<image/>b</p></body><binary id=\"x\">AAAA</binary></FictionBook>",
        );
        assert_eq!(
            nodes,
            vec![
                Node::Unknown {
                    name: "description".to_string(),
                    children: vec![]
                },
                Node::Body(vec![Node::Paragraph(vec![
                    Node::text("a"),
                    Node::Unknown {
                        name: "image".to_string(),
                        children: vec![]
                    },
                    Node::text("b"),
                ])]),
                Node::Unknown {
                    name: "binary".to_string(),
                    children: vec![]
                },
            ]
        );
    }

    #[test]
    fn element_names_match_case_insensitively_and_keep_case() {
        let nodes = parse("<fictionbook><Body><P>x<Image/></P></Body></fictionbook>");
        assert_eq!(
            nodes,
            vec![Node::Body(vec![Node::Paragraph(vec![
                Node::text("x"),
                Node::Unknown {
                    name: "Image".to_string(),
                    children: vec![]
                },
            ])])]
        );
    }

    #[test]
    fn whitespace_collapses_and_blank_text_survives_only_inline() {
        let nodes = parse(
            "<FictionBook>\n  <body>\n    <p>one\n   two <strong>b</strong> <emphasis>i</emphasis></p>\n  </body>\n</FictionBook>",
        );
        assert_eq!(
            nodes,
            vec![Node::Body(vec![Node::Paragraph(vec![
                Node::text("one two "),
                Node::Strong(vec![Node::text("b")]),
                Node::text(" "),
                Node::Emphasis(vec![Node::text("i")]),
            ])])]
        );
    }

    #[test]
    fn entities_merge_into_surrounding_text() {
        let nodes = parse("<FictionBook><body><p>a &amp; b&#33;</p></body></FictionBook>");
        assert_eq!(
            nodes,
            vec![Node::Body(vec![Node::Paragraph(vec![Node::text("a & b!")])])]
        );
    }

    #[test]
    fn empty_line_and_self_closing_containers() {
        let nodes =
            parse("<FictionBook><body><empty-line/><p/><empty-line></empty-line></body></FictionBook>");
        assert_eq!(
            nodes,
            vec![Node::Body(vec![
                Node::EmptyLine,
                Node::Paragraph(vec![]),
                Node::EmptyLine,
            ])]
        );
    }

    #[test]
    fn unclosed_elements_close_at_eof() {
        let nodes = parse("<FictionBook><body><p>tail");
        assert_eq!(
            nodes,
            vec![Node::Body(vec![Node::Paragraph(vec![Node::text("tail")])])]
        );
    }

    #[test]
    fn collapse_keeps_edge_spaces() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), " a b ");
        assert_eq!(collapse_whitespace("\n\n"), " ");
        assert_eq!(collapse_whitespace("a\u{a0}b"), "a\u{a0}b");
    }
}
