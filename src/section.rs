//! Node/tag section state machine over a markup cursor

use crate::cursor::{CursorError, EventCursor, MarkupEvent};
use crate::record::{MalformedRecord, NODE, NodeRecord, TAG, TagPair};

/// Errors that abort a pass over the source
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Malformed(#[from] MalformedRecord),
}

/// Where the cursor currently sits relative to `node` sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SectionState {
    #[default]
    Outside,
    /// Inside an open node
    ///
    /// `nested` counts illegal `node` starts seen inside the open one. They
    /// are not extracted; their tags keep being attributed to the outermost
    /// node until its own end marker.
    InsideNode { nested: usize },
}

/// Something meaningful found in the stream
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Node(NodeRecord),
    /// A tag belonging to the most recently emitted node
    Tag(TagPair),
}

/// Classifies a flat event stream into node and tag sections
///
/// Forward-only: each call pulls events until the next section is found.
pub struct SectionReader<C> {
    cursor: C,
    state: SectionState,
}

impl<C: EventCursor> SectionReader<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            state: SectionState::Outside,
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Next node or in-node tag, or `None` at end of stream
    pub fn next_section(&mut self) -> Result<Option<Section>, SectionError> {
        self.advance(true)
    }

    /// Next node only
    ///
    /// Tag sections are still tracked for state, but never extracted.
    pub fn next_node(&mut self) -> Result<Option<NodeRecord>, SectionError> {
        while let Some(section) = self.advance(false)? {
            if let Section::Node(node) = section {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn advance(&mut self, tags: bool) -> Result<Option<Section>, SectionError> {
        use SectionState::*;

        while let Some(event) = self.cursor.next_event()? {
            match (self.state, event) {
                (Outside, MarkupEvent::Start(el)) if el.name == NODE => {
                    let node = NodeRecord::from_element(&el)?;
                    log::trace!("entering node {}", node.id);
                    self.state = InsideNode { nested: 0 };
                    return Ok(Some(Section::Node(node)));
                }
                (InsideNode { nested }, MarkupEvent::Start(el)) if el.name == NODE => {
                    log::trace!("node start inside an open node, not extracted");
                    self.state = InsideNode { nested: nested + 1 };
                }
                (InsideNode { .. }, MarkupEvent::Start(el)) if tags && el.name == TAG => {
                    return Ok(Some(Section::Tag(TagPair::from_element(&el)?)));
                }
                (InsideNode { nested: 0 }, MarkupEvent::End { name }) if name == NODE => {
                    log::trace!("leaving node");
                    self.state = Outside;
                }
                (InsideNode { nested }, MarkupEvent::End { name }) if name == NODE => {
                    self.state = InsideNode { nested: nested - 1 };
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cursor::Element;

    fn node(id: &str, user: &str) -> MarkupEvent {
        MarkupEvent::Start(
            Element::new("node")
                .with("id", id)
                .with("lat", "1.5")
                .with("lon", "2.5")
                .with("user", user)
                .with("timestamp", "2020-01-01T00:00:00Z")
                .with("version", "1")
                .with("changeset", "9"),
        )
    }

    fn tag(k: &str) -> MarkupEvent {
        MarkupEvent::Start(Element::new("tag").with("k", k).with("v", "x"))
    }

    fn end(name: &str) -> MarkupEvent {
        MarkupEvent::End { name: name.into() }
    }

    fn collect(events: Vec<MarkupEvent>) -> Vec<Section> {
        let mut reader = SectionReader::new(events.into_iter());
        let mut out = vec![];
        while let Some(s) = reader.next_section().unwrap() {
            out.push(s);
        }
        out
    }

    fn keys(sections: &[Section]) -> Vec<String> {
        sections
            .iter()
            .map(|s| match s {
                Section::Node(n) => format!("node:{}", n.id),
                Section::Tag(t) => format!("tag:{}", t.key),
            })
            .collect()
    }

    #[test]
    fn test_tags_attributed_inside_nodes() {
        let sections = collect(vec![
            node("1", "a"),
            tag("highway"),
            end("tag"),
            end("node"),
            node("2", "a"),
            end("node"),
        ]);
        assert_eq!(keys(&sections), vec!["node:1", "tag:highway", "node:2"]);
    }

    #[test]
    fn test_tags_outside_nodes_ignored() {
        let sections = collect(vec![
            MarkupEvent::Start(Element::new("osm")),
            tag("orphan"),
            end("tag"),
            node("1", "a"),
            end("node"),
            MarkupEvent::Start(Element::new("way")),
            tag("building"),
            end("tag"),
            end("way"),
            end("osm"),
        ]);
        assert_eq!(keys(&sections), vec!["node:1"]);
    }

    #[test]
    fn test_nested_node_keeps_outer_open() {
        let events = vec![
            node("1", "a"),
            node("2", "b"),
            tag("inner"),
            end("tag"),
            end("node"),
            tag("after"),
            end("tag"),
            end("node"),
            tag("outside"),
            end("tag"),
        ];
        let mut reader = SectionReader::new(events.into_iter());
        let mut out = vec![];
        while let Some(s) = reader.next_section().unwrap() {
            out.push(s);
        }
        assert_eq!(keys(&out), vec!["node:1", "tag:inner", "tag:after"]);
        assert_eq!(reader.state(), SectionState::Outside);
    }

    #[test]
    fn test_next_node_skips_tags() {
        let mut reader = SectionReader::new(
            vec![
                node("1", "a"),
                MarkupEvent::Start(Element::new("tag")), // malformed, but never extracted
                end("tag"),
                end("node"),
                node("2", "b"),
            ]
            .into_iter(),
        );
        assert_eq!(reader.next_node().unwrap().map(|n| n.id), Some(1));
        assert_eq!(reader.next_node().unwrap().map(|n| n.id), Some(2));
        assert_eq!(reader.state(), SectionState::InsideNode { nested: 0 });
        assert!(reader.next_node().unwrap().is_none());
    }

    #[test]
    fn test_malformed_tag_in_node_fails() {
        let mut reader = SectionReader::new(
            vec![node("1", "a"), MarkupEvent::Start(Element::new("tag").with("k", "a"))]
                .into_iter(),
        );
        assert!(matches!(reader.next_section(), Ok(Some(Section::Node(_)))));
        assert!(matches!(
            reader.next_section(),
            Err(SectionError::Malformed(MalformedRecord { attribute: "v", .. }))
        ));
    }
}
