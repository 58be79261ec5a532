//! Forward-only markup event cursor
//!
//! The cursor never builds a document tree: each pull decodes exactly one
//! element boundary from the underlying reader and hands back an owned event.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Errors from decoding the markup stream
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("Failed to open the input: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode markup: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Failed to decode an attribute: {0}")]
    Attr(#[from] AttrError),
    #[error("Markup name or attribute was not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// An opened element with its attributes in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: vec![],
        }
    }

    /// Builder-style attribute append, mostly handy for tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Look an attribute up by name, returning its position and value
    pub fn attribute(&self, key: &str) -> Option<(usize, &str)> {
        self.attributes
            .iter()
            .position(|(k, _)| k == key)
            .map(|i| (i, self.attributes[i].1.as_str()))
    }

    pub fn attribute_at(&self, position: usize) -> Option<&str> {
        self.attributes.get(position).map(|(_, v)| v.as_str())
    }
}

/// One element boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Start(Element),
    End { name: String },
}

impl MarkupEvent {
    pub fn name(&self) -> &str {
        match self {
            MarkupEvent::Start(el) => &el.name,
            MarkupEvent::End { name } => name,
        }
    }
}

/// Pull-based source of markup events
///
/// `Ok(None)` means the stream is exhausted; there is no way back.
pub trait EventCursor {
    fn next_event(&mut self) -> Result<Option<MarkupEvent>, CursorError>;
}

impl<C: EventCursor + ?Sized> EventCursor for &mut C {
    fn next_event(&mut self) -> Result<Option<MarkupEvent>, CursorError> {
        (**self).next_event()
    }
}

/// Pre-recorded events, for driving the section machine without any markup
impl EventCursor for std::vec::IntoIter<MarkupEvent> {
    fn next_event(&mut self) -> Result<Option<MarkupEvent>, CursorError> {
        Ok(self.next())
    }
}

/// Event cursor over any buffered reader of XML bytes
///
/// Self-closing elements are expanded, so `<tag k="a" v="b"/>` shows up as a
/// `Start` immediately followed by an `End`. Text, comments, declarations and
/// processing instructions are skipped.
pub struct XmlCursor<R: BufRead> {
    reader: quick_xml::Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = quick_xml::Reader::from_reader(inner);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(1024),
        }
    }

    fn element(start: &BytesStart<'_>) -> Result<Element, CursorError> {
        let name = std::str::from_utf8(start.local_name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.local_name().as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element { name, attributes })
    }
}

impl<R: BufRead> EventCursor for XmlCursor<R> {
    fn next_event(&mut self) -> Result<Option<MarkupEvent>, CursorError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    return Ok(Some(MarkupEvent::Start(Self::element(&start)?)));
                }
                Event::End(end) => {
                    let name = std::str::from_utf8(end.local_name().as_ref())?.to_string();
                    return Ok(Some(MarkupEvent::End { name }));
                }
                Event::Eof => return Ok(None),
                _ => continue,
            }
        }
    }
}

/// Open a file-backed cursor
///
/// The cursor owns the file handle: dropping it, on any path out of a pass,
/// closes the file.
pub fn open_file(path: impl AsRef<Path>) -> Result<XmlCursor<BufReader<File>>, CursorError> {
    let path = path.as_ref();
    log::debug!("opening {}", path.display());
    let file = File::open(path)?;
    Ok(XmlCursor::new(BufReader::new(file)))
}
