//! Document tree <-> XML text
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8" standalone="no"?>
//! <xml>
//!   <fileinfo><appname version="1">DA-CryptPad</appname></fileinfo>
//!   <entries>
//!     <entry>                      root wrapper, title/content ignored
//!       <title>Root</title><content type="text"/>
//!       <entry><title>..</title><content type="text">..</content> ..children.. </entry>
//!     </entry>
//!   </entries>
//! </xml>
//! ```
//!
//! Output carries no indentation (shown above for reading only). Input may
//! be indented: whitespace between structural elements is ignored, while
//! text inside `<title>` and `<content>` is kept byte for byte.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use tracing::{debug, warn};

use crate::document::{Document, EntryId};
use crate::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use crate::varmor::PRODUCT_NAME;

/// Markup version written to, and accepted from, `<appname version=..>`.
pub const MARKUP_VERSION: u32 = 1;

/// Title written on the root wrapper entry.
const ROOT_TITLE: &str = "Root";

fn invalid(msg: impl Into<String>) -> CryptpadError {
    CryptpadError::format(ErrorKind::MarkupInvalid, msg)
}

fn emit<'a>(writer: &mut Writer<Vec<u8>>, event: Event<'a>) -> Result<()> {
    writer.write_event(event).map_err(|e| {
        CryptpadError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            format!("markup serialization failed: {}", e),
        )
    })
}

fn emit_element(writer: &mut Writer<Vec<u8>>, start: BytesStart<'_>, text: &str) -> Result<()> {
    let end = start.to_end().into_owned();
    if text.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(end))
}

fn emit_entry_head(writer: &mut Writer<Vec<u8>>, title: &str, body: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new("entry")))?;
    emit_element(writer, BytesStart::new("title"), title)?;
    emit_element(
        writer,
        BytesStart::new("content").with_attributes([("type", "text")]),
        body,
    )
}

enum Step {
    Open(EntryId),
    Close,
}

/// Write the root wrapper and every entry below it, depth first.
fn emit_entries(writer: &mut Writer<Vec<u8>>, doc: &Document) -> Result<()> {
    emit_entry_head(writer, ROOT_TITLE, "")?;
    let mut steps: Vec<Step> = doc.children(None)?.iter().rev().map(|&c| Step::Open(c)).collect();
    while let Some(step) = steps.pop() {
        match step {
            Step::Open(id) => {
                emit_entry_head(writer, doc.title(id)?, doc.body(id)?)?;
                steps.push(Step::Close);
                steps.extend(doc.children(Some(id))?.iter().rev().map(|&c| Step::Open(c)));
            }
            Step::Close => emit(writer, Event::End(BytesEnd::new("entry")))?,
        }
    }
    emit(writer, Event::End(BytesEnd::new("entry")))
}

/// Serialize a document to XML text.
pub fn to_text(doc: &Document) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))),
    )?;
    emit(&mut writer, Event::Start(BytesStart::new("xml")))?;

    emit(&mut writer, Event::Start(BytesStart::new("fileinfo")))?;
    let version = MARKUP_VERSION.to_string();
    emit_element(
        &mut writer,
        BytesStart::new("appname").with_attributes([("version", version.as_str())]),
        PRODUCT_NAME,
    )?;
    emit(&mut writer, Event::End(BytesEnd::new("fileinfo")))?;

    emit(&mut writer, Event::Start(BytesStart::new("entries")))?;
    emit_entries(&mut writer, doc)?;
    emit(&mut writer, Event::End(BytesEnd::new("entries")))?;

    emit(&mut writer, Event::End(BytesEnd::new("xml")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| {
        CryptpadError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "markup serialization produced invalid UTF-8",
            e,
        )
    })
}

/// Role of an open element, decided from its name and its parent's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Document,
    FileInfo,
    AppName,
    Entries,
    Wrapper,
    Entry,
    Title,
    Content,
    Other,
}

/// An `<entry>` whose closing tag has not been seen yet.
struct Pending {
    id: EntryId,
    title: Option<String>,
    body: Option<String>,
}

/// Builds the document while reading, so nesting depth costs heap, not stack.
#[derive(Default)]
struct Parser {
    frames: Vec<Frame>,
    pending: Vec<Pending>,
    doc: Document,
    saw_document: bool,
    saw_wrapper: bool,
    saw_entries: bool,
}

impl Parser {
    fn open(&mut self, start: &BytesStart<'_>) -> Result<()> {
        let name = start.name();
        let parent_frame = self.frames.last().copied();
        let frame = match (parent_frame, name.as_ref()) {
            (None, _) if self.saw_document => {
                return Err(invalid("more than one document element"));
            }
            (None, _) => {
                self.saw_document = true;
                Frame::Document
            }
            (Some(Frame::Document), b"fileinfo") => Frame::FileInfo,
            (Some(Frame::Document), b"entries") => Frame::Entries,
            (Some(Frame::FileInfo), b"appname") => {
                check_version(start)?;
                Frame::AppName
            }
            (Some(Frame::Entries), b"entry") if self.saw_wrapper => {
                warn!("ignoring extra root entry in document markup");
                Frame::Other
            }
            (Some(Frame::Entries), b"entry") => {
                self.saw_wrapper = true;
                Frame::Wrapper
            }
            (Some(Frame::Wrapper), b"entry") => self.open_entry(None),
            (Some(Frame::Entry), b"entry") => {
                let parent = self.pending.last().map(|p| p.id);
                self.open_entry(parent)
            }
            // Only the first title and content of an entry count.
            (Some(Frame::Entry), b"title") => match self.pending.last_mut() {
                Some(p) if p.title.is_none() => {
                    p.title = Some(String::new());
                    Frame::Title
                }
                _ => Frame::Other,
            },
            (Some(Frame::Entry), b"content") => match self.pending.last_mut() {
                Some(p) if p.body.is_none() => {
                    p.body = Some(String::new());
                    Frame::Content
                }
                _ => Frame::Other,
            },
            _ => Frame::Other,
        };
        self.frames.push(frame);
        Ok(())
    }

    fn open_entry(&mut self, parent: Option<EntryId>) -> Frame {
        let id = self.doc.insert_parsed(parent);
        self.pending.push(Pending {
            id,
            title: None,
            body: None,
        });
        Frame::Entry
    }

    fn text(&mut self, text: &str) {
        let Some(current) = self.pending.last_mut() else {
            return;
        };
        let target = match self.frames.last() {
            Some(Frame::Title) => &mut current.title,
            Some(Frame::Content) => &mut current.body,
            _ => return,
        };
        target.get_or_insert_with(String::new).push_str(text);
    }

    fn close(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| invalid("closing tag without a matching opening tag"))?;
        match frame {
            Frame::Entries => self.saw_entries = true,
            Frame::Entry => {
                let done = self.pending.pop().ok_or_else(|| {
                    CryptpadError::with_kind(
                        ErrorCategory::Internal,
                        ErrorKind::InternalInvariant,
                        "markup parser lost track of open entries",
                    )
                })?;
                let title = match done.title {
                    Some(t) if !t.is_empty() => t,
                    Some(_) => return Err(invalid("entry has an empty title")),
                    None => return Err(invalid("entry has no title")),
                };
                self.doc
                    .fill_parsed(done.id, title, done.body.unwrap_or_default())?;
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Document> {
        if !self.frames.is_empty() {
            return Err(invalid("document ended before all elements were closed"));
        }
        if !self.saw_document {
            return Err(invalid("no document element"));
        }
        if !self.saw_entries {
            return Err(invalid("document has no <entries> element"));
        }
        Ok(self.doc)
    }
}

fn check_version(start: &BytesStart<'_>) -> Result<()> {
    let attr = start
        .try_get_attribute("version")
        .map_err(|e| invalid(format!("malformed attribute: {}", e)))?;
    let Some(attr) = attr else {
        return Ok(());
    };
    let value = attr
        .unescape_value()
        .map_err(|e| invalid(format!("malformed version attribute: {}", e)))?;
    let version: u32 = value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("markup version {:?} is not a number", value)))?;
    if version > MARKUP_VERSION {
        return Err(invalid(format!(
            "markup version {} is newer than supported version {}",
            version, MARKUP_VERSION
        )));
    }
    Ok(())
}

/// Parse XML text into a document.
pub fn from_text(text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    let mut parser = Parser::default();

    loop {
        let event = reader.read_event().map_err(|e| {
            CryptpadError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MarkupInvalid,
                format!(
                    "document markup is not well-formed at byte {}: {}",
                    reader.buffer_position(),
                    e
                ),
                e,
            )
        })?;
        match event {
            Event::Start(start) => parser.open(&start)?,
            Event::Empty(start) => {
                parser.open(&start)?;
                parser.close()?;
            }
            Event::End(_) => parser.close()?,
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| invalid(format!("bad character reference: {}", e)))?;
                parser.text(&text);
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|_| invalid("CDATA section is not valid UTF-8"))?;
                parser.text(text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let doc = parser.finish()?;
    debug!(entries = doc.len(), "document markup parsed");
    Ok(doc)
}
