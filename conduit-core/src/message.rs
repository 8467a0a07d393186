//! The message envelope threaded through plugs and features.
//!
//! A [`Message`] pairs an immutable [`Status`] with a mutable header
//! collection, a cookie list and a body. The body is held in exactly one
//! primary representation:
//!
//! - a **document** (`serde_json::Value`),
//! - a **byte buffer**,
//! - a **live stream** of byte chunks,
//!
//! and conversions between them are lazy and cached: the first conversion
//! of a document into bytes (or of bytes into a document) is stored next to
//! the primary form and every later call returns the cached value.
//!
//! Live streams are not replayable. They have to be memorized (drained into
//! a buffer under a byte ceiling and a deadline) before the synchronous
//! accessors can see their content, and they make the message
//! non-cloneable until then.
//!
//! ```rust
//! use conduit_core::{Message, Status};
//! use serde_json::json;
//!
//! let mut msg = Message::ok_json(json!({"name": "widget"}));
//! assert_eq!(msg.status(), Status::OK);
//! let bytes = msg.to_bytes().unwrap();
//! assert_eq!(&bytes[..], br#"{"name":"widget"}"#);
//! ```

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::headers::{CONTENT_LENGTH, CONTENT_TYPE, Headers, LOCATION};
use crate::status::Status;

/// A boxed stream of body chunks.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXT: &str = "text/plain; charset=utf-8";
pub const MIME_BINARY: &str = "application/octet-stream";

enum Body {
    Document { doc: Value, bytes: Option<Bytes> },
    Bytes { bytes: Bytes, doc: Option<Value> },
    Stream { stream: BodyStream, length: Option<u64> },
    Consumed,
    Closed,
}

impl Body {
    fn kind(&self) -> &'static str {
        match self {
            Body::Document { .. } => "document",
            Body::Bytes { .. } => "bytes",
            Body::Stream { .. } => "stream",
            Body::Consumed => "consumed",
            Body::Closed => "closed",
        }
    }
}

pub struct Message {
    status: Status,
    headers: Headers,
    cookies: Vec<Cookie>,
    body: Body,
}

impl Message {
    // ========== Constructors ==========

    /// Create a message whose body is a document.
    ///
    /// An empty document (`Value::Null`) is stored as zero-length text so
    /// that it never renders as an ambiguous `null` payload.
    pub fn from_document(status: Status, headers: Headers, doc: Value) -> Self {
        if doc.is_null() {
            return Self::from_bytes(status, headers, MIME_TEXT, Bytes::new());
        }
        Self::with_body(status, headers, MIME_JSON, Body::Document { doc, bytes: None })
    }

    /// Create a message whose body is a byte buffer.
    pub fn from_bytes(
        status: Status,
        headers: Headers,
        content_type: &str,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self::with_body(
            status,
            headers,
            content_type,
            Body::Bytes {
                bytes: bytes.into(),
                doc: None,
            },
        )
    }

    /// Create a message whose body is text of the given mime type.
    pub fn from_text(status: Status, headers: Headers, content_type: &str, text: impl Into<String>) -> Self {
        Self::from_bytes(status, headers, content_type, Bytes::from(text.into()))
    }

    /// Create a message whose body is a live stream.
    ///
    /// `length` is the announced body size, if known.
    pub fn from_stream(
        status: Status,
        headers: Headers,
        content_type: &str,
        stream: BodyStream,
        length: Option<u64>,
    ) -> Self {
        Self::with_body(status, headers, content_type, Body::Stream { stream, length })
    }

    /// Create a message with an empty body.
    pub fn empty(status: Status) -> Self {
        Self {
            status,
            headers: Headers::new(),
            cookies: Vec::new(),
            body: Body::Bytes {
                bytes: Bytes::new(),
                doc: None,
            },
        }
    }

    fn with_body(status: Status, mut headers: Headers, content_type: &str, body: Body) -> Self {
        if !headers.contains(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type);
        }
        Self {
            status,
            headers,
            cookies: Vec::new(),
            body,
        }
    }

    // ========== Factories ==========

    pub fn ok() -> Self {
        Self::empty(Status::OK)
    }

    pub fn ok_json(doc: Value) -> Self {
        Self::from_document(Status::OK, Headers::new(), doc)
    }

    pub fn ok_text(text: impl Into<String>) -> Self {
        Self::from_text(Status::OK, Headers::new(), MIME_TEXT, text)
    }

    pub fn ok_bytes(content_type: &str, bytes: impl Into<Bytes>) -> Self {
        Self::from_bytes(Status::OK, Headers::new(), content_type, bytes)
    }

    pub fn ok_stream(content_type: &str, stream: BodyStream, length: Option<u64>) -> Self {
        Self::from_stream(Status::OK, Headers::new(), content_type, stream, length)
    }

    pub fn created(doc: Value) -> Self {
        Self::from_document(Status::CREATED, Headers::new(), doc)
    }

    pub fn no_content() -> Self {
        Self::empty(Status::NO_CONTENT)
    }

    /// 302 Found pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        let mut msg = Self::empty(Status::FOUND);
        msg.headers.insert(LOCATION, location);
        msg
    }

    /// 301 Moved Permanently pointing at `location`.
    pub fn redirect_permanent(location: &str) -> Self {
        let mut msg = Self::empty(Status::MOVED_PERMANENTLY);
        msg.headers.insert(LOCATION, location);
        msg
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(Status::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::error(Status::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(Status::NOT_FOUND, message)
    }

    pub fn method_not_allowed(allowed: &[&str], message: impl Into<String>) -> Self {
        let mut msg = Self::error(Status::METHOD_NOT_ALLOWED, message);
        msg.headers.insert("Allow", allowed.join(", "));
        msg
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::error(Status::INTERNAL_ERROR, message)
    }

    /// A message with the structured error body
    /// `{"status": <code>, "title": <reason>, "message": <message>}`.
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        let doc = serde_json::json!({
            "status": status.code(),
            "title": status.reason(),
            "message": message.into(),
        });
        Self::from_document(status, Headers::new(), doc)
    }

    // ========== Envelope ==========

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut Vec<Cookie> {
        &mut self.cookies
    }

    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    /// Body length: the explicit `Content-Length` header when present,
    /// otherwise derived from the materialized body.
    pub fn content_length(&self) -> Option<u64> {
        if let Some(len) = self.headers.content_length() {
            return Some(len);
        }
        match &self.body {
            Body::Bytes { bytes, .. } => Some(bytes.len() as u64),
            Body::Document { bytes: Some(bytes), .. } => Some(bytes.len() as u64),
            Body::Document { doc, .. } => serde_json::to_vec(doc).ok().map(|b| b.len() as u64),
            Body::Stream { length, .. } => *length,
            Body::Consumed | Body::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.body, Body::Closed)
    }

    /// Check if the body is a live stream that has not been memorized.
    pub fn has_live_stream(&self) -> bool {
        matches!(self.body, Body::Stream { .. })
    }

    /// A message can be cloned when it is open and its content is replayable.
    pub fn is_cloneable(&self) -> bool {
        matches!(self.body, Body::Document { .. } | Body::Bytes { .. })
    }

    // ========== Body access ==========

    /// The body as a document.
    ///
    /// Byte bodies are parsed as JSON once and the result is cached. An
    /// empty byte body yields `Value::Null`.
    pub fn to_document(&mut self) -> Result<Value> {
        match &mut self.body {
            Body::Document { doc, .. } => Ok(doc.clone()),
            Body::Bytes { doc: Some(doc), .. } => Ok(doc.clone()),
            Body::Bytes { bytes, doc } => {
                let parsed = if bytes.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_slice(&bytes[..])?
                };
                *doc = Some(parsed.clone());
                Ok(parsed)
            }
            Body::Stream { .. } => Err(Error::NotMemorized),
            Body::Consumed => Err(Error::BodyConsumed),
            Body::Closed => Err(Error::AlreadyClosed),
        }
    }

    /// The body as bytes. Documents are rendered once and cached.
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        match &mut self.body {
            Body::Bytes { bytes, .. } => Ok(bytes.clone()),
            Body::Document { bytes: Some(bytes), .. } => Ok(bytes.clone()),
            Body::Document { doc, bytes } => {
                let rendered = Bytes::from(serde_json::to_vec(&*doc)?);
                *bytes = Some(rendered.clone());
                Ok(rendered)
            }
            Body::Stream { .. } => Err(Error::NotMemorized),
            Body::Consumed => Err(Error::BodyConsumed),
            Body::Closed => Err(Error::AlreadyClosed),
        }
    }

    /// The body as UTF-8 text.
    pub fn to_text(&mut self) -> Result<String> {
        let bytes = self.to_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::InvalidBody(e.to_string()))
    }

    /// The body as a stream.
    ///
    /// A live stream is handed to the caller and the message body becomes
    /// consumed. Any other body yields a fresh stream over its bytes and
    /// stays readable.
    pub fn to_stream(&mut self) -> Result<BodyStream> {
        if matches!(self.body, Body::Stream { .. }) {
            return match std::mem::replace(&mut self.body, Body::Consumed) {
                Body::Stream { stream, .. } => Ok(stream),
                _ => Err(Error::BodyConsumed),
            };
        }
        let bytes = self.to_bytes()?;
        Ok(stream::once(async move { Ok(bytes) }).boxed())
    }

    /// Drain a live stream body into memory.
    ///
    /// Fails with [`Error::BufferOverflow`] once more than `max_bytes` have
    /// been read (or announced) and with [`Error::Timeout`] when the body
    /// does not finish within `timeout`. After a failure the body is
    /// consumed. Non-stream bodies are left as they are.
    pub async fn memorize(&mut self, max_bytes: u64, timeout: Duration) -> Result<()> {
        let announced = match &self.body {
            Body::Stream { length, .. } => *length,
            Body::Document { .. } | Body::Bytes { .. } => return Ok(()),
            Body::Consumed => return Err(Error::BodyConsumed),
            Body::Closed => return Err(Error::AlreadyClosed),
        };

        let Body::Stream { stream, .. } = std::mem::replace(&mut self.body, Body::Consumed) else {
            return Err(Error::BodyConsumed);
        };
        if announced.is_some_and(|len| len > max_bytes) {
            return Err(Error::BufferOverflow { limit: max_bytes });
        }

        let bytes = match tokio::time::timeout(timeout, drain(stream, max_bytes)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(?timeout, "message memorization timed out");
                return Err(Error::Timeout(timeout));
            }
        };

        if !self.headers.contains(CONTENT_LENGTH) {
            self.headers.insert(CONTENT_LENGTH, bytes.len().to_string());
        }
        self.body = Body::Bytes { bytes, doc: None };
        Ok(())
    }

    /// Memorize without limits and return the body bytes.
    pub async fn read_bytes(&mut self) -> Result<Bytes> {
        self.memorize(u64::MAX, Duration::MAX).await?;
        self.to_bytes()
    }

    /// Clone the message. Only valid while [`Message::is_cloneable`].
    pub fn try_clone(&self) -> Result<Message> {
        let body = match &self.body {
            Body::Document { doc, bytes } => Body::Document {
                doc: doc.clone(),
                bytes: bytes.clone(),
            },
            Body::Bytes { bytes, doc } => Body::Bytes {
                bytes: bytes.clone(),
                doc: doc.clone(),
            },
            Body::Closed => return Err(Error::AlreadyClosed),
            Body::Stream { .. } | Body::Consumed => return Err(Error::NotCloneable),
        };
        Ok(Message {
            status: self.status,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            body,
        })
    }

    /// Release the body. Idempotent.
    pub fn close(&mut self) {
        self.body = Body::Closed;
    }
}

async fn drain(mut stream: BodyStream, max_bytes: u64) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if (buffer.len() + chunk.len()) as u64 > max_bytes {
            return Err(Error::BufferOverflow { limit: max_bytes });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.len())
            .field("body", &self.body.kind())
            .finish()
    }
}
