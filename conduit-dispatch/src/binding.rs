//! Parameter-binding plans.
//!
//! A feature stage declares the parameters it wants as a list of
//! [`ParamSpec`]s. When the feature is registered every spec is validated
//! against the signature and compiled into an [`Extractor`]; a type that
//! cannot be produced from the chosen source is rejected right there, so a
//! misconfigured feature never registers. At request time the compiled plan
//! is replayed in order and produces [`FeatureArgs`].
//!
//! Well-known names bound with [`ParamSource::Auto`]:
//!
//! | Name   | Kinds                                     |
//! |--------|-------------------------------------------|
//! | `verb` | `Verb`, `Text`                            |
//! | `path` | `Text`                                    |
//! | `uri`  | `Uri`, `Text`                             |
//! | `body` | `Document`, `Text`, `Bytes`, `Stream`     |
//!
//! Any other `Auto` scalar binds to the path parameter of the same name if
//! the signature has one and to the query string otherwise.

use bytes::Bytes;
use conduit_core::headers::COOKIE;
use conduit_core::{BodyStream, Cookie, Message};
use http::Method;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use crate::context::FeatureContext;
use crate::error::{FeatureError, Result};
use crate::signature::FeatureSignature;

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    /// Resolved from the name and kind at registration.
    Auto,
    Query,
    Path,
    Header,
    Cookie,
}

/// The type a handler expects for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Text,
    Int,
    UInt,
    Float,
    Bool,
    TextList,
    IntList,
    Cookie,
    Document,
    Bytes,
    Stream,
    Verb,
    Uri,
    Context,
    Request,
    Response,
}

impl ParamKind {
    fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Int | Self::UInt | Self::Float | Self::Bool
        )
    }

    fn is_list(self) -> bool {
        matches!(self, Self::TextList | Self::IntList)
    }
}

/// A declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub source: ParamSource,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, source: ParamSource, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            source,
            kind,
        }
    }

    pub fn auto(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, ParamSource::Auto, kind)
    }

    pub fn query(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, ParamSource::Query, kind)
    }

    pub fn path(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, ParamSource::Path, kind)
    }

    pub fn header(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, ParamSource::Header, kind)
    }

    pub fn cookie(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::new(name, ParamSource::Cookie, kind)
    }

    pub fn body(kind: ParamKind) -> Self {
        Self::auto("body", kind)
    }

    pub fn context() -> Self {
        Self::auto("context", ParamKind::Context)
    }

    pub fn request() -> Self {
        Self::auto("request", ParamKind::Request)
    }

    pub fn response() -> Self {
        Self::auto("response", ParamKind::Response)
    }
}

/// How one parameter is produced at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extractor {
    Query { key: String, kind: ParamKind },
    Path { key: String, kind: ParamKind },
    Header { key: String, kind: ParamKind },
    CookieValue(String),
    CookieObject(String),
    Verb { as_text: bool },
    PathText,
    Uri { as_text: bool },
    Body(ParamKind),
    Context,
    Request,
    Response,
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    extractor: Extractor,
}

/// The compiled, ordered extractor list of one stage.
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    bindings: Vec<Binding>,
}

impl BindingPlan {
    /// Validate `specs` against `signature` and compile them.
    pub fn compile(specs: &[ParamSpec], signature: &FeatureSignature) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut bindings = Vec::with_capacity(specs.len());

        for spec in specs {
            if !seen.insert(spec.name.to_ascii_lowercase()) {
                return Err(FeatureError::DuplicateParameter(spec.name.clone()));
            }
            let extractor = select(spec, signature)?;
            bindings.push(Binding {
                name: spec.name.clone(),
                extractor,
            });
        }

        Ok(Self { bindings })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Extractors in declaration order.
    pub fn extractors(&self) -> impl Iterator<Item = (&str, &Extractor)> {
        self.bindings.iter().map(|b| (b.name.as_str(), &b.extractor))
    }

    /// Replay the plan against a request.
    ///
    /// `response` holds the response of the previous stage and is taken by a
    /// `response` binding.
    pub fn extract(
        &self,
        ctx: &Arc<FeatureContext>,
        request: &mut Message,
        response: &mut Option<Message>,
    ) -> Result<FeatureArgs> {
        let mut values = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let arg = extract_one(&binding.name, &binding.extractor, ctx, request, response)?;
            values.push((binding.name.clone(), arg));
        }
        Ok(FeatureArgs {
            context: ctx.clone(),
            values,
        })
    }
}

fn mismatch(spec: &ParamSpec, reason: impl Into<String>) -> FeatureError {
    FeatureError::BindingType {
        parameter: spec.name.clone(),
        reason: reason.into(),
    }
}

fn select(spec: &ParamSpec, signature: &FeatureSignature) -> Result<Extractor> {
    use ParamKind as K;

    if matches!(spec.kind, K::Context | K::Request | K::Response) {
        if spec.source != ParamSource::Auto {
            return Err(mismatch(spec, format!("{:?} can only be bound automatically", spec.kind)));
        }
        return Ok(match spec.kind {
            K::Context => Extractor::Context,
            K::Request => Extractor::Request,
            _ => Extractor::Response,
        });
    }

    let value_kind = spec.kind.is_scalar() || spec.kind.is_list();
    let key = spec.name.clone();

    match spec.source {
        ParamSource::Query if value_kind => Ok(Extractor::Query { key, kind: spec.kind }),
        ParamSource::Header if value_kind => Ok(Extractor::Header { key, kind: spec.kind }),
        ParamSource::Path if value_kind => {
            if signature.has_param(&spec.name) {
                Ok(Extractor::Path { key, kind: spec.kind })
            } else {
                Err(mismatch(
                    spec,
                    format!("signature '{}' has no parameter of that name", signature.as_str()),
                ))
            }
        }
        ParamSource::Cookie => match spec.kind {
            K::Text => Ok(Extractor::CookieValue(key)),
            K::Cookie => Ok(Extractor::CookieObject(key)),
            other => Err(mismatch(spec, format!("cookies bind as Text or Cookie, not {other:?}"))),
        },
        ParamSource::Query | ParamSource::Header | ParamSource::Path => Err(mismatch(
            spec,
            format!("{:?} values cannot be bound as {:?}", spec.source, spec.kind),
        )),
        ParamSource::Auto => select_auto(spec, signature),
    }
}

fn select_auto(spec: &ParamSpec, signature: &FeatureSignature) -> Result<Extractor> {
    use ParamKind as K;

    match (spec.name.to_ascii_lowercase().as_str(), spec.kind) {
        ("verb", K::Verb) => Ok(Extractor::Verb { as_text: false }),
        ("verb", K::Text) => Ok(Extractor::Verb { as_text: true }),
        ("verb", other) => Err(mismatch(spec, format!("'verb' binds as Verb or Text, not {other:?}"))),
        ("path", K::Text) => Ok(Extractor::PathText),
        ("path", other) => Err(mismatch(spec, format!("'path' binds as Text, not {other:?}"))),
        ("uri", K::Uri) => Ok(Extractor::Uri { as_text: false }),
        ("uri", K::Text) => Ok(Extractor::Uri { as_text: true }),
        ("uri", other) => Err(mismatch(spec, format!("'uri' binds as Uri or Text, not {other:?}"))),
        ("body", kind @ (K::Document | K::Text | K::Bytes | K::Stream)) => Ok(Extractor::Body(kind)),
        ("body", other) => Err(mismatch(
            spec,
            format!("'body' binds as Document, Text, Bytes or Stream, not {other:?}"),
        )),
        (_, kind) if kind.is_scalar() || kind.is_list() => {
            let key = spec.name.clone();
            if signature.has_param(&spec.name) {
                Ok(Extractor::Path { key, kind })
            } else {
                Ok(Extractor::Query { key, kind })
            }
        }
        (_, other) => Err(mismatch(spec, format!("no automatic source for {other:?}"))),
    }
}

/// A bound argument value. Scalars are `None` when the request lacks them.
pub enum Arg {
    Text(Option<String>),
    Int(Option<i64>),
    UInt(Option<u64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    TextList(Vec<String>),
    IntList(Vec<i64>),
    Cookie(Option<Cookie>),
    Document(Value),
    Bytes(Bytes),
    Stream(Option<BodyStream>),
    Verb(Method),
    Uri(Url),
    Context(Arc<FeatureContext>),
    Request(Option<Message>),
    Response(Option<Message>),
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Arg::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Arg::UInt(v) => f.debug_tuple("UInt").field(v).finish(),
            Arg::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Arg::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Arg::TextList(v) => f.debug_tuple("TextList").field(v).finish(),
            Arg::IntList(v) => f.debug_tuple("IntList").field(v).finish(),
            Arg::Cookie(v) => f.debug_tuple("Cookie").field(v).finish(),
            Arg::Document(v) => f.debug_tuple("Document").field(v).finish(),
            Arg::Bytes(v) => f.debug_tuple("Bytes").field(&v.len()).finish(),
            Arg::Stream(v) => f.debug_tuple("Stream").field(&v.is_some()).finish(),
            Arg::Verb(v) => f.debug_tuple("Verb").field(v).finish(),
            Arg::Uri(v) => f.debug_tuple("Uri").field(&v.as_str()).finish(),
            Arg::Context(v) => f.debug_tuple("Context").field(&v.request_id()).finish(),
            Arg::Request(v) => f.debug_tuple("Request").field(v).finish(),
            Arg::Response(v) => f.debug_tuple("Response").field(v).finish(),
        }
    }
}

fn bad_argument(name: &str, message: impl Into<String>) -> FeatureError {
    FeatureError::BadArgument {
        parameter: name.to_string(),
        message: message.into(),
    }
}

fn extract_one(
    name: &str,
    extractor: &Extractor,
    ctx: &Arc<FeatureContext>,
    request: &mut Message,
    response: &mut Option<Message>,
) -> Result<Arg> {
    match extractor {
        Extractor::Query { key, kind } => convert(name, *kind, ctx.query_all(key)),
        Extractor::Path { key, kind } => {
            convert(name, *kind, ctx.path_params(key).iter().map(String::as_str).collect())
        }
        Extractor::Header { key, kind } => convert(name, *kind, request.headers().get_all(key)),
        Extractor::CookieValue(key) => Ok(Arg::Text(find_cookie(request, key).map(|c| c.value))),
        Extractor::CookieObject(key) => Ok(Arg::Cookie(find_cookie(request, key))),
        Extractor::Verb { as_text: false } => Ok(Arg::Verb(ctx.verb().clone())),
        Extractor::Verb { as_text: true } => Ok(Arg::Text(Some(ctx.verb().to_string()))),
        Extractor::PathText => Ok(Arg::Text(Some(ctx.uri().path().to_string()))),
        Extractor::Uri { as_text: false } => Ok(Arg::Uri(ctx.uri().clone())),
        Extractor::Uri { as_text: true } => Ok(Arg::Text(Some(ctx.uri().to_string()))),
        Extractor::Body(kind) => body(name, *kind, request),
        Extractor::Context => Ok(Arg::Context(ctx.clone())),
        Extractor::Request => Ok(Arg::Request(Some(request.try_clone()?))),
        Extractor::Response => Ok(Arg::Response(response.take())),
    }
}

fn body(name: &str, kind: ParamKind, request: &mut Message) -> Result<Arg> {
    let invalid = |e: conduit_core::Error| bad_argument(name, e.to_string());
    Ok(match kind {
        ParamKind::Document => Arg::Document(request.to_document().map_err(invalid)?),
        ParamKind::Text => Arg::Text(Some(request.to_text().map_err(invalid)?)),
        ParamKind::Bytes => Arg::Bytes(request.to_bytes()?),
        _ => Arg::Stream(Some(request.to_stream()?)),
    })
}

fn convert(name: &str, kind: ParamKind, values: Vec<&str>) -> Result<Arg> {
    let first = values.first().copied();
    Ok(match kind {
        ParamKind::Text => Arg::Text(first.map(str::to_string)),
        ParamKind::Int => Arg::Int(first.map(|v| parse_int(name, v)).transpose()?),
        ParamKind::UInt => Arg::UInt(
            first
                .map(|v| v.trim().parse::<u64>().map_err(|e| bad_argument(name, e.to_string())))
                .transpose()?,
        ),
        ParamKind::Float => Arg::Float(
            first
                .map(|v| v.trim().parse::<f64>().map_err(|e| bad_argument(name, e.to_string())))
                .transpose()?,
        ),
        ParamKind::Bool => Arg::Bool(first.map(|v| parse_bool(name, v)).transpose()?),
        ParamKind::TextList => Arg::TextList(values.iter().map(|v| v.to_string()).collect()),
        ParamKind::IntList => Arg::IntList(
            values
                .iter()
                .map(|v| parse_int(name, v))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(FeatureError::BindingType {
                parameter: name.to_string(),
                reason: format!("{other:?} is not a value kind"),
            });
        }
    })
}

fn parse_int(name: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| bad_argument(name, format!("'{value}': {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(bad_argument(name, format!("'{value}' is not a boolean"))),
    }
}

fn find_cookie(request: &Message, name: &str) -> Option<Cookie> {
    if let Some(cookie) = request.cookies().iter().find(|c| c.name == name) {
        return Some(cookie.clone());
    }
    request
        .headers()
        .get_all(COOKIE)
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(key, value)| Cookie::new(key.trim(), value.trim()))
}

/// The arguments handed to one stage.
#[derive(Debug)]
pub struct FeatureArgs {
    context: Arc<FeatureContext>,
    values: Vec<(String, Arg)>,
}

impl FeatureArgs {
    /// Arguments with no bound values.
    pub fn empty(context: Arc<FeatureContext>) -> Self {
        Self {
            context,
            values: Vec::new(),
        }
    }

    /// Context of the current dispatch.
    pub fn context(&self) -> &Arc<FeatureContext> {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, arg)| arg)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Arg> {
        self.values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, arg)| arg)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            Arg::Text(value) => value.as_deref(),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Arg::Int(value) => *value,
            _ => None,
        }
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Arg::UInt(value) => *value,
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Arg::Float(value) => *value,
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Arg::Bool(value) => *value,
            _ => None,
        }
    }

    pub fn texts(&self, name: &str) -> &[String] {
        match self.get(name) {
            Some(Arg::TextList(values)) => values,
            _ => &[],
        }
    }

    pub fn ints(&self, name: &str) -> &[i64] {
        match self.get(name) {
            Some(Arg::IntList(values)) => values,
            _ => &[],
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        match self.get(name)? {
            Arg::Cookie(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn document(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Arg::Document(value) => Some(value),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&Bytes> {
        match self.get(name)? {
            Arg::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn verb(&self, name: &str) -> Option<&Method> {
        match self.get(name)? {
            Arg::Verb(value) => Some(value),
            _ => None,
        }
    }

    pub fn uri(&self, name: &str) -> Option<&Url> {
        match self.get(name)? {
            Arg::Uri(value) => Some(value),
            _ => None,
        }
    }

    /// Take a bound body stream. Later calls return `None`.
    pub fn take_stream(&mut self, name: &str) -> Option<BodyStream> {
        match self.get_mut(name)? {
            Arg::Stream(stream) => stream.take(),
            _ => None,
        }
    }

    /// Take the bound copy of the request.
    pub fn take_request(&mut self) -> Option<Message> {
        self.values.iter_mut().find_map(|(_, arg)| match arg {
            Arg::Request(request) => request.take(),
            _ => None,
        })
    }

    /// Take the previous stage's response.
    pub fn take_response(&mut self) -> Option<Message> {
        self.values.iter_mut().find_map(|(_, arg)| match arg {
            Arg::Response(response) => response.take(),
            _ => None,
        })
    }
}
