//! Features: routed, staged handlers.
//!
//! A feature is a `(verb, signature)` route with a main handler and
//! optional prologue and epilogue stages. Stages run in order:
//!
//! 1. prologues, where any non-success response ends the request,
//! 2. the main handler,
//! 3. epilogues, each receiving the current response through a
//!    `response` binding and replacing it with its own result.
//!
//! Every stage is a [`StageHandler`]: an async function from
//! [`FeatureArgs`] to a [`Message`]. Synchronous handlers are wrapped with
//! [`sync_handler`]. Errors and panics raised by a stage are turned into
//! error responses at the stage boundary.
//!
//! ```rust,ignore
//! let feature = Feature::builder("GET", "users/{id}")
//!     .param(ParamSpec::auto("id", ParamKind::Int))
//!     .handler(sync_handler(|args| {
//!         let id = args.int("id").unwrap_or_default();
//!         Ok(Message::ok_json(json!({ "id": id })))
//!     }));
//! ```

use conduit_core::Message;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use http::Method;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error};

use crate::binding::{BindingPlan, FeatureArgs, ParamSpec};
use crate::context::FeatureContext;
use crate::error::{FeatureError, Result};
use crate::signature::FeatureSignature;

/// Access a caller holds or a feature requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AccessLevel {
    /// Callers outside the process.
    #[default]
    Public,
    /// In-process callers.
    Internal,
    /// Callers holding the service's own key.
    Private,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Private => "private",
        })
    }
}

/// A type-erased stage body.
pub type StageHandler = Arc<dyn Fn(FeatureArgs) -> BoxFuture<'static, Result<Message>> + Send + Sync>;

/// Wrap an async function as a stage handler.
pub fn async_handler<F, Fut>(f: F) -> StageHandler
where
    F: Fn(FeatureArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// Wrap a synchronous function as a stage handler.
pub fn sync_handler<F>(f: F) -> StageHandler
where
    F: Fn(FeatureArgs) -> Result<Message> + Send + Sync + 'static,
{
    Arc::new(move |args| future::ready(f(args)).boxed())
}

struct StageDecl {
    name: String,
    params: Vec<ParamSpec>,
    handler: StageHandler,
}

struct Stage {
    name: String,
    plan: BindingPlan,
    handler: StageHandler,
}

impl Stage {
    fn compile(decl: StageDecl, signature: &FeatureSignature) -> Result<Self> {
        Ok(Self {
            plan: BindingPlan::compile(&decl.params, signature)?,
            name: decl.name,
            handler: decl.handler,
        })
    }

    async fn run(
        &self,
        ctx: &Arc<FeatureContext>,
        request: &mut Message,
        previous: &mut Option<Message>,
    ) -> Message {
        let args = match self.plan.extract(ctx, request, previous) {
            Ok(args) => args,
            Err(err) => {
                debug!(stage = %self.name, error = %err, "argument binding failed");
                return err.into_message();
            }
        };

        let handler = self.handler.clone();
        let outcome = AssertUnwindSafe(async move { handler(args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                error!(stage = %self.name, request_id = %ctx.request_id(), error = %err, "stage failed");
                err.into_message()
            }
            Err(panic) => {
                let reason = panic_message(&*panic);
                error!(stage = %self.name, request_id = %ctx.request_id(), panic = %reason, "stage panicked");
                FeatureError::Handler(reason).into_message()
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}

/// Declares a feature before it is compiled against a service.
pub struct FeatureBuilder {
    verb: String,
    signature: String,
    access: AccessLevel,
    description: Option<String>,
    params: Vec<ParamSpec>,
    handler: Option<StageHandler>,
    prologues: Vec<StageDecl>,
    epilogues: Vec<StageDecl>,
}

impl FeatureBuilder {
    fn new(verb: &str, signature: &str) -> Self {
        Self {
            verb: verb.trim().to_ascii_uppercase(),
            signature: signature.to_string(),
            access: AccessLevel::Public,
            description: None,
            params: Vec::new(),
            handler: None,
            prologues: Vec::new(),
            epilogues: Vec::new(),
        }
    }

    /// Minimum access a caller needs.
    pub fn access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a parameter of the main handler.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn params(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.params.extend(specs);
        self
    }

    pub fn handler(mut self, handler: StageHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Add a stage that runs before the main handler.
    pub fn prologue(mut self, name: impl Into<String>, params: Vec<ParamSpec>, handler: StageHandler) -> Self {
        self.prologues.push(StageDecl {
            name: name.into(),
            params,
            handler,
        });
        self
    }

    /// Add a stage that runs after the main handler.
    pub fn epilogue(mut self, name: impl Into<String>, params: Vec<ParamSpec>, handler: StageHandler) -> Self {
        self.epilogues.push(StageDecl {
            name: name.into(),
            params,
            handler,
        });
        self
    }

    /// Compile the feature for `service` mounted below `base`.
    pub fn build(self, service: &str, base: &[&str]) -> Result<Feature> {
        let verb = match self.verb.as_str() {
            "*" => None,
            v => Some(Method::from_bytes(v.as_bytes()).map_err(|_| FeatureError::InvalidVerb(self.verb.clone()))?),
        };
        let signature = FeatureSignature::parse(base, &self.signature)?;
        let key = format!("{}:{}", self.verb, signature);

        let handler = self.handler.ok_or_else(|| FeatureError::MissingHandler(key.clone()))?;
        let main = Stage::compile(
            StageDecl {
                name: key,
                params: self.params,
                handler,
            },
            &signature,
        )?;
        let prologues = self
            .prologues
            .into_iter()
            .map(|decl| Stage::compile(decl, &signature))
            .collect::<Result<Vec<_>>>()?;
        let epilogues = self
            .epilogues
            .into_iter()
            .map(|decl| Stage::compile(decl, &signature))
            .collect::<Result<Vec<_>>>()?;

        Ok(Feature {
            service: service.to_string(),
            verb,
            signature,
            access: self.access,
            description: self.description,
            prologues,
            main,
            epilogues,
            hits: AtomicU64::new(0),
        })
    }
}

/// Snapshot of a registered feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
    pub service: String,
    /// Method name or `*`.
    pub verb: String,
    pub signature: String,
    pub access: AccessLevel,
    pub description: Option<String>,
    pub hits: u64,
}

/// A compiled feature.
pub struct Feature {
    service: String,
    /// `None` accepts every verb.
    verb: Option<Method>,
    signature: FeatureSignature,
    access: AccessLevel,
    description: Option<String>,
    prologues: Vec<Stage>,
    main: Stage,
    epilogues: Vec<Stage>,
    hits: AtomicU64,
}

impl Feature {
    pub fn builder(verb: &str, signature: &str) -> FeatureBuilder {
        FeatureBuilder::new(verb, signature)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn verb(&self) -> Option<&Method> {
        self.verb.as_ref()
    }

    pub fn is_wildcard_verb(&self) -> bool {
        self.verb.is_none()
    }

    pub fn accepts(&self, verb: &Method) -> bool {
        self.verb.as_ref().is_none_or(|v| v == verb)
    }

    pub fn signature(&self) -> &FeatureSignature {
        &self.signature
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Number of times the feature has been executed.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> FeatureInfo {
        FeatureInfo {
            service: self.service.clone(),
            verb: self.verb.as_ref().map_or_else(|| "*".to_string(), Method::to_string),
            signature: self.signature.to_string(),
            access: self.access,
            description: self.description.clone(),
            hits: self.hits(),
        }
    }

    /// Run every stage against `request`.
    ///
    /// The request body must already be memorized.
    pub async fn execute(&self, ctx: Arc<FeatureContext>, mut request: Message) -> Message {
        self.hits.fetch_add(1, Ordering::Relaxed);

        for stage in &self.prologues {
            let response = stage.run(&ctx, &mut request, &mut None).await;
            if !response.is_success() {
                debug!(stage = %stage.name, status = %response.status(), "prologue ended the request");
                request.close();
                return response;
            }
        }

        let mut response = self.main.run(&ctx, &mut request, &mut None).await;

        for stage in &self.epilogues {
            let mut previous = Some(response);
            response = stage.run(&ctx, &mut request, &mut previous).await;
        }

        request.close();
        response
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("service", &self.service)
            .field("verb", &self.verb)
            .field("signature", &self.signature)
            .field("access", &self.access)
            .field("prologues", &self.prologues.len())
            .field("epilogues", &self.epilogues.len())
            .field("hits", &self.hits())
            .finish()
    }
}
