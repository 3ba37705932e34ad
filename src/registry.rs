//! Document and data-context registry.
//!
//! Documents are registered by name with a factory. Data contexts are
//! registered by name with a factory taking typed parameters. The link from
//! a document to its context is either declared explicitly or found by the
//! naming convention `"<DocumentName>ViewModel"`; either way it is resolved
//! once, in [`RegistryBuilder::build`], and the registry is immutable after.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::binding::DataContext;
use crate::document::Document;
use crate::error::{ActivationError, NotFoundError};

/// Boxed error returned by user factories.
pub type BoxError = Box<dyn StdError + Send + Sync>;

type DocumentFactory = Arc<dyn Fn() -> Result<Document, BoxError> + Send + Sync>;
type ContextFactory = Arc<dyn Fn(Value) -> Result<DataContext, ActivationError> + Send + Sync>;

/// Default suffix for the context naming convention.
pub const DEFAULT_CONTEXT_SUFFIX: &str = "ViewModel";

#[derive(Clone)]
struct DocumentEntry {
    factory: DocumentFactory,
    context: Option<String>,
}

/// Immutable lookup table from document names to factories and contexts.
#[derive(Clone, Default)]
pub struct ContextRegistry {
    documents: HashMap<String, DocumentEntry>,
    contexts: HashMap<String, ContextFactory>,
}

/// Collects registrations; see [`ContextRegistry::builder`].
pub struct RegistryBuilder {
    documents: HashMap<String, DocumentFactory>,
    explicit: HashMap<String, String>,
    contexts: HashMap<String, ContextFactory>,
    suffix: String,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            documents: HashMap::new(),
            explicit: HashMap::new(),
            contexts: HashMap::new(),
            suffix: DEFAULT_CONTEXT_SUFFIX.to_string(),
        }
    }
}

impl RegistryBuilder {
    /// Register a document factory.
    pub fn document<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Document, BoxError> + Send + Sync + 'static,
    {
        self.documents.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a document factory bound to an explicitly named context.
    pub fn document_with_context<F>(mut self, name: impl Into<String>, context: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Document, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.explicit.insert(name.clone(), context.into());
        self.documents.insert(name, Arc::new(factory));
        self
    }

    /// Register a context factory taking parameters of type `P`.
    ///
    /// Parameters arrive as JSON and are deserialized into `P`; `null`
    /// parameters are read as an empty object when `P` does not accept
    /// `null` itself. The context produced is serialized to JSON for binding.
    pub fn context<P, C, E, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        P: DeserializeOwned,
        C: Serialize,
        E: Into<BoxError>,
        F: Fn(P) -> Result<C, E> + Send + Sync + 'static,
    {
        let name = name.into();
        let context_name = name.clone();
        let factory: ContextFactory = Arc::new(move |params: Value| {
            let params: P = deserialize_params(params).map_err(|source| ActivationError::Parameters {
                name: context_name.clone(),
                source,
            })?;
            let context = factory(params).map_err(|e| ActivationError::Context {
                name: context_name.clone(),
                source: e.into(),
            })?;
            serde_json::to_value(context).map_err(|e| ActivationError::Context {
                name: context_name.clone(),
                source: Box::new(e),
            })
        });
        self.contexts.insert(name, factory);
        self
    }

    /// Change the naming convention suffix (default `ViewModel`).
    pub fn context_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Resolve document → context links and freeze the registry.
    pub fn build(self) -> ContextRegistry {
        let Self {
            documents,
            mut explicit,
            contexts,
            suffix,
        } = self;
        let documents = documents
            .into_iter()
            .map(|(name, factory)| {
                let context = explicit.remove(&name).or_else(|| {
                    let conventional = format!("{name}{suffix}");
                    contexts.contains_key(&conventional).then_some(conventional)
                });
                log::debug!("document '{name}' uses context {context:?}");
                (name, DocumentEntry { factory, context })
            })
            .collect();
        ContextRegistry {
            documents,
            contexts,
        }
    }
}

fn deserialize_params<P: DeserializeOwned>(params: Value) -> Result<P, serde_json::Error> {
    if params.is_null() {
        serde_json::from_value(Value::Null)
            .or_else(|_| serde_json::from_value(Value::Object(Default::default())))
    } else {
        serde_json::from_value(params)
    }
}

impl ContextRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Names of all registered documents, sorted.
    pub fn document_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.documents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Context linked to a document, if any.
    pub fn context_name_for(&self, document: &str) -> Option<&str> {
        self.documents.get(document)?.context.as_deref()
    }

    pub fn create_document(&self, name: &str) -> Result<Document, ActivationError> {
        let entry = self
            .documents
            .get(name)
            .ok_or_else(|| NotFoundError::Document(name.to_string()))?;
        (entry.factory)().map_err(|source| ActivationError::Document {
            name: name.to_string(),
            source,
        })
    }

    pub fn create_context(&self, name: &str, params: Value) -> Result<DataContext, ActivationError> {
        let factory = self
            .contexts
            .get(name)
            .ok_or_else(|| NotFoundError::Context(name.to_string()))?;
        factory(params)
    }

    /// Create a document and its data context. Documents without a linked
    /// context bind against `null`.
    pub fn activate(&self, name: &str, params: Value) -> Result<(Document, DataContext), ActivationError> {
        let document = self.create_document(name)?;
        let context = match self.context_name_for(name) {
            Some(context) => self.create_context(context, params)?,
            None => Value::Null,
        };
        Ok((document, context))
    }
}
