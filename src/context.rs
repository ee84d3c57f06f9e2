use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::llm::ModelUsage;

type DynValue = Arc<dyn Any + Send + Sync>;

/// Token accounting accumulated over one run, including nested runs
/// (guardrail checks, agents used as tools) that share the context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunUsage {
    pub requests: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl fmt::Display for RunUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {} input tokens, {} output tokens",
            self.requests, self.input_tokens, self.output_tokens
        )
    }
}

/// Per-run state handed to tools, dynamic instructions, guardrails and
/// hooks: caller-supplied values plus accumulated usage.
///
/// Values are inserted before the run and read — unmodified — during it.
/// A context belongs to one logical run; start a fresh one for the next
/// unrelated run so nothing leaks across.
#[derive(Clone, Default)]
pub struct RunContext {
    typed: Arc<RwLock<HashMap<TypeId, DynValue>>>,
    named: Arc<RwLock<HashMap<String, DynValue>>>,
    usage: Arc<RwLock<RunUsage>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&self, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut typed = self.typed.write().expect("context typed map lock poisoned");
        typed.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Chainable form of [`RunContext::insert`].
    pub fn with_value<T>(self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.insert(value);
        self
    }

    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let typed = self.typed.read().ok()?;
        let value = typed.get(&TypeId::of::<T>())?.clone();
        Arc::downcast::<T>(value).ok()
    }

    pub fn insert_named<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut named = self.named.write().expect("context named map lock poisoned");
        named.insert(key.into(), Arc::new(value));
    }

    pub fn get_named<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let named = self.named.read().ok()?;
        let value = named.get(key)?.clone();
        Arc::downcast::<T>(value).ok()
    }

    /// Snapshot of the usage accumulated so far.
    pub fn usage(&self) -> RunUsage {
        *self.usage.read().expect("context usage lock poisoned")
    }

    pub(crate) fn record_usage(&self, usage: Option<&ModelUsage>) {
        let mut accumulated = self.usage.write().expect("context usage lock poisoned");
        accumulated.requests += 1;
        if let Some(usage) = usage {
            accumulated.input_tokens += usage.input_tokens;
            accumulated.output_tokens += usage.output_tokens;
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let typed_len = self.typed.read().map(|map| map.len()).unwrap_or(0);
        let named_len = self.named.read().map(|map| map.len()).unwrap_or(0);
        f.debug_struct("RunContext")
            .field("typed_values", &typed_len)
            .field("named_values", &named_len)
            .field("usage", &self.usage())
            .finish()
    }
}
