use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;

use super::controller::FormResult;
use super::validation::FieldLens;
use super::value::FieldValue;
use crate::remote::RemoteCheckError;

pub const REMOTE_UNAVAILABLE_MESSAGE: &str = "Unable to verify this value right now";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RuleKind {
    Required,
    Pattern,
    Validate(&'static str),
    Remote(&'static str),
    RemoteUnavailable(&'static str),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationFailure {
    pub rule: RuleKind,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(rule: RuleKind, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a single predicate: `Err` carries the message to show.
pub type Verdict = Result<(), String>;

/// Outcome of a remote predicate; the outer error means the check itself
/// could not be completed.
pub type RemoteVerdict = Result<Verdict, RemoteCheckError>;

type Predicate<V> = Arc<dyn Fn(&V) -> Verdict + Send + Sync>;
type RemotePredicate<V> = Arc<dyn Fn(V) -> BoxFuture<'static, RemoteVerdict> + Send + Sync>;

struct NamedPredicate<V> {
    name: &'static str,
    check: Predicate<V>,
}

struct RemoteRule<V> {
    name: &'static str,
    debounce: Duration,
    check: RemotePredicate<V>,
}

/// Ordered rule set for one field.
///
/// Evaluation order is fixed regardless of builder call order: presence,
/// pattern, predicates, then remote predicates. The first failure wins.
pub struct FieldRules<V> {
    required: Option<String>,
    pattern: Option<(Regex, String)>,
    predicates: Vec<NamedPredicate<V>>,
    remote: Vec<RemoteRule<V>>,
}

impl<V> Default for FieldRules<V> {
    fn default() -> Self {
        Self {
            required: None,
            pattern: None,
            predicates: Vec::new(),
            remote: Vec::new(),
        }
    }
}

impl<V> FieldRules<V>
where
    V: FieldValue,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn pattern(mut self, pattern: &str, message: impl Into<String>) -> FormResult<Self> {
        self.pattern = Some((Regex::new(pattern)?, message.into()));
        Ok(self)
    }

    pub fn validate(
        mut self,
        name: &'static str,
        check: impl Fn(&V) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        self.predicates.push(NamedPredicate {
            name,
            check: Arc::new(check),
        });
        self
    }

    pub fn validate_async<F, Fut>(self, name: &'static str, check: F) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RemoteVerdict> + Send + 'static,
    {
        self.validate_async_debounced(name, Duration::ZERO, check)
    }

    /// Like [`FieldRules::validate_async`], but waits `debounce` first and
    /// skips the call entirely if a newer run started in the meantime.
    pub fn validate_async_debounced<F, Fut>(
        mut self,
        name: &'static str,
        debounce: Duration,
        check: F,
    ) -> Self
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RemoteVerdict> + Send + 'static,
    {
        self.remote.push(RemoteRule {
            name,
            debounce,
            check: Arc::new(move |value: V| -> BoxFuture<'static, RemoteVerdict> {
                Box::pin(check(value))
            }),
        });
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }

    pub fn has_remote(&self) -> bool {
        !self.remote.is_empty()
    }

    pub fn check_sync(&self, value: &V) -> Result<(), ValidationFailure> {
        if let Some(message) = &self.required {
            if value.is_blank() {
                return Err(ValidationFailure::new(RuleKind::Required, message.clone()));
            }
        }

        // Blank values are left to the presence rule.
        if let Some((regex, message)) = &self.pattern {
            if !value.is_blank() && !regex.is_match(&value.as_text()) {
                return Err(ValidationFailure::new(RuleKind::Pattern, message.clone()));
            }
        }

        for predicate in &self.predicates {
            if let Err(message) = (predicate.check)(value) {
                return Err(ValidationFailure::new(
                    RuleKind::Validate(predicate.name),
                    message,
                ));
            }
        }
        Ok(())
    }

    pub(super) fn erase<T, L>(self, lens: L) -> ErasedRules<T>
    where
        T: 'static,
        L: FieldLens<T, Value = V>,
    {
        let remote = self
            .remote
            .iter()
            .map(|rule| {
                let check = rule.check.clone();
                ErasedRemote {
                    name: rule.name,
                    debounce: rule.debounce,
                    check: Box::new(move |model: &T| check(lens.get(model).clone())),
                }
            })
            .collect();
        let sync_rules = Arc::new(self);
        ErasedRules {
            sync: Box::new(move |model: &T| sync_rules.check_sync(lens.get(model))),
            remote,
        }
    }
}

pub(super) struct ErasedRemote<T> {
    pub(super) name: &'static str,
    pub(super) debounce: Duration,
    pub(super) check: Box<dyn Fn(&T) -> BoxFuture<'static, RemoteVerdict> + Send + Sync>,
}

/// A field's rules with the value type erased behind its lens.
pub(super) struct ErasedRules<T> {
    pub(super) sync: Box<dyn Fn(&T) -> Result<(), ValidationFailure> + Send + Sync>,
    pub(super) remote: Vec<ErasedRemote<T>>,
}
