use std::sync::Arc;

use futures::future::join_all;
use futures_timer::Delay;
use tracing::{debug, warn};

use super::binding::FieldBinding;
use super::controller::{
    FieldKey, FormController, FormEvent, FormOptions, FormResult, RemoteFailurePolicy,
    RevalidateMode, ValidationMode, ValidationTicket, read_lock, unknown_field, write_lock,
};
use super::rules::{
    ErasedRules, FieldRules, REMOTE_UNAVAILABLE_MESSAGE, RuleKind, ValidationFailure,
};
use super::value::{FieldValue, FromInput};

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: FieldValue;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

/// Implemented by `#[derive(FormModel)]`.
pub trait FormModel: Clone + Send + Sync + 'static {
    /// Lens accessors, one per field.
    type Fields;
    /// One `FieldRules` per field.
    type Rules: Default;
    /// One `FieldBinding` per field.
    type Bindings;

    fn fields() -> Self::Fields;
    fn field_keys() -> &'static [FieldKey];

    /// Registers every field in declaration order.
    fn register_all(
        controller: &FormController<Self>,
        rules: Self::Rules,
    ) -> FormResult<Self::Bindings>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldOutcome {
    Valid,
    Invalid(ValidationFailure),
    /// A newer value or run replaced this one; its result was dropped.
    Superseded,
}

impl FieldOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldOutcome::Valid)
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            FieldOutcome::Invalid(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A started validation run for one field.
///
/// The ticket is taken when the run is created, not when it is first polled,
/// so the order in which runs are started decides which result wins.
#[must_use = "a validation run does nothing until `finish` is awaited"]
pub struct ValidationRun<T>
where
    T: Clone + Send + Sync + 'static,
{
    controller: FormController<T>,
    key: FieldKey,
    ticket: ValidationTicket,
    model: T,
    rules: Arc<ErasedRules<T>>,
}

impl<T> ValidationRun<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn ticket(&self) -> ValidationTicket {
        self.ticket
    }

    pub async fn finish(self) -> FormResult<FieldOutcome> {
        let Some(result) = self.evaluate().await? else {
            debug!(field = %self.key, ticket = self.ticket.0, "validation run superseded during debounce");
            return Ok(FieldOutcome::Superseded);
        };
        self.controller
            .finish_validation(self.key, self.ticket, result)
    }

    async fn evaluate(&self) -> FormResult<Option<Result<(), ValidationFailure>>> {
        if let Err(failure) = (self.rules.sync)(&self.model) {
            return Ok(Some(Err(failure)));
        }

        for rule in &self.rules.remote {
            if !rule.debounce.is_zero() {
                Delay::new(rule.debounce).await;
                if !self.controller.is_latest_ticket(self.key, self.ticket)? {
                    return Ok(None);
                }
            }

            match (rule.check)(&self.model).await {
                Ok(Ok(())) => {}
                Ok(Err(message)) => {
                    return Ok(Some(Err(ValidationFailure::new(
                        RuleKind::Remote(rule.name),
                        message,
                    ))));
                }
                Err(error) => {
                    warn!(field = %self.key, rule = rule.name, %error, "remote validation check failed");
                    if self.controller.options.remote_failure == RemoteFailurePolicy::Reject {
                        return Ok(Some(Err(ValidationFailure::new(
                            RuleKind::RemoteUnavailable(rule.name),
                            REMOTE_UNAVAILABLE_MESSAGE,
                        ))));
                    }
                }
            }
        }
        Ok(Some(Ok(())))
    }
}

impl<T> FormController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Registers `rules` for the field behind `lens`, replacing any rule set
    /// registered for the same key.
    pub fn register<L>(&self, lens: L, rules: FieldRules<L::Value>) -> FormResult<FieldBinding<T, L>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let required = rules.is_required();
        let remote = rules.has_remote();
        let erased = Arc::new(rules.erase(lens));
        let replaced = write_lock(&self.rules, "registering field rules")?
            .insert(key, erased)
            .is_some();
        {
            let mut state = write_lock(&self.state, "registering field meta")?;
            if replaced {
                state.issue_ticket(key);
                state.meta_mut(key)?.validating = false;
            }
            state.field_meta.entry(key).or_default();
        }
        debug!(field = %key, required, remote, replaced, "registered field");
        Ok(FieldBinding::new(self.clone(), lens))
    }

    pub fn register_all(&self, rules: T::Rules) -> FormResult<T::Bindings>
    where
        T: FormModel,
    {
        T::register_all(self, rules)
    }

    pub fn value<L>(&self, lens: L) -> FormResult<L::Value>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let state = read_lock(&self.state, "reading field value")?;
        if !state.field_meta.contains_key(&key) {
            return Err(unknown_field(key));
        }
        Ok(lens.get(&state.model).clone())
    }

    /// Stores a new value. Any run in flight for the field is superseded; a
    /// fresh run is returned when the validation mode asks for one now.
    pub fn set_value<L>(&self, lens: L, value: L::Value) -> FormResult<Option<ValidationRun<T>>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let due = {
            let mut state = write_lock(&self.state, "writing field value")?;
            state.meta_mut(key)?;
            lens.set(&mut state.model, value);
            let dirty = lens.get(&state.model) != lens.get(&state.initial_model);
            let submitted = state.submit_count > 0;
            state.issue_ticket(key);
            let meta = state.meta_mut(key)?;
            meta.dirty = dirty;
            meta.validating = false;
            meta.pending_validation = true;
            validates_on_change(&self.options, meta.touched, meta.error.is_some(), submitted)
        };
        self.emit(&FormEvent::ValueChanged(key))?;

        if due {
            self.begin_validation_by_key(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn set_input<L>(&self, lens: L, raw: &str) -> FormResult<Option<ValidationRun<T>>>
    where
        L: FieldLens<T>,
        L::Value: FromInput,
    {
        self.set_value(lens, L::Value::from_input(raw))
    }

    pub fn mark_touched<L>(&self, lens: L) -> FormResult<Option<ValidationRun<T>>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let due = {
            let mut state = write_lock(&self.state, "touching field")?;
            let submitted = state.submit_count > 0;
            let meta = state.meta_mut(key)?;
            meta.touched = true;
            validates_on_blur(&self.options, submitted) && meta.pending_validation
        };
        self.emit(&FormEvent::Touched(key))?;

        if due {
            self.begin_validation_by_key(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn begin_validation<L>(&self, lens: L) -> FormResult<ValidationRun<T>>
    where
        L: FieldLens<T>,
    {
        self.begin_validation_by_key(lens.key())
    }

    pub async fn validate_field<L>(&self, lens: L) -> FormResult<FieldOutcome>
    where
        L: FieldLens<T>,
    {
        self.begin_validation(lens)?.finish().await
    }

    /// Validates every registered field concurrently and reports whether the
    /// whole form is free of errors afterwards.
    pub async fn validate_all(&self) -> FormResult<bool> {
        self.validate_registered().await?;
        Ok(self.snapshot()?.is_valid)
    }

    /// Runs every registered field once and returns the tickets it issued.
    pub(super) async fn validate_registered(
        &self,
    ) -> FormResult<Vec<(FieldKey, ValidationTicket)>> {
        let keys = read_lock(&self.rules, "reading registered fields")?
            .keys()
            .copied()
            .collect::<Vec<_>>();
        let runs = keys
            .into_iter()
            .map(|key| self.begin_validation_by_key(key))
            .collect::<FormResult<Vec<_>>>()?;
        let issued = runs.iter().map(|run| (run.key, run.ticket)).collect();

        for outcome in join_all(runs.into_iter().map(ValidationRun::finish)).await {
            outcome?;
        }
        Ok(issued)
    }

    pub async fn trigger(&self) -> FormResult<bool> {
        self.validate_all().await
    }

    pub async fn trigger_field<L>(&self, lens: L) -> FormResult<FieldOutcome>
    where
        L: FieldLens<T>,
    {
        self.validate_field(lens).await
    }

    pub(super) fn begin_validation_by_key(&self, key: FieldKey) -> FormResult<ValidationRun<T>> {
        let rules = read_lock(&self.rules, "reading field rules")?
            .get(&key)
            .cloned()
            .ok_or_else(|| unknown_field(key))?;
        let (ticket, model) = {
            let mut state = write_lock(&self.state, "starting validation")?;
            let ticket = state.issue_ticket(key);
            let meta = state.meta_mut(key)?;
            meta.validating = true;
            meta.pending_validation = false;
            (ticket, state.model.clone())
        };
        Ok(ValidationRun {
            controller: self.clone(),
            key,
            ticket,
            model,
            rules,
        })
    }

    fn is_latest_ticket(&self, key: FieldKey, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(&key)
            .copied()
            == Some(ticket))
    }

    fn finish_validation(
        &self,
        key: FieldKey,
        ticket: ValidationTicket,
        result: Result<(), ValidationFailure>,
    ) -> FormResult<FieldOutcome> {
        {
            let mut state = write_lock(&self.state, "finishing validation")?;
            if state.tickets.get(&key).copied() != Some(ticket) {
                debug!(field = %key, ticket = ticket.0, "discarding stale validation result");
                return Ok(FieldOutcome::Superseded);
            }
            let meta = state.meta_mut(key)?;
            meta.validating = false;
            meta.error = result.clone().err();
        }

        self.emit(&FormEvent::Validated {
            key,
            valid: result.is_ok(),
        })?;
        Ok(match result {
            Ok(()) => FieldOutcome::Valid,
            Err(failure) => FieldOutcome::Invalid(failure),
        })
    }
}

fn validates_on_change(
    options: &FormOptions,
    touched: bool,
    has_error: bool,
    submitted: bool,
) -> bool {
    if submitted {
        return options.revalidate_mode == RevalidateMode::OnChange;
    }
    match options.validate_mode {
        ValidationMode::OnChange | ValidationMode::All => true,
        ValidationMode::OnTouched => touched || has_error,
        ValidationMode::OnBlur | ValidationMode::OnSubmit => false,
    }
}

fn validates_on_blur(options: &FormOptions, submitted: bool) -> bool {
    if submitted {
        return options.revalidate_mode == RevalidateMode::OnBlur;
    }
    matches!(
        options.validate_mode,
        ValidationMode::OnBlur | ValidationMode::OnTouched | ValidationMode::All
    )
}
