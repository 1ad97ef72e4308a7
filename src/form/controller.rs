use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, error, info};

use super::rules::{ErasedRules, ValidationFailure};
use super::validation::{FieldLens, FormModel};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Identifies one validation run. Tickets come from a per-form monotonic
/// counter, so a later run always carries a larger ticket.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// When a field is validated before the first submit attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnSubmit,
    OnBlur,
    OnChange,
    /// First validation on blur; afterwards every change revalidates once the
    /// field is touched or shows an error.
    OnTouched,
    All,
}

/// When a field is revalidated after the form has been submitted once.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevalidateMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitPolicy {
    RequireDirty,
    RequireDirtyAndValid,
}

/// What a remote check that could not reach its service resolves to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RemoteFailurePolicy {
    Reject,
    Accept,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
    pub submit_policy: SubmitPolicy,
    pub remote_failure: RemoteFailurePolicy,
    pub reset_on_submit_success: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            revalidate_mode: RevalidateMode::OnChange,
            submit_policy: SubmitPolicy::RequireDirty,
            remote_failure: RemoteFailurePolicy::Reject,
            reset_on_submit_success: true,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldMeta {
    pub dirty: bool,
    pub touched: bool,
    pub validating: bool,
    pub error: Option<ValidationFailure>,
    // Value changed since the last run began.
    pub(super) pending_validation: bool,
}

impl Default for FieldMeta {
    fn default() -> Self {
        Self {
            dirty: false,
            touched: false,
            validating: false,
            error: None,
            pending_validation: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<T> {
    pub model: T,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub is_dirty: bool,
    /// No field fails or is still waiting for a result.
    pub is_valid: bool,
    pub is_submit_successful: bool,
    pub can_submit: bool,
    pub field_meta: BTreeMap<FieldKey, FieldMeta>,
}

impl<T> FormSnapshot<T> {
    pub fn error(&self, key: FieldKey) -> Option<&ValidationFailure> {
        self.field_meta.get(&key).and_then(|meta| meta.error.as_ref())
    }

    pub fn errors(&self) -> BTreeMap<FieldKey, ValidationFailure> {
        collect_errors(&self.field_meta)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormEvent {
    ValueChanged(FieldKey),
    Touched(FieldKey),
    Validated { key: FieldKey, valid: bool },
    SubmitSucceeded,
    SubmitFailed,
    Reset,
    FieldReset(FieldKey),
    ErrorsCleared,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome<T> {
    Submitted(T),
    Invalid(BTreeMap<FieldKey, ValidationFailure>),
    /// The form was reset before the submission got to the handler.
    Abandoned,
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("field `{0}` is not registered")]
    UnknownField(FieldKey),
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid submit state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    #[error("form submit is already in progress")]
    AlreadySubmitting,
    #[error("invalid pattern rule: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("submit handler failed: {0}")]
    SubmitHandler(#[source] Box<dyn StdError + Send + Sync>),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) type Listener = Arc<dyn Fn(&FormEvent) + Send + Sync>;

pub(super) struct FormState<T> {
    pub(super) id: FormId,
    pub(super) initial_model: T,
    pub(super) model: T,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    pub(super) is_submit_successful: bool,
    pub(super) field_meta: BTreeMap<FieldKey, FieldMeta>,
    pub(super) tickets: BTreeMap<FieldKey, ValidationTicket>,
    next_ticket: u64,
    // Bumped by every submit and every reset.
    submit_epoch: u64,
}

impl<T> FormState<T> {
    pub(super) fn meta_mut(&mut self, key: FieldKey) -> FormResult<&mut FieldMeta> {
        self.field_meta
            .get_mut(&key)
            .ok_or_else(|| unknown_field(key))
    }

    /// Makes a fresh ticket the field's latest, superseding any run in flight.
    pub(super) fn issue_ticket(&mut self, key: FieldKey) -> ValidationTicket {
        self.next_ticket += 1;
        let ticket = ValidationTicket(self.next_ticket);
        self.tickets.insert(key, ticket);
        ticket
    }

    fn tickets_current(&self, issued: &[(FieldKey, ValidationTicket)]) -> bool {
        issued
            .iter()
            .all(|(key, ticket)| self.tickets.get(key) == Some(ticket))
    }
}

#[derive(Clone)]
pub struct FormController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState<T>>>,
    pub(super) rules: Arc<RwLock<BTreeMap<FieldKey, Arc<ErasedRules<T>>>>>,
    pub(super) listeners: Arc<RwLock<Vec<Listener>>>,
}

impl<T> FormController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T, options: FormOptions) -> Self {
        let id = FormId::next();
        debug!(form = %id, ?options, "created form controller");
        Self {
            options,
            state: Arc::new(RwLock::new(FormState {
                id,
                initial_model: initial.clone(),
                model: initial,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                is_submit_successful: false,
                field_meta: BTreeMap::new(),
                tickets: BTreeMap::new(),
                next_ticket: 0,
                submit_epoch: 0,
            })),
            rules: Arc::new(RwLock::new(BTreeMap::new())),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn subscribe(&self, listener: impl Fn(&FormEvent) + Send + Sync + 'static) -> FormResult<()> {
        write_lock(&self.listeners, "subscribing listener")?.push(Arc::new(listener));
        Ok(())
    }

    /// Keys of `T` that have no rule set registered yet.
    pub fn unregistered_fields(&self) -> FormResult<Vec<FieldKey>>
    where
        T: FormModel,
    {
        let rules = read_lock(&self.rules, "reading registered fields")?;
        Ok(T::field_keys()
            .iter()
            .copied()
            .filter(|key| !rules.contains_key(key))
            .collect())
    }

    /// Validates every field and hands the validated values to `on_valid`.
    ///
    /// A field edited while the pass is in flight makes the whole pass run
    /// again, so the handler only ever sees values whose runs completed. A
    /// `reset` during the pass abandons the submission.
    pub async fn submit<V, I, E>(&self, on_valid: V, on_invalid: I) -> FormResult<SubmitOutcome<T>>
    where
        V: FnOnce(&T) -> Result<(), E>,
        I: FnOnce(&BTreeMap<FieldKey, ValidationFailure>),
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let (id, epoch) = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if matches!(
                state.submit_state,
                SubmitState::Validating | SubmitState::Submitting
            ) {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Validating)?;
            state.submit_count = state.submit_count.saturating_add(1);
            state.is_submit_successful = false;
            state.submit_epoch += 1;
            (state.id, state.submit_epoch)
        };

        let model = loop {
            let issued = match self.validate_registered().await {
                Ok(issued) => issued,
                Err(error) => {
                    self.fail_submit(epoch)?;
                    return Err(error);
                }
            };

            let mut state = write_lock(&self.state, "checking submit validation")?;
            if state.submit_epoch != epoch {
                debug!(form = %id, "form reset during submit, submission abandoned");
                return Ok(SubmitOutcome::Abandoned);
            }
            if !state.tickets_current(&issued) {
                debug!(form = %id, "fields changed during submit validation, validating again");
                continue;
            }

            let errors = collect_errors(&state.field_meta);
            if !errors.is_empty() {
                transition_submit_state(&mut state, SubmitState::Failed)?;
                drop(state);
                info!(form = %id, ?errors, "form submission rejected");
                on_invalid(&errors);
                self.emit(&FormEvent::SubmitFailed)?;
                return Ok(SubmitOutcome::Invalid(errors));
            }

            transition_submit_state(&mut state, SubmitState::Submitting)?;
            break state.model.clone();
        };

        if let Err(error) = on_valid(&model) {
            self.fail_submit(epoch)?;
            return Err(FormError::SubmitHandler(error.into()));
        }

        let became_successful = {
            let mut state = write_lock(&self.state, "completing submit")?;
            if state.submit_epoch != epoch {
                debug!(form = %id, "form reset while the submit handler ran");
                return Ok(SubmitOutcome::Submitted(model));
            }
            transition_submit_state(&mut state, SubmitState::Succeeded)?;
            let was_successful = state.is_submit_successful;
            state.is_submit_successful = true;
            !was_successful
        };
        info!(form = %id, "form submitted");
        self.emit(&FormEvent::SubmitSucceeded)?;

        if became_successful && self.options.reset_on_submit_success {
            self.reset()?;
        }
        Ok(SubmitOutcome::Submitted(model))
    }

    fn fail_submit(&self, epoch: u64) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "failing submit")?;
            if state.submit_epoch != epoch {
                return Ok(());
            }
            transition_submit_state(&mut state, SubmitState::Failed)?;
        }
        self.emit(&FormEvent::SubmitFailed)
    }

    pub fn reset(&self) -> FormResult<()> {
        let id = {
            let mut state = write_lock(&self.state, "resetting form")?;
            state.model = state.initial_model.clone();
            state.submit_state = SubmitState::Idle;
            state.submit_count = 0;
            state.is_submit_successful = false;
            state.submit_epoch += 1;
            let keys = state.field_meta.keys().copied().collect::<Vec<_>>();
            for key in keys {
                state.issue_ticket(key);
            }
            for meta in state.field_meta.values_mut() {
                *meta = FieldMeta::default();
            }
            state.id
        };
        debug!(form = %id, "form reset to initial values");
        self.emit(&FormEvent::Reset)
    }

    pub fn reset_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        {
            let mut state = write_lock(&self.state, "resetting field")?;
            state.meta_mut(key)?;
            let initial_value = lens.get(&state.initial_model).clone();
            lens.set(&mut state.model, initial_value);
            state.issue_ticket(key);
            *state.meta_mut(key)? = FieldMeta::default();
        }
        self.emit(&FormEvent::FieldReset(key))
    }

    /// Drops every shown error. Cleared fields count as unvalidated again.
    pub fn clear_errors(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "clearing all field errors")?;
            for meta in state.field_meta.values_mut() {
                if meta.error.take().is_some() {
                    meta.pending_validation = true;
                }
            }
        }
        self.emit(&FormEvent::ErrorsCleared)
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<T>> {
        let rules = read_lock(&self.rules, "reading field rules")?;
        let state = read_lock(&self.state, "creating form snapshot")?;
        let is_dirty = state.field_meta.values().any(|meta| meta.dirty);
        let is_valid = state.field_meta.iter().all(|(key, meta)| {
            settled_valid(meta, rules.get(key).map(Arc::as_ref), &state.model)
        });
        let in_flight = matches!(
            state.submit_state,
            SubmitState::Validating | SubmitState::Submitting
        );
        let allowed = match self.options.submit_policy {
            SubmitPolicy::RequireDirty => is_dirty,
            SubmitPolicy::RequireDirtyAndValid => is_dirty && is_valid,
        };
        Ok(FormSnapshot {
            model: state.model.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            is_dirty,
            is_valid,
            is_submit_successful: state.is_submit_successful,
            can_submit: allowed && !in_flight,
            field_meta: state.field_meta.clone(),
        })
    }

    pub fn field_meta<L>(&self, lens: L) -> FormResult<FieldMeta>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        read_lock(&self.state, "reading field meta")?
            .field_meta
            .get(&key)
            .cloned()
            .ok_or_else(|| unknown_field(key))
    }

    pub(super) fn emit(&self, event: &FormEvent) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "reading listeners")?.clone();
        for listener in listeners {
            listener(event);
        }
        Ok(())
    }
}

pub(super) fn transition_submit_state<T>(
    state: &mut FormState<T>,
    next: SubmitState,
) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

/// Whether a field is known to pass. A field not validated since its last
/// change is judged by its sync rules, and only if it has no remote rule.
fn settled_valid<T>(meta: &FieldMeta, rules: Option<&ErasedRules<T>>, model: &T) -> bool {
    if meta.error.is_some() || meta.validating {
        return false;
    }
    if !meta.pending_validation {
        return true;
    }
    rules.is_some_and(|rules| rules.remote.is_empty() && (rules.sync)(model).is_ok())
}

pub(super) fn collect_errors(
    field_meta: &BTreeMap<FieldKey, FieldMeta>,
) -> BTreeMap<FieldKey, ValidationFailure> {
    field_meta
        .iter()
        .filter_map(|(key, meta)| meta.error.clone().map(|error| (*key, error)))
        .collect()
}

pub(super) fn unknown_field(key: FieldKey) -> FormError {
    error!(field = %key, "operation on unregistered field");
    FormError::UnknownField(key)
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
