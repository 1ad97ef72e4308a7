mod binding;
mod controller;
mod rules;
mod validation;
mod value;


pub use binding::{FieldBinding, FormView, RenderFrame};
pub use controller::{
    FieldKey, FieldMeta, FormController, FormError, FormEvent, FormId, FormOptions, FormResult,
    FormSnapshot, RemoteFailurePolicy, RevalidateMode, SubmitOutcome, SubmitPolicy, SubmitState,
    ValidationMode, ValidationTicket,
};
pub use formkit_derive::FormModel;
pub use rules::{
    FieldRules, REMOTE_UNAVAILABLE_MESSAGE, RemoteVerdict, RuleKind, ValidationFailure, Verdict,
};
pub use validation::{FieldLens, FieldOutcome, FormModel, ValidationRun};
pub use value::{FieldValue, FromInput};
