pub use crate::form::{
    FieldBinding, FieldKey, FieldLens, FieldOutcome, FieldRules, FormController, FormError,
    FormEvent, FormModel, FormOptions, FormResult, FormSnapshot, FormView, SubmitOutcome,
    ValidationFailure, ValidationMode,
};
pub use crate::remote::{AvailabilityCheck, RemoteCheckError, UsersApi, UsersApiConfig};
pub use crate::signup::{SignupForm, SignupPage};
