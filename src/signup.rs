//! The signup form: user name, email, channel and age.
//!
//! Email runs the longest chain: presence, format, two blocklist predicates
//! and finally a remote availability lookup.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::form::{
    FieldBinding, FieldKey, FieldRules, FormController, FormModel, FormOptions, FormResult,
    SubmitOutcome, ValidationFailure, ValidationMode, Verdict,
};
use crate::remote::{AvailabilityCheck, RemoteCheckError};

pub const USERNAME_REQUIRED: &str = "User name is required";
pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Invalid email format";
pub const EMAIL_ADMIN: &str = "Enter different email adress";
pub const EMAIL_BLOCKED_DOMAIN: &str = "This domain is not supported";
pub const EMAIL_TAKEN: &str = "Email already exist";
pub const CHANNEL_REQUIRED: &str = "Channel is required";
pub const AGE_REQUIRED: &str = "Age is required";

pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const BLOCKED_DOMAIN: &str = "baddomain.com";

#[derive(Clone, Debug, Default, PartialEq, Serialize, FormModel)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub channel: String,
    pub age: Option<Decimal>,
}

pub fn signup_options() -> FormOptions {
    FormOptions {
        validate_mode: ValidationMode::OnTouched,
        ..FormOptions::default()
    }
}

pub fn email_rules<C>(checker: C) -> FormResult<FieldRules<String>>
where
    C: AvailabilityCheck + Clone,
{
    Ok(FieldRules::new()
        .required(EMAIL_REQUIRED)
        .pattern(EMAIL_PATTERN, EMAIL_INVALID)?
        .validate("notAdmin", |value: &String| {
            if value == ADMIN_EMAIL {
                Err(EMAIL_ADMIN.to_owned())
            } else {
                Ok(())
            }
        })
        .validate("notBlackListed", |value: &String| {
            if value.ends_with(BLOCKED_DOMAIN) {
                Err(EMAIL_BLOCKED_DOMAIN.to_owned())
            } else {
                Ok(())
            }
        })
        .validate_async("emailAvailable", move |value: String| {
            let lookup = checker.is_available(value);
            async move {
                let verdict: Verdict = if lookup.await? {
                    Ok(())
                } else {
                    Err(EMAIL_TAKEN.to_owned())
                };
                Ok::<_, RemoteCheckError>(verdict)
            }
        }))
}

/// The controller plus one binding per field, as the view consumes them.
pub struct SignupPage {
    pub controller: FormController<SignupForm>,
    pub username: FieldBinding<SignupForm, SignupFormUsernameLens>,
    pub email: FieldBinding<SignupForm, SignupFormEmailLens>,
    pub channel: FieldBinding<SignupForm, SignupFormChannelLens>,
    pub age: FieldBinding<SignupForm, SignupFormAgeLens>,
}

impl SignupPage {
    pub fn new<C>(checker: C) -> FormResult<Self>
    where
        C: AvailabilityCheck + Clone,
    {
        Self::with_options(checker, signup_options())
    }

    pub fn with_options<C>(checker: C, options: FormOptions) -> FormResult<Self>
    where
        C: AvailabilityCheck + Clone,
    {
        let controller = FormController::new(SignupForm::default(), options);
        let SignupFormBindings {
            username,
            email,
            channel,
            age,
        } = controller.register_all(SignupFormRules {
            username: FieldRules::new().required(USERNAME_REQUIRED),
            email: email_rules(checker)?,
            channel: FieldRules::new().required(CHANNEL_REQUIRED),
            age: FieldRules::new().required(AGE_REQUIRED),
        })?;

        Ok(Self {
            controller,
            username,
            email,
            channel,
            age,
        })
    }

    pub async fn submit(&self) -> FormResult<SubmitOutcome<SignupForm>> {
        self.controller.submit(log_submission, log_errors).await
    }
}

pub fn log_submission(values: &SignupForm) -> Result<(), serde_json::Error> {
    let values = serde_json::to_string(values)?;
    info!(%values, "signup form submitted");
    Ok(())
}

pub fn log_errors(errors: &BTreeMap<FieldKey, ValidationFailure>) {
    for (field, failure) in errors {
        info!(%field, rule = ?failure.rule, message = %failure, "signup form error");
    }
}
