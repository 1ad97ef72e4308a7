use std::borrow::Cow;
use std::str::FromStr;

use rust_decimal::Decimal;

/// A value a form field can hold.
///
/// `is_blank` drives the presence rule and `as_text` is what pattern rules
/// match against.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be stored in a form field",
    label = "field type does not implement `FieldValue`",
    note = "form fields hold `String` or `Option<Decimal>`; other types need a `FieldValue` impl"
)]
pub trait FieldValue: Clone + PartialEq + Send + Sync + 'static {
    fn is_blank(&self) -> bool;
    fn as_text(&self) -> Cow<'_, str>;
}

/// Coercion from the raw string an input widget produces.
pub trait FromInput: FieldValue {
    fn from_input(raw: &str) -> Self;
}

impl FieldValue for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn as_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl FromInput for String {
    fn from_input(raw: &str) -> Self {
        raw.to_owned()
    }
}

// `None` is the numeric field's "not a number": empty or unparsable input.
impl FieldValue for Option<Decimal> {
    fn is_blank(&self) -> bool {
        self.is_none()
    }

    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Some(value) => Cow::Owned(value.to_string()),
            None => Cow::Borrowed(""),
        }
    }
}

impl FromInput for Option<Decimal> {
    fn from_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .ok()
    }
}
