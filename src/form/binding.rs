use super::controller::{FieldKey, FieldMeta, FormController, FormResult, FormSnapshot};
use super::rules::ValidationFailure;
use super::validation::{FieldLens, ValidationRun};
use super::value::FromInput;

/// What [`FormController::register`] hands to the view for one field.
#[derive(Clone)]
pub struct FieldBinding<T, L>
where
    T: Clone + Send + Sync + 'static,
{
    controller: FormController<T>,
    lens: L,
}

impl<T, L> FieldBinding<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: FieldLens<T>,
{
    pub(super) fn new(controller: FormController<T>, lens: L) -> Self {
        Self { controller, lens }
    }

    pub fn key(&self) -> FieldKey {
        self.lens.key()
    }

    pub fn lens(&self) -> L {
        self.lens
    }

    pub fn value(&self) -> FormResult<L::Value> {
        self.controller.value(self.lens)
    }

    pub fn meta(&self) -> FormResult<FieldMeta> {
        self.controller.field_meta(self.lens)
    }

    pub fn error(&self) -> FormResult<Option<ValidationFailure>> {
        Ok(self.meta()?.error)
    }

    pub fn set(&self, value: L::Value) -> FormResult<Option<ValidationRun<T>>> {
        self.controller.set_value(self.lens, value)
    }

    /// Feeds raw widget text into the field.
    pub fn input(&self, raw: &str) -> FormResult<Option<ValidationRun<T>>>
    where
        L::Value: FromInput,
    {
        self.controller.set_input(self.lens, raw)
    }

    pub fn blur(&self) -> FormResult<Option<ValidationRun<T>>> {
        self.controller.mark_touched(self.lens)
    }
}

/// One rendered frame of an attached view.
#[derive(Clone, Debug)]
pub struct RenderFrame<T> {
    pub render_count: u64,
    pub snapshot: FormSnapshot<T>,
}

impl<T> RenderFrame<T> {
    pub fn error_message(&self, key: FieldKey) -> Option<&str> {
        self.snapshot.error(key).map(ValidationFailure::message)
    }

    pub fn submit_enabled(&self) -> bool {
        self.snapshot.can_submit
    }
}

/// A view attached to a controller. Each view counts its own renders.
pub struct FormView<T>
where
    T: Clone + Send + Sync + 'static,
{
    controller: FormController<T>,
    render_count: u64,
}

impl<T> FormView<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn render(&mut self) -> FormResult<RenderFrame<T>> {
        let snapshot = self.controller.snapshot()?;
        self.render_count += 1;
        Ok(RenderFrame {
            render_count: self.render_count,
            snapshot,
        })
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }
}

impl<T> FormController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn attach_view(&self) -> FormView<T> {
        FormView {
            controller: self.clone(),
            render_count: 0,
        }
    }

    pub fn error_message<L>(&self, lens: L) -> FormResult<Option<String>>
    where
        L: FieldLens<T>,
    {
        Ok(self.field_meta(lens)?.error.map(|failure| failure.message))
    }
}
