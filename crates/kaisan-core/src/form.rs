//! The view-facing side of a page: its editable fields and the one-line
//! message it shows after an action.

// ─── Flash message ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
  Success,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
  pub text: String,
  pub kind: FlashKind,
}

impl Flash {
  pub fn success(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: FlashKind::Success,
    }
  }

  pub fn error(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: FlashKind::Error,
    }
  }

  pub fn is_error(&self) -> bool { self.kind == FlashKind::Error }
}

/// Request state shared by every page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStatus {
  /// A remote call is in flight; further submits are ignored.
  pub loading: bool,
  pub flash:   Option<Flash>,
}

impl PageStatus {
  /// Enter the loading state. Returns `false` when a request is already in
  /// flight, in which case the caller must not issue another.
  pub fn begin(&mut self) -> bool {
    if self.loading {
      return false;
    }
    self.loading = true;
    true
  }

  pub fn succeed(&mut self, text: impl Into<String>) {
    self.loading = false;
    self.flash = Some(Flash::success(text));
  }

  pub fn fail(&mut self, text: impl Into<String>) {
    self.loading = false;
    self.flash = Some(Flash::error(text));
  }

  /// Show a validation error. A request already in flight stays in flight.
  pub fn reject(&mut self, text: impl Into<String>) { self.flash = Some(Flash::error(text)); }

  pub fn finish(&mut self) { self.loading = false; }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Multiline,
  /// Rendered masked.
  Secret,
  /// Shown as plain text, never focusable.
  ReadOnly,
  /// Shown as an input, but greyed out and never focusable.
  Disabled,
}

impl FieldKind {
  pub fn is_editable(self) -> bool { matches!(self, Self::Text | Self::Multiline | Self::Secret) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView<'a> {
  pub label:       &'static str,
  pub value:       &'a str,
  pub kind:        FieldKind,
  pub placeholder: &'static str,
}

impl<'a> FieldView<'a> {
  pub fn new(label: &'static str, value: &'a str, kind: FieldKind) -> Self {
    Self {
      label,
      value,
      kind,
      placeholder: "",
    }
  }

  pub fn placeholder(mut self, placeholder: &'static str) -> Self {
    self.placeholder = placeholder;
    self
  }
}

/// A page's editable surface. Indices refer to positions in
/// [`Form::fields`]; `set_field` applies the field's input filter and may
/// refuse the value, leaving the field unchanged.
pub trait Form {
  fn fields(&self) -> Vec<FieldView<'_>>;

  fn set_field(&mut self, index: usize, value: String);
}

pub fn is_blank(value: &str) -> bool { value.trim().is_empty() }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn begin_refuses_while_loading() {
    let mut status = PageStatus::default();
    assert!(status.begin());
    assert!(!status.begin());
    status.fail("boom");
    assert!(!status.loading);
    assert!(status.flash.as_ref().is_some_and(Flash::is_error));
    assert!(status.begin());
  }

  #[test]
  fn validation_errors_leave_a_request_in_flight() {
    let mut status = PageStatus::default();
    assert!(status.begin());
    status.reject("campo vazio");
    assert!(status.loading);
    assert!(status.flash.as_ref().is_some_and(Flash::is_error));
    assert!(!status.begin());
  }
}
