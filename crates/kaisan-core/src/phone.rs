//! Phone-number formatting.
//!
//! Pure functions only. Formatted local numbers carry at most one hyphen,
//! placed before the last four digits; every other character is a digit.

/// Brazil. Fixed on the WhatsApp page, pre-filled on the reset-memory page.
pub const DEFAULT_COUNTRY_CODE: &str = "55";

/// Stored numbers at least this long carry country and city code prefixes.
const PREFIXED_MIN_LEN: usize = 12;

/// Keep ASCII digits only.
pub fn strip_formatting(input: &str) -> String {
  input.chars().filter(char::is_ascii_digit).collect()
}

/// Render the digits of `input` as `prefix-last4`.
///
/// Four digits or fewer are returned bare; anything that is not a digit is
/// dropped first.
///
/// ```
/// # use kaisan_core::phone::format_local_number;
/// assert_eq!(format_local_number("5591234567"), "559123-4567");
/// assert_eq!(format_local_number("123"), "123");
/// ```
pub fn format_local_number(input: &str) -> String {
  let digits = strip_formatting(input);
  if digits.len() <= 4 {
    return digits;
  }
  let (prefix, last4) = digits.split_at(digits.len() - 4);
  format!("{prefix}-{last4}")
}

/// City (area) code for the WhatsApp page: digits only, cut to two.
pub fn sanitize_city_code(input: &str) -> String {
  input.chars().filter(char::is_ascii_digit).take(2).collect()
}

/// Digits of `input`, or `None` when there are more than `max` of them.
///
/// Over-long input is refused outright rather than truncated, so the field
/// keeps its previous value.
pub fn accept_digits(input: &str, max: usize) -> Option<String> {
  let digits = strip_formatting(input);
  (digits.len() <= max).then_some(digits)
}

// ─── WhatsApp number ─────────────────────────────────────────────────────────

/// A WhatsApp number split into the parts the form edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsappNumber {
  pub country_code: String,
  pub city_code:    String,
  /// Formatted local part, e.g. `98765-4321`.
  pub local:        String,
}

impl Default for WhatsappNumber {
  fn default() -> Self {
    Self {
      country_code: DEFAULT_COUNTRY_CODE.into(),
      city_code:    String::new(),
      local:        String::new(),
    }
  }
}

impl WhatsappNumber {
  /// Split a stored number. Numbers of twelve digits or more are read as
  /// `CC AA local`; shorter values land in the local part unchanged.
  pub fn parse_stored(stored: &str) -> Self {
    let all_digits = !stored.is_empty() && stored.bytes().all(|b| b.is_ascii_digit());
    if all_digits && stored.len() >= PREFIXED_MIN_LEN {
      Self {
        country_code: stored[..2].to_string(),
        city_code:    stored[2..4].to_string(),
        local:        format_local_number(&stored[4..]),
      }
    } else {
      Self {
        local: stored.to_string(),
        ..Self::default()
      }
    }
  }

  /// The digits-only form written back to the store.
  pub fn to_stored(&self) -> String {
    format!(
      "{}{}{}",
      self.country_code,
      self.city_code,
      strip_formatting(&self.local)
    )
  }

  pub fn is_complete(&self) -> bool {
    !self.city_code.trim().is_empty() && !self.local.trim().is_empty()
  }
}
