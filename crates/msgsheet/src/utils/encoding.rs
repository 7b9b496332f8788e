use serde::{Deserialize, Serialize};

/// Undo the Latin-1-over-UTF-8 mis-decoding found in chat exports.
///
/// Every UTF-16 code unit is narrowed to its low byte and the resulting byte
/// string is decoded as UTF-8; invalid sequences become U+FFFD. Applying this
/// to text that was never mis-decoded corrupts it, so callers repair a field
/// exactly once, through [`RawText::repaired`].
#[must_use]
pub fn repair(input: &str) -> String {
    let bytes: Vec<u8> = input.encode_utf16().map(|unit| unit as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Export text as it sits on disk, before repair.
///
/// The only way to read the text back out is [`RawText::repaired`], which
/// consumes the value, so a field cannot be repaired twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawText(String);

impl RawText {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Empty text is returned untouched.
    #[must_use]
    pub fn repaired(self) -> String {
        if self.0.is_empty() {
            self.0
        } else {
            repair(&self.0)
        }
    }
}
