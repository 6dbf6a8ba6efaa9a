//! Design serial type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Serial`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// The input string is empty (or only whitespace).
    #[error("design serial cannot be empty")]
    Empty,
    /// The input string is shorter than the editor ever issues.
    #[error("design serial must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
}

/// Opaque identifier for a design or a template, assigned by the editor.
///
/// Serials are not globally unique across products; the design store scopes
/// them by product id.
///
/// ## Constraints
///
/// - Leading and trailing whitespace is trimmed
/// - At least 5 characters; nothing else is checked since the editor's
///   format is opaque
///
/// ## Examples
///
/// ```
/// use loose_gallery_core::Serial;
///
/// assert!(Serial::parse("DSX123456").is_ok());
/// assert!(Serial::parse("  DSX123456 ").is_ok());
///
/// assert!(Serial::parse("").is_err());      // empty
/// assert!(Serial::parse("AB12").is_err());  // too short
/// assert!(Serial::parse("DSX 123456").is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

impl Serial {
    /// Minimum length of a serial issued by the editor.
    pub const MIN_LENGTH: usize = 5;

    /// Parse a `Serial` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or shorter than
    /// [`Self::MIN_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, SerialError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(SerialError::Empty);
        }

        let len = s.chars().count();
        if len < Self::MIN_LENGTH {
            return Err(SerialError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the serial as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Serial` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Serial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Serial {
    type Error = SerialError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Serial {
    type Error = SerialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}
