//! Status enums for designs, renders and order lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a design lock was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// The remote editor service confirmed the lock.
    Remote,
    /// The remote API has no lock concept; only the local flag is set.
    LocalOnly,
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::LocalOnly => write!(f, "local"),
        }
    }
}

/// Lock state of an ordered design.
///
/// `Unlocked --lock success--> Locked` is the only transition; `Locked` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked {
        /// When the lock succeeded.
        at: DateTime<Utc>,
        /// Whether the editor service enforces the lock too.
        mode: LockMode,
    },
}

impl LockState {
    /// Whether the design is locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// When the design was locked, if it has been.
    #[must_use]
    pub const fn locked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unlocked => None,
            Self::Locked { at, .. } => Some(*at),
        }
    }
}

/// Size hint for design previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSize {
    Thumbnail,
    Small,
    #[default]
    Medium,
    Large,
}

impl std::fmt::Display for PreviewSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thumbnail => write!(f, "thumbnail"),
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
        }
    }
}

impl std::str::FromStr for PreviewSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(Self::Thumbnail),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(format!("invalid preview size: {s}")),
        }
    }
}

/// Output format for high-resolution renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Pdf,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "PNG"),
            Self::Jpg => write!(f, "JPG"),
            Self::Pdf => write!(f, "PDF"),
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "pdf" => Ok(Self::Pdf),
            _ => Err(format!("invalid image format: {s}")),
        }
    }
}

/// Progress of an out-of-band high-resolution render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    InProgress { percent: u8 },
    Ready { url: String },
    Failed { reason: Option<String> },
}

impl ImageStatus {
    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }
}

/// Which lifecycle event asked for an order's designs to be locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeTrigger {
    /// The customer reached the order-received page.
    ThankYou,
    /// The order transitioned to completed.
    Completed,
}

impl std::fmt::Display for FinalizeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThankYou => write!(f, "thank_you"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_state_default_is_unlocked() {
        let state = LockState::default();
        assert!(!state.is_locked());
        assert!(state.locked_at().is_none());
    }

    #[test]
    fn test_locked_state_exposes_timestamp() {
        let at = Utc::now();
        let state = LockState::Locked {
            at,
            mode: LockMode::Remote,
        };
        assert!(state.is_locked());
        assert_eq!(state.locked_at(), Some(at));
    }

    #[test]
    fn test_image_format_parse() {
        assert_eq!("jpeg".parse::<ImageFormat>(), Ok(ImageFormat::Jpg));
        assert_eq!("PDF".parse::<ImageFormat>(), Ok(ImageFormat::Pdf));
        assert!("tiff".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_preview_size_round_trip() {
        for size in [
            PreviewSize::Thumbnail,
            PreviewSize::Small,
            PreviewSize::Medium,
            PreviewSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<PreviewSize>(), Ok(size));
        }
    }

    #[test]
    fn test_image_status_terminal() {
        assert!(!ImageStatus::Pending.is_terminal());
        assert!(!ImageStatus::InProgress { percent: 40 }.is_terminal());
        assert!(
            ImageStatus::Ready {
                url: "https://cdn.example/x.png".to_string()
            }
            .is_terminal()
        );
        assert!(ImageStatus::Failed { reason: None }.is_terminal());
    }

    #[test]
    fn test_lock_mode_display() {
        assert_eq!(LockMode::Remote.to_string(), "remote");
        assert_eq!(LockMode::LocalOnly.to_string(), "local");
    }
}
