//! Transport error classification.
//!
//! Provider-specific error codes are parsed once into [`TransportErrorKind`];
//! everything downstream matches on the enum. Supporting a new code means
//! adding one variant and one row in [`TransportErrorKind::family`].

use std::fmt;

/// Errors a segmented transport can raise, by code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    ManifestLoad,
    ManifestLoadTimeout,
    ManifestParsing,
    LevelLoad,
    LevelLoadTimeout,
    FragLoad,
    FragLoadTimeout,
    KeyLoad,
    KeyLoadTimeout,
    FragParsing,
    FragDecrypt,
    BufferAppend,
    BufferAppending,
    BufferAddCodec,
    BufferIncompatibleCodecs,
    ManifestIncompatibleCodecs,
    BufferStalled,
    BufferFull,
    BufferSeekOverHole,
    BufferNudgeOnStall,
    InternalException,
    Other(String),
}

/// Broad source of an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindFamily {
    Network,
    Media,
    Other,
}

impl TransportErrorKind {
    /// Parse a provider error code. Unknown codes are kept verbatim.
    pub fn from_code(code: &str) -> Self {
        match code {
            "manifestLoadError" => Self::ManifestLoad,
            "manifestLoadTimeOut" => Self::ManifestLoadTimeout,
            "manifestParsingError" => Self::ManifestParsing,
            "levelLoadError" => Self::LevelLoad,
            "levelLoadTimeOut" => Self::LevelLoadTimeout,
            "fragLoadError" => Self::FragLoad,
            "fragLoadTimeOut" => Self::FragLoadTimeout,
            "keyLoadError" => Self::KeyLoad,
            "keyLoadTimeOut" => Self::KeyLoadTimeout,
            "fragParsingError" => Self::FragParsing,
            "fragDecryptError" => Self::FragDecrypt,
            "bufferAppendError" => Self::BufferAppend,
            "bufferAppendingError" => Self::BufferAppending,
            "bufferAddCodecError" => Self::BufferAddCodec,
            "bufferIncompatibleCodecsError" => Self::BufferIncompatibleCodecs,
            "manifestIncompatibleCodecsError" => Self::ManifestIncompatibleCodecs,
            "bufferStalledError" => Self::BufferStalled,
            "bufferFullError" => Self::BufferFull,
            "bufferSeekOverHole" => Self::BufferSeekOverHole,
            "bufferNudgeOnStall" => Self::BufferNudgeOnStall,
            "internalException" => Self::InternalException,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::ManifestLoad => "manifestLoadError",
            Self::ManifestLoadTimeout => "manifestLoadTimeOut",
            Self::ManifestParsing => "manifestParsingError",
            Self::LevelLoad => "levelLoadError",
            Self::LevelLoadTimeout => "levelLoadTimeOut",
            Self::FragLoad => "fragLoadError",
            Self::FragLoadTimeout => "fragLoadTimeOut",
            Self::KeyLoad => "keyLoadError",
            Self::KeyLoadTimeout => "keyLoadTimeOut",
            Self::FragParsing => "fragParsingError",
            Self::FragDecrypt => "fragDecryptError",
            Self::BufferAppend => "bufferAppendError",
            Self::BufferAppending => "bufferAppendingError",
            Self::BufferAddCodec => "bufferAddCodecError",
            Self::BufferIncompatibleCodecs => "bufferIncompatibleCodecsError",
            Self::ManifestIncompatibleCodecs => "manifestIncompatibleCodecsError",
            Self::BufferStalled => "bufferStalledError",
            Self::BufferFull => "bufferFullError",
            Self::BufferSeekOverHole => "bufferSeekOverHole",
            Self::BufferNudgeOnStall => "bufferNudgeOnStall",
            Self::InternalException => "internalException",
            Self::Other(code) => code,
        }
    }

    fn family(&self) -> KindFamily {
        match self {
            Self::ManifestLoad
            | Self::ManifestLoadTimeout
            | Self::ManifestParsing
            | Self::LevelLoad
            | Self::LevelLoadTimeout
            | Self::FragLoad
            | Self::FragLoadTimeout
            | Self::KeyLoad
            | Self::KeyLoadTimeout => KindFamily::Network,

            Self::FragParsing
            | Self::FragDecrypt
            | Self::BufferAppend
            | Self::BufferAppending
            | Self::BufferAddCodec
            | Self::BufferIncompatibleCodecs
            | Self::ManifestIncompatibleCodecs
            | Self::BufferStalled
            | Self::BufferFull
            | Self::BufferSeekOverHole
            | Self::BufferNudgeOnStall => KindFamily::Media,

            Self::InternalException | Self::Other(_) => KindFamily::Other,
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// The transport gave up on its own retries
    pub fatal: bool,
    pub details: String,
}

impl TransportError {
    pub fn fatal(kind: TransportErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    pub fn warning(kind: TransportErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: false,
            details: details.into(),
        }
    }

    /// Build from a raw provider code.
    pub fn from_code(code: &str, fatal: bool, details: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::from_code(code),
            fatal,
            details: details.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.fatal { "fatal" } else { "warning" };
        write!(f, "{} ({}): {}", self.kind, severity, self.details)
    }
}

impl std::error::Error for TransportError {}

/// How serious an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; the transport heals it by itself
    Recoverable,
    /// The data source is unreachable
    Network,
    /// The decoder is in an unrecoverable state
    Media,
    /// Fatal with no known remedy
    Unclassified,
}

/// What to do about a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Ignore,
    RestartLoad,
    RecoverMedia,
    Escalate,
}

impl ErrorClass {
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            ErrorClass::Recoverable => RecoveryAction::Ignore,
            ErrorClass::Network => RecoveryAction::RestartLoad,
            ErrorClass::Media => RecoveryAction::RecoverMedia,
            ErrorClass::Unclassified => RecoveryAction::Escalate,
        }
    }

    /// User-facing message when this class ends playback.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorClass::Network => "network error loading video",
            ErrorClass::Media => "media format not supported",
            ErrorClass::Recoverable | ErrorClass::Unclassified => "video playback failed",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Recoverable => "recoverable",
            ErrorClass::Network => "network",
            ErrorClass::Media => "media",
            ErrorClass::Unclassified => "unclassified",
        }
    }
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Ignore => "ignore",
            RecoveryAction::RestartLoad => "restart_load",
            RecoveryAction::RecoverMedia => "recover_media",
            RecoveryAction::Escalate => "escalate",
        }
    }
}

/// Classify a transport error.
pub fn classify(err: &TransportError) -> ErrorClass {
    match (err.fatal, err.kind.family()) {
        (false, _) => ErrorClass::Recoverable,
        (true, KindFamily::Network) => ErrorClass::Network,
        (true, KindFamily::Media) => ErrorClass::Media,
        (true, KindFamily::Other) => ErrorClass::Unclassified,
    }
}
