//! Core enums shared across the buffer: error taxonomy, processing outcomes
//! and worker roles.

/// Error category classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operator misconfiguration detected at startup
    Configuration,
    /// Host memory telemetry could not size the buffer
    Introspection,
    /// Cooperative shutdown reached a blocked wait
    Interruption,
    /// Internal state could not be reached or was inconsistent
    InvalidState,
    /// Reading configuration from disk failed
    Io,
}

/// Recovery hint for buffer operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Keep the surrounding loop alive, the caller decides whether to stop
    Continue,
    /// Abort service bring-up
    AbortStartup,
}

/// Buffer operation error types
///
/// Configuration and heap-introspection failures are fatal at startup.
/// `Interrupted` is only ever raised by cooperative shutdown and is handled
/// locally by the worker shell.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferOperationError {
    InvalidConfiguration(String),
    HeapIntrospection(String),
    Interrupted,
    InvalidState(String),
    WorkerSpawn(String),
    ConfigIo(String),
    ConfigParse(String),
}

impl std::fmt::Display for BufferOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferOperationError::InvalidConfiguration(msg) => {
                write!(f, "Buffer properties initialization error: {}", msg)
            }
            BufferOperationError::HeapIntrospection(msg) => {
                write!(f, "Heap introspection failed: {}", msg)
            }
            BufferOperationError::Interrupted => write!(f, "Interrupted while waiting"),
            BufferOperationError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            BufferOperationError::WorkerSpawn(msg) => {
                write!(f, "Failed to spawn worker thread: {}", msg)
            }
            BufferOperationError::ConfigIo(msg) => write!(f, "Configuration I/O error: {}", msg),
            BufferOperationError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
        }
    }
}

impl std::error::Error for BufferOperationError {}

impl BufferOperationError {
    /// Create configuration error
    #[inline(always)]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create invalid state error
    #[inline(always)]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Error category for classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfiguration(_) | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::HeapIntrospection(_) => ErrorCategory::Introspection,
            Self::Interrupted => ErrorCategory::Interruption,
            Self::InvalidState(_) | Self::WorkerSpawn(_) => ErrorCategory::InvalidState,
            Self::ConfigIo(_) => ErrorCategory::Io,
        }
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self.category() {
            ErrorCategory::Interruption => RecoveryHint::Continue,
            _ => RecoveryHint::AbortStartup,
        }
    }

    /// Whether the error must abort service bring-up
    pub fn is_fatal(&self) -> bool {
        self.recovery_hint() == RecoveryHint::AbortStartup
    }
}

/// Result of handing one candidate element to a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Element consumed, cursor may advance onto it
    Handled,
    /// Element not ready for this consumer yet, cursor stays put
    NotYet,
}

/// Result of one drain invocation of a scan engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Cursor already at the newest element, nothing was processed
    CaughtUp,
    /// Exactly one element was processed and the cursor advanced
    Advanced,
}

/// Responsibility bound to a worker shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Indexer,
    Analyzer,
    Evictor,
}

impl WorkerRole {
    /// Stable name used for thread names and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Indexer => "indexer",
            WorkerRole::Analyzer => "analyzer",
            WorkerRole::Evictor => "evictor",
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
