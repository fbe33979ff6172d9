// agent-common: directive wire formats and shared services for the pipeline
// agent. Holds the pieces both the worker engine and its callers need: the
// escape codec, the inline logging-command parser/serializer, and the secret
// masker applied to all log output.

pub mod escape;
pub mod logging_command;
pub mod secret_masker;

// ---------------------------------------------------------------------------
// Re-exports for convenient access
// ---------------------------------------------------------------------------

pub use logging_command::{Command, PropertyBag, LOGGING_COMMAND_PREFIX};
pub use secret_masker::SecretMasker;
