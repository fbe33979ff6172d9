// Thread-safe store of secret values, replacing them with `***` in any
// text the agent writes to a log. Shared between the output scanner and the
// execution context, hence the internal lock.

use parking_lot::RwLock;
use std::sync::Arc;

/// Replacement text written in place of a registered secret.
const MASK_HINT: &str = "***";

/// A thread-safe secret masker.
///
/// Clones share the same underlying store, so a mask added while a step is
/// running is visible to every writer immediately.
#[derive(Debug, Clone, Default)]
pub struct SecretMasker {
    inner: Arc<RwLock<MaskerInner>>,
}

#[derive(Debug, Default)]
struct MaskerInner {
    /// Registered secret values, longest first so that a secret containing
    /// another secret is replaced whole rather than in fragments.
    secrets: Vec<String>,
    shortest: usize,
}

impl SecretMasker {
    /// Create an empty masker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value to be masked. Empty and whitespace-only values are
    /// ignored; duplicates are stored once.
    pub fn add_value(&self, secret: &str) {
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            return;
        }

        let mut inner = self.inner.write();
        if inner.secrets.iter().any(|s| s == trimmed) {
            return;
        }
        inner.secrets.push(trimmed.to_string());
        inner.secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        inner.shortest = inner.secrets.iter().map(String::len).min().unwrap_or(0);
        tracing::trace!(target: "masker", "registered secret value ({} chars)", trimmed.len());
    }

    /// Replace every registered secret occurring in `input` with `***`.
    pub fn mask(&self, input: &str) -> String {
        let inner = self.inner.read();
        if inner.secrets.is_empty() || input.len() < inner.shortest {
            return input.to_string();
        }

        let mut masked = input.to_string();
        for secret in &inner.secrets {
            if masked.contains(secret.as_str()) {
                masked = masked.replace(secret.as_str(), MASK_HINT);
            }
        }
        masked
    }

    /// Number of registered secrets.
    pub fn count(&self) -> usize {
        self.inner.read().secrets.len()
    }
}
