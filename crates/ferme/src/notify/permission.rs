//! Notification permission gate.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::{PermissionStore, StorageResult};

/// The user's decision about task notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// Never asked.
    #[default]
    Default,
    /// Notifications are disabled on this host.
    Unsupported,
}

impl NotificationPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Default => "default",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Asks the user whether task notifications may be shown.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn ask(&self) -> bool;
}

/// A prompt with a predetermined answer, for answers collected elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl PermissionPrompt for FixedAnswer {
    async fn ask(&self) -> bool {
        self.0
    }
}

/// Asks on the controlling terminal. Anything but yes is a refusal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn ask(&self) -> bool {
        let answer = tokio::task::spawn_blocking(|| {
            print!("Autoriser les rappels de tâches ? [o/N] ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read permission answer");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Permission prompt task failed");
                false
            }
        }
    }
}

fn is_yes(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "o" | "oui" | "y" | "yes"
    )
}

// ============================================================================
// PermissionGate
// ============================================================================

/// Shared, optionally persisted permission state.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct PermissionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    state: RwLock<NotificationPermission>,
    store: Option<Arc<dyn PermissionStore>>,
    /// Held while a decision is written, never across a prompt.
    decision: Mutex<()>,
}

impl PermissionGate {
    /// In-memory gate starting at `initial`.
    pub fn new(initial: NotificationPermission) -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: RwLock::new(initial),
                store: None,
                decision: Mutex::new(()),
            }),
        }
    }

    /// Gate for a host where notifications are disabled.
    pub fn unsupported() -> Self {
        Self::new(NotificationPermission::Unsupported)
    }

    /// Load the persisted decision.
    ///
    /// When `supported` is false the store is not consulted and the gate
    /// stays `unsupported` for its whole life.
    pub async fn load(store: Arc<dyn PermissionStore>, supported: bool) -> StorageResult<Self> {
        if !supported {
            return Ok(Self::unsupported());
        }

        let state = match store.load().await? {
            Some(NotificationPermission::Unsupported) | None => NotificationPermission::Default,
            Some(permission) => permission,
        };
        tracing::debug!(permission = %state, "Loaded notification permission");

        Ok(Self {
            inner: Arc::new(GateInner {
                state: RwLock::new(state),
                store: Some(store),
                decision: Mutex::new(()),
            }),
        })
    }

    pub fn current(&self) -> NotificationPermission {
        *self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_granted(&self) -> bool {
        self.current() == NotificationPermission::Granted
    }

    /// Ask for permission if the user was never asked.
    ///
    /// Returns whether notifications are allowed afterwards. A previous
    /// refusal is final until [`reset`](Self::reset). A decision made
    /// elsewhere while the prompt is open wins over the prompt's answer.
    pub async fn request(&self, prompt: &dyn PermissionPrompt) -> StorageResult<bool> {
        if self.current() != NotificationPermission::Default {
            return Ok(self.is_granted());
        }

        let granted = prompt.ask().await;

        let _decision = self.inner.decision.lock().await;
        if self.current() != NotificationPermission::Default {
            tracing::debug!(permission = %self.current(), "Permission decided while prompting");
            return Ok(self.is_granted());
        }
        let decision = if granted {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        self.set(decision).await?;
        tracing::info!(permission = %decision, "Notification permission decided");
        Ok(granted)
    }

    /// Turn notifications off.
    pub async fn revoke(&self) -> StorageResult<NotificationPermission> {
        self.transition(NotificationPermission::Denied).await
    }

    /// Forget the decision so the user is asked again.
    pub async fn reset(&self) -> StorageResult<NotificationPermission> {
        self.transition(NotificationPermission::Default).await
    }

    async fn transition(
        &self,
        target: NotificationPermission,
    ) -> StorageResult<NotificationPermission> {
        let _decision = self.inner.decision.lock().await;
        if self.current() == NotificationPermission::Unsupported {
            return Ok(NotificationPermission::Unsupported);
        }
        self.set(target).await?;
        tracing::info!(permission = %target, "Notification permission changed");
        Ok(target)
    }

    async fn set(&self, permission: NotificationPermission) -> StorageResult<()> {
        // Memory only changes once the store accepted it.
        if let Some(store) = &self.inner.store {
            store.save(permission).await?;
        }
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = permission;
        Ok(())
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("state", &self.current())
            .field("persisted", &self.inner.store.is_some())
            .finish()
    }
}
