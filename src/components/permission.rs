// Tiered notification-permission negotiation against the platform settings store
// A denial is an expected steady state, not a fault: everything here returns
// PermissionState values and never errors

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Resolved notification-permission state.
///
/// Ordered from least to most authorization; the negotiator only ever moves the
/// cached state upward within one session (`Denied` outranks `Undetermined`
/// because it is a resolved answer, even though it grants nothing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// The user has never been asked
    Undetermined,
    /// The user refused; terminal until changed in system settings
    Denied,
    /// Notifications may be presented
    AuthorizedStandard,
    /// Notifications may additionally break through a quiet/focus state
    AuthorizedTimeSensitive,
}

impl PermissionState {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::AuthorizedStandard | Self::AuthorizedTimeSensitive)
    }

    /// Whether a permission prompt is still worth showing
    pub fn can_request(&self) -> bool {
        matches!(self, Self::Undetermined)
    }
}

/// Permission tier a caller can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    Standard,
    TimeSensitive,
}

/// Seam onto the platform's notification settings store.
///
/// `request_authorization` may suspend on a user-facing system prompt of
/// unbounded duration; callers must not block monitor operations on it.
pub trait NotificationSettings: Send + Sync {
    /// Read the currently recorded authorization without prompting
    fn read_authorization(&self) -> Pin<Box<dyn Future<Output = PermissionState> + Send + '_>>;

    /// Prompt the user for full authorization; returns whether it was granted
    fn request_authorization(
        &self,
        time_sensitive: bool,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Whether this platform can distinguish the time-sensitive tier at all
    fn supports_time_sensitive(&self) -> bool;
}

/// Owns acquisition and inspection of tiered notification permissions.
///
/// The resolved state is cached so monitors and the dispatcher can consult it
/// without awaiting an in-flight negotiation.
pub struct PermissionNegotiator {
    settings: Arc<dyn NotificationSettings>,
    state: RwLock<PermissionState>,
}

impl PermissionNegotiator {
    pub fn new(settings: Arc<dyn NotificationSettings>) -> Self {
        Self {
            settings,
            state: RwLock::new(PermissionState::Undetermined),
        }
    }

    /// Last resolved state; cheap, lock-free of any platform call
    pub fn current(&self) -> PermissionState {
        *self.state.read()
    }

    /// Ensure the requested tier is negotiated. Idempotent and safe to call
    /// repeatedly; never errors.
    ///
    /// When the platform cannot distinguish the time-sensitive tier the result
    /// degrades to [`PermissionState::AuthorizedStandard`] instead of failing,
    /// and a denial is returned as-is without re-prompting.
    pub async fn ensure_permission(&self, tier: PermissionTier) -> PermissionState {
        let recorded = self.settings.read_authorization().await;

        let resolved = match recorded {
            PermissionState::Denied => PermissionState::Denied,
            state if state.is_authorized() => state,
            _ => {
                let time_sensitive = matches!(tier, PermissionTier::TimeSensitive)
                    && self.settings.supports_time_sensitive();
                if self.settings.request_authorization(time_sensitive).await {
                    self.settings.read_authorization().await
                } else {
                    PermissionState::Denied
                }
            }
        };

        let resolved = self.degrade(resolved);
        let effective = self.remember(resolved);

        match effective {
            PermissionState::Denied => {
                tracing::info!(tier = ?tier, "notification permission denied, deliveries will be suppressed");
            }
            state => {
                tracing::debug!(tier = ?tier, state = ?state, "notification permission resolved");
            }
        }

        effective
    }

    /// Canonical degrade policy: a time-sensitive grant on a platform that
    /// cannot distinguish the tier collapses to standard authorization.
    fn degrade(&self, resolved: PermissionState) -> PermissionState {
        if resolved == PermissionState::AuthorizedTimeSensitive
            && !self.settings.supports_time_sensitive()
        {
            PermissionState::AuthorizedStandard
        } else {
            resolved
        }
    }

    /// Record the resolved state without ever downgrading within this session
    fn remember(&self, resolved: PermissionState) -> PermissionState {
        let mut state = self.state.write();
        *state = (*state).max(resolved);
        *state
    }
}
