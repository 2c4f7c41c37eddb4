// Declarative notification categories and the actions they offer the user
// The platform presentation system keeps only the most recent registration, so
// the registry always replaces the whole set atomically

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::dispatcher::NotificationPresenter;

/// Category of referee-invitation notifications (accept / decline / defer)
pub const REFEREE_INVITATION_CATEGORY: &str = "referee_invitation";

/// Category of generic application notifications (no actions)
pub const CUSTOM_NOTIFICATION_CATEGORY: &str = "custom_notification";

/// Behavior options of a single notification action
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOptions {
    pub authentication_required: bool,
    pub destructive: bool,
    /// Whether activating the action brings the application to the foreground
    pub foreground: bool,
}

/// One named action a delivered notification offers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryAction {
    pub id: String,
    /// Display label, localized for the product's audience
    pub label: String,
    pub options: ActionOptions,
}

impl CategoryAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            options: ActionOptions::default(),
        }
    }

    pub fn destructive(mut self) -> Self {
        self.options.destructive = true;
        self
    }

    pub fn foreground(mut self) -> Self {
        self.options.foreground = true;
        self
    }
}

/// Preview-redaction behavior of a category
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOptions {
    /// Body placeholder shown while previews are hidden on the lock screen
    pub hidden_preview_placeholder: Option<String>,
    /// Summary format for grouped notifications, `%u` expanding to the count
    pub summary_format: Option<String>,
    pub show_title_in_hidden_previews: bool,
    pub show_subtitle_in_hidden_previews: bool,
}

/// Static declarative entity describing one class of notifications.
///
/// Registered once at process start; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationCategory {
    pub identifier: String,
    pub actions: Vec<CategoryAction>,
    pub options: CategoryOptions,
}

impl NotificationCategory {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            actions: Vec::new(),
            options: CategoryOptions::default(),
        }
    }

    pub fn with_action(mut self, action: CategoryAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_options(mut self, options: CategoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn find_action(&self, action_id: &str) -> Option<&CategoryAction> {
        self.actions.iter().find(|action| action.id == action_id)
    }
}

/// Process-wide registry of the active category set.
///
/// Mutated only through [`register`](CategoryRegistry::register); read freely
/// by every monitor and the response router.
pub struct CategoryRegistry {
    presenter: Arc<dyn NotificationPresenter>,
    categories: RwLock<HashMap<String, NotificationCategory>>,
}

impl CategoryRegistry {
    pub fn new(presenter: Arc<dyn NotificationPresenter>) -> Self {
        Self {
            presenter,
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the whole active category set and push it to the platform.
    ///
    /// There is no removal API; re-register the full set to change it.
    pub async fn register(&self, set: Vec<NotificationCategory>) {
        {
            let mut categories = self.categories.write();
            categories.clear();
            for category in &set {
                categories.insert(category.identifier.clone(), category.clone());
            }
        }
        tracing::debug!(count = set.len(), "notification categories registered");
        self.presenter.replace_categories(set).await;
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.categories.read().contains_key(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<NotificationCategory> {
        self.categories.read().get(identifier).cloned()
    }

    /// Find the category that declared an action id, together with the action
    pub fn resolve_action(
        &self,
        action_id: &str,
    ) -> Option<(NotificationCategory, CategoryAction)> {
        let categories = self.categories.read();
        categories.values().find_map(|category| {
            category
                .find_action(action_id)
                .map(|action| (category.clone(), action.clone()))
        })
    }

    /// The category set the Matchday apps register at startup
    pub fn default_set() -> Vec<NotificationCategory> {
        vec![
            NotificationCategory::new(REFEREE_INVITATION_CATEGORY)
                .with_action(CategoryAction::new("accept", "Zusagen").foreground())
                .with_action(CategoryAction::new("decline", "Absagen").destructive())
                .with_action(CategoryAction::new("later", "Später"))
                .with_options(CategoryOptions {
                    hidden_preview_placeholder: Some("Schiedsrichter-Einladung".to_string()),
                    summary_format: Some("%u neue Einladungen".to_string()),
                    show_title_in_hidden_previews: true,
                    show_subtitle_in_hidden_previews: true,
                }),
            NotificationCategory::new(CUSTOM_NOTIFICATION_CATEGORY),
        ]
    }
}
