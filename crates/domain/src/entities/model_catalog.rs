//! Model catalog - the model list a session offers and its current selection

use serde::{Deserialize, Serialize};

use crate::{errors::DomainError, value_objects::ModelName};

/// Locally available models plus the session's selection.
///
/// The selection always names a listed model, or is `None` when the list is
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<String>,
    selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preferred: Option<String>,
}

impl ModelCatalog {
    /// Create an empty catalog with an optional preferred model
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            models: Vec::new(),
            selected: None,
            preferred: preferred.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Create a catalog and populate it with an initial listing
    pub fn with_models(preferred: Option<String>, models: Vec<String>) -> Self {
        let mut catalog = Self::new(preferred);
        catalog.replace(models, None);
        catalog
    }

    /// Replace the listing and recompute the selection.
    ///
    /// Precedence: preferred model, then `focus` (e.g. a just-pulled model),
    /// then the current selection, then the first listed model.
    pub fn replace(&mut self, models: Vec<String>, focus: Option<&str>) {
        let listed = |name: &str| models.iter().any(|m| m == name);

        let selected = self
            .preferred
            .as_deref()
            .filter(|p| listed(*p))
            .or_else(|| focus.filter(|f| listed(*f)))
            .or_else(|| self.selected.as_deref().filter(|s| listed(*s)))
            .map(str::to_string)
            .or_else(|| models.first().cloned());

        self.models = models;
        self.selected = selected;
    }

    /// Select a listed model
    pub fn select(&mut self, name: &str) -> Result<(), DomainError> {
        let name = name.trim();
        if self.models.iter().any(|m| m == name) {
            self.selected = Some(name.to_string());
            Ok(())
        } else {
            Err(DomainError::not_found("Model", name))
        }
    }

    /// Listed model names
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Name of the selected model
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selected model as a validated name
    pub fn selected_model(&self) -> Option<ModelName> {
        self.selected.as_deref().and_then(|s| ModelName::parse(s).ok())
    }

    /// Preferred model, if configured
    pub fn preferred(&self) -> Option<&str> {
        self.preferred.as_deref()
    }

    /// Whether no models are listed
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
