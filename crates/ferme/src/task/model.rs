//! Task records and their write forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::due::parse_due_date;
use crate::store::{Document, StorageError};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Haute,
    #[default]
    Moyenne,
    Basse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    AFaire,
    EnCours,
    Terminee,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AFaire => "a_faire",
            Self::EnCours => "en_cours",
            Self::Terminee => "terminee",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a_faire" => Ok(Self::AFaire),
            "en_cours" => Ok(Self::EnCours),
            "terminee" => Ok(Self::Terminee),
            other => Err(format!(
                "unknown status '{}' (expected a_faire, en_cours or terminee)",
                other
            )),
        }
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Haute => "haute",
            Self::Moyenne => "moyenne",
            Self::Basse => "basse",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "haute" => Ok(Self::Haute),
            "moyenne" => Ok(Self::Moyenne),
            "basse" => Ok(Self::Basse),
            other => Err(format!(
                "unknown priority '{}' (expected haute, moyenne or basse)",
                other
            )),
        }
    }
}

// ============================================================================
// Task
// ============================================================================

/// A farm to-do item as stored in the `taches` collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub titre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priorite: TaskPriority,
    #[serde(default)]
    pub statut: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorie: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339. Kept as stored; see [`super::due_date`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicule_nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "derniereMAJ",
        skip_serializing_if = "Option::is_none"
    )]
    pub derniere_maj: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_terminee: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.statut == TaskStatus::Terminee
    }
}

// ============================================================================
// Write forms
// ============================================================================

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskForm {
    pub titre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priorite: TaskPriority,
    #[serde(default)]
    pub statut: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_echeance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animal_nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicule_nom: Option<String>,
}

impl TaskForm {
    pub fn new(titre: impl Into<String>) -> Self {
        Self {
            titre: titre.into(),
            ..Self::default()
        }
    }

    /// Check the form and normalize an empty due date to none.
    pub fn validate(&mut self) -> Result<(), TaskError> {
        validate_titre(&self.titre)?;
        if self.date_echeance.as_deref().is_some_and(|d| d.trim().is_empty()) {
            self.date_echeance = None;
        }
        validate_due_date(self.date_echeance.as_deref())
    }

    pub(crate) fn into_document(self) -> Result<Document, TaskError> {
        to_document(&self)
    }
}

/// Partial update of a task.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titre: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorite: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statut: Option<TaskStatus>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub categorie: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_echeance: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub animal_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub animal_nom: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicule_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicule_nom: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(statut: TaskStatus) -> Self {
        Self {
            statut: Some(statut),
            ..Self::default()
        }
    }

    /// Check the patch and normalize an empty due date to a clear.
    pub fn validate(&mut self) -> Result<(), TaskError> {
        if let Some(titre) = &self.titre {
            validate_titre(titre)?;
        }
        if let Some(Some(due)) = &self.date_echeance
            && due.trim().is_empty()
        {
            self.date_echeance = Some(None);
        }
        match &self.date_echeance {
            Some(due) => validate_due_date(due.as_deref()),
            None => Ok(()),
        }
    }

    pub(crate) fn into_document(self) -> Result<Document, TaskError> {
        to_document(&self)
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, TaskError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(TaskError::Storage(StorageError::serialization(
            "task form is not an object",
        ))),
        Err(e) => Err(TaskError::Storage(StorageError::serialization(e.to_string()))),
    }
}

fn validate_titre(titre: &str) -> Result<(), TaskError> {
    if titre.trim().is_empty() {
        Err(TaskError::EmptyTitle)
    } else {
        Ok(())
    }
}

fn validate_due_date(due: Option<&str>) -> Result<(), TaskError> {
    match due {
        Some(raw) if parse_due_date(raw).is_none() => Err(TaskError::InvalidDueDate(raw.to_string())),
        _ => Ok(()),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("invalid due date '{0}' (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDueDate(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("stored task {id} is unreadable: {message}")]
    Corrupt { id: String, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TaskError {
    /// True for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::EmptyTitle | Self::InvalidDueDate(_) | Self::NotFound(_) => true,
            Self::Corrupt { .. } => false,
            Self::Storage(e) => e.is_client_error(),
        }
    }
}
