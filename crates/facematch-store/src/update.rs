//! Profile validation and partial updates.

use crate::sqlite::StoreError;
use facematch_core::{Embedding, IdentityProfile};

/// Field names accepted by [`IdentityUpdate::set`].
pub const PROFILE_FIELDS: [&str; 5] = ["name", "email", "phone", "department", "notes"];

/// A partial update of an identity's profile.
///
/// `None` leaves a field untouched. For the optional fields, an empty string
/// clears the stored value. The embedding is not updatable through this path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

impl IdentityUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.notes.is_none()
    }

    /// Set one field by name. Unknown names are rejected.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let slot = self
            .slot_mut(field)
            .ok_or_else(|| StoreError::UnknownField(field.to_string()))?;
        *slot = Some(value.into());
        Ok(())
    }

    /// Must stay in step with [`PROFILE_FIELDS`].
    fn slot_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "name" => Some(&mut self.name),
            "email" => Some(&mut self.email),
            "phone" => Some(&mut self.phone),
            "department" => Some(&mut self.department),
            "notes" => Some(&mut self.notes),
            _ => None,
        }
    }

    /// Produce the profile that results from applying this update.
    pub fn apply(&self, current: &IdentityProfile) -> IdentityProfile {
        IdentityProfile {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            email: self.email.clone().unwrap_or_else(|| current.email.clone()),
            phone: merge_optional(&self.phone, &current.phone),
            department: merge_optional(&self.department, &current.department),
            notes: merge_optional(&self.notes, &current.notes),
        }
    }
}

fn merge_optional(update: &Option<String>, current: &Option<String>) -> Option<String> {
    match update {
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v.clone()),
        None => current.clone(),
    }
}

/// Trim the profile and check required fields.
pub fn normalize_profile(profile: IdentityProfile) -> Result<IdentityProfile, StoreError> {
    let name = profile.name.trim().to_string();
    if name.is_empty() {
        return Err(StoreError::InvalidField {
            field: "name",
            reason: "must not be empty".into(),
        });
    }

    let email = profile.email.trim().to_string();
    if email.is_empty() {
        return Err(StoreError::InvalidField {
            field: "email",
            reason: "must not be empty".into(),
        });
    }
    if !email.contains('@') {
        return Err(StoreError::InvalidField {
            field: "email",
            reason: format!("'{email}' is not an email address"),
        });
    }

    Ok(IdentityProfile {
        name,
        email,
        phone: trim_optional(profile.phone),
        department: trim_optional(profile.department),
        notes: trim_optional(profile.notes),
    })
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check an embedding before it is persisted.
pub fn validate_embedding(
    embedding: &Embedding,
    expected_dim: Option<usize>,
) -> Result<(), StoreError> {
    if embedding.is_empty() {
        return Err(StoreError::InvalidEmbedding("embedding is empty".into()));
    }
    if !embedding.is_finite() {
        return Err(StoreError::InvalidEmbedding(
            "embedding contains non-finite values".into(),
        ));
    }
    if let Some(expected) = expected_dim {
        if embedding.dim() != expected {
            return Err(StoreError::Embedding(
                facematch_core::EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.dim(),
                },
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> IdentityProfile {
        IdentityProfile {
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
            phone: Some("555-0100".into()),
            department: Some("Navy".into()),
            notes: None,
        }
    }

    #[test]
    fn test_set_known_fields() {
        let mut update = IdentityUpdate::default();
        assert!(update.is_empty());
        update.set("department", "Research").unwrap();
        update.set("notes", "prefers COBOL").unwrap();
        assert!(!update.is_empty());
        assert_eq!(update.department.as_deref(), Some("Research"));
    }

    #[test]
    fn test_set_unknown_field_rejected() {
        let mut update = IdentityUpdate::default();
        let err = update.set("embedding", "x").unwrap_err();
        assert!(err.to_string().contains("expected one of name, email, phone"));
        assert!(matches!(err, StoreError::UnknownField(f) if f == "embedding"));
        assert!(update.is_empty());
    }

    #[test]
    fn test_every_listed_field_is_settable() {
        let mut update = IdentityUpdate::default();
        for field in PROFILE_FIELDS {
            update.set(field, format!("{field}@value")).unwrap();
        }
        assert_eq!(update.email.as_deref(), Some("email@value"));
        assert_eq!(update.notes.as_deref(), Some("notes@value"));
    }

    #[test]
    fn test_apply_leaves_absent_fields() {
        let update = IdentityUpdate {
            name: Some("Rear Admiral Hopper".into()),
            ..Default::default()
        };
        let next = update.apply(&profile());
        assert_eq!(next.name, "Rear Admiral Hopper");
        assert_eq!(next.email, "grace@example.com");
        assert_eq!(next.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_apply_empty_string_clears_optional() {
        let update = IdentityUpdate {
            phone: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.apply(&profile()).phone, None);
    }

    #[test]
    fn test_normalize_trims_and_validates() {
        let p = normalize_profile(IdentityProfile {
            name: "  Ada  ".into(),
            email: " ada@example.com ".into(),
            phone: Some("   ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.email, "ada@example.com");
        assert_eq!(p.phone, None);
    }

    #[test]
    fn test_normalize_rejects_blank_name() {
        let err = normalize_profile(IdentityProfile {
            name: " ".into(),
            email: "a@b.c".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn test_normalize_rejects_bad_email() {
        let err = normalize_profile(IdentityProfile {
            name: "Ada".into(),
            email: "not-an-email".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidField { field: "email", .. }));
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&Embedding::new(vec![0.1; 4]), Some(4)).is_ok());
        assert!(validate_embedding(&Embedding::new(vec![0.1; 4]), None).is_ok());
        assert!(matches!(
            validate_embedding(&Embedding::new(vec![]), None),
            Err(StoreError::InvalidEmbedding(_))
        ));
        assert!(matches!(
            validate_embedding(&Embedding::new(vec![f64::NAN]), None),
            Err(StoreError::InvalidEmbedding(_))
        ));
        assert!(matches!(
            validate_embedding(&Embedding::new(vec![0.1; 3]), Some(4)),
            Err(StoreError::Embedding(_))
        ));
    }
}
