//! Value objects shared by event payloads.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Adds another amount, saturating at the i64 bounds.
    pub fn plus(&self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Subtracts another amount, clamping at zero.
    pub fn minus(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// URL-safe campaign slug: lowercase alphanumeric segments joined by hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Creates a slug after validating its shape.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidValue("slug cannot be empty".to_string()));
        }
        if value.starts_with('-') || value.ends_with('-') || value.contains("--") {
            return Err(DomainError::InvalidValue(format!(
                "slug '{value}' has misplaced hyphens"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::InvalidValue(format!(
                "slug '{value}' contains characters outside [a-z0-9-]"
            )));
        }
        Ok(Self(value))
    }

    /// Returns the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!(a.plus(b).cents(), 1250);
        assert_eq!(a.minus(b).cents(), 750);
    }

    #[test]
    fn money_minus_clamps_at_zero() {
        let a = Money::from_cents(100);
        let b = Money::from_cents(500);
        assert_eq!(a.minus(b), Money::zero());
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(123456).to_string(), "1234.56");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn slug_accepts_valid_shapes() {
        assert!(Slug::new("save-the-park").is_ok());
        assert!(Slug::new("relief2024").is_ok());
    }

    #[test]
    fn slug_rejects_invalid_shapes() {
        assert!(Slug::new("").is_err());
        assert!(Slug::new("Save-The-Park").is_err());
        assert!(Slug::new("-leading").is_err());
        assert!(Slug::new("trailing-").is_err());
        assert!(Slug::new("double--hyphen").is_err());
        assert!(Slug::new("with space").is_err());
    }

    #[test]
    fn slug_serializes_as_bare_string() {
        let slug = Slug::new("flood-relief").unwrap();
        let json = serde_json::to_string(&slug).unwrap();
        assert_eq!(json, "\"flood-relief\"");
    }
}
