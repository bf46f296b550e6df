//! The federated identity carried from the identity provider into local tokens.

use federation_auth::session::{unflatten_value, Record};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ValidationErrorKind};

/// User identity as asserted by the identity provider.
///
/// The subject is mandatory and always mirrors the `sub` claim; every other claim is
/// kept verbatim in `claims` so nothing the provider sent is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FederatedUser {
    subject: String,
    claims: Map<String, Value>,
}

impl FederatedUser {
    /// Build a user from a claim set; fails when `sub` is missing, empty or not a string.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, Error> {
        let subject = match claims.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => sub.clone(),
            _ => {
                return Err(Error::validation(
                    ValidationErrorKind::MissingClaim,
                    "user claims have no subject",
                ))
            }
        };

        Ok(Self { subject, claims })
    }

    /// Rebuild a user from a flattened session record.
    pub fn from_record(record: Record) -> Result<Self, Error> {
        let claims = record
            .into_iter()
            .map(|(field, stored)| (field, unflatten_value(&stored)))
            .collect();
        Self::from_claims(claims)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Every claim, `sub` included.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

impl TryFrom<Map<String, Value>> for FederatedUser {
    type Error = Error;

    fn try_from(claims: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_claims(claims)
    }
}

impl From<FederatedUser> for Map<String, Value> {
    fn from(user: FederatedUser) -> Self {
        user.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainErrorKind;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_subject_comes_from_sub() {
        let user =
            FederatedUser::from_claims(claims(json!({"sub": "fayda-123", "name": "Abebe"})))
                .unwrap();
        assert_eq!(user.subject(), "fayda-123");
        assert_eq!(user.claims()["name"], "Abebe");
    }

    #[test]
    fn test_missing_or_non_string_sub_is_rejected() {
        for value in [json!({"name": "Abebe"}), json!({"sub": 42}), json!({"sub": ""})] {
            let err = FederatedUser::from_claims(claims(value)).unwrap_err();
            assert_eq!(
                err.error_kind,
                DomainErrorKind::Validation(ValidationErrorKind::MissingClaim)
            );
        }
    }

    #[test]
    fn test_from_record_restores_structured_claims() {
        let record: Record = [
            ("sub".to_string(), "fayda-123".to_string()),
            ("address".to_string(), r#"{"region":"Addis Ababa"}"#.to_string()),
            ("phone_verified".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();

        let user = FederatedUser::from_record(record).unwrap();
        assert_eq!(user.subject(), "fayda-123");
        assert_eq!(user.claims()["address"], json!({"region": "Addis Ababa"}));
        // Primitive types are not preserved by the session store.
        assert_eq!(user.claims()["phone_verified"], json!("true"));
    }

    #[test]
    fn test_serializes_as_plain_claim_object() {
        let user = FederatedUser::from_claims(claims(json!({"sub": "fayda-123"}))).unwrap();
        assert_eq!(serde_json::to_value(&user).unwrap(), json!({"sub": "fayda-123"}));
        let back: FederatedUser = serde_json::from_value(json!({"sub": "fayda-123"})).unwrap();
        assert_eq!(back, user);
        assert!(serde_json::from_value::<FederatedUser>(json!({"name": "x"})).is_err());
    }
}
