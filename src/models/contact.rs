use crate::models::pagination::{ListQuery, PaginationDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::{Validate, ValidateEmail, ValidationError};

/// Contact identifier exactly as the backend sent it: numeric ids stay
/// numbers, anything else (UUIDs, numeric strings) stays text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactId::Number(id) => fmt::Display::fmt(id, f),
            ContactId::Text(id) => f.pad(id),
        }
    }
}

impl From<i64> for ContactId {
    fn from(id: i64) -> Self {
        ContactId::Number(id)
    }
}

impl From<&str> for ContactId {
    fn from(id: &str) -> Self {
        ContactId::Text(id.to_string())
    }
}

impl From<&ContactId> for ContactId {
    fn from(id: &ContactId) -> Self {
        id.clone()
    }
}

/// A contact row, passed through as received. Fields this client does not
/// model (timestamps, owner ids, and so on) are kept in `extra`; absent
/// fields stay absent when the row is serialized again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    /// First and last name joined, skipping missing parts.
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.last_name]
            .into_iter()
            .flatten()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Payload for `POST /contacts` and `PUT /contacts/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(custom(function = "required_text", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "required_text", message = "Last name is required"))]
    pub last_name: String,
    #[validate(custom(function = "optional_email", message = "Email address is invalid"))]
    pub email: String,
    pub phone: String,
    pub company: String,
    pub job_title: String,
    pub address: String,
    pub notes: String,
}

fn required_text(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn optional_email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || value.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

impl From<&Contact> for ContactRequest {
    fn from(contact: &Contact) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            first_name: text(&contact.first_name),
            last_name: text(&contact.last_name),
            email: text(&contact.email),
            phone: text(&contact.phone),
            company: text(&contact.company),
            job_title: text(&contact.job_title),
            address: text(&contact.address),
            notes: text(&contact.notes),
        }
    }
}

/// One page of contacts together with the query that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub pagination: PaginationDescriptor,
    pub query: ListQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ContactRequest {
        ContactRequest {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            ..ContactRequest::default()
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn blank_names_are_rejected() {
        let payload = ContactRequest {
            first_name: "   ".to_string(),
            ..request()
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));
    }

    #[test]
    fn email_is_optional_but_must_be_well_formed() {
        let without_email = ContactRequest {
            email: String::new(),
            ..request()
        };
        assert!(without_email.validate().is_ok());

        let bad_email = ContactRequest {
            email: "not-an-email".to_string(),
            ..request()
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn contact_keeps_unknown_fields() {
        let contact: Contact =
            serde_json::from_str(r#"{"id":12,"first_name":"Alan","last_name":"Turing","created_at":"2024-01-01 10:00:00"}"#).unwrap();

        assert_eq!(contact.id, ContactId::Number(12));
        assert_eq!(contact.extra.get("created_at").and_then(Value::as_str), Some("2024-01-01 10:00:00"));

        let round_tripped = serde_json::to_value(&contact).unwrap();
        assert_eq!(round_tripped["created_at"], "2024-01-01 10:00:00");
    }

    #[test]
    fn null_names_decode() {
        let contact: Contact = serde_json::from_str(r#"{"id":99,"first_name":null,"last_name":"Lovelace","email":null}"#).unwrap();

        assert_eq!(contact.first_name, None);
        assert_eq!(contact.full_name(), "Lovelace");
        assert_eq!(ContactRequest::from(&contact).first_name, "");
    }

    #[test]
    fn text_ids_are_kept_verbatim() {
        let uuid: Contact = serde_json::from_str(r#"{"id":"c1a2-uuid","first_name":"Ada"}"#).unwrap();
        assert_eq!(uuid.id, ContactId::Text("c1a2-uuid".to_string()));
        assert_eq!(uuid.id.to_string(), "c1a2-uuid");

        let numeric_text: Contact = serde_json::from_str(r#"{"id":"12"}"#).unwrap();
        assert_eq!(numeric_text.id, ContactId::Text("12".to_string()));
    }

    #[test]
    fn rows_serialize_back_byte_for_byte() {
        let rows = [
            r#"{"id":"12","first_name":"Alan","last_name":"Turing","company":"NPL","created_at":"2024-01-01 10:00:00"}"#,
            r#"{"id":7,"last_name":"Hopper","notes":"COBOL","owner_id":3,"tags":["navy"]}"#,
            r#"{"id":"c1a2-uuid"}"#,
        ];

        for row in rows {
            let contact: Contact = serde_json::from_str(row).unwrap();
            assert_eq!(serde_json::to_string(&contact).unwrap(), row);
        }
    }

    #[test]
    fn id_display_honours_width() {
        assert_eq!(format!("{:>4}", ContactId::Number(7)), "   7");
        assert_eq!(format!("{:>4}", ContactId::from("ab")), "  ab");
    }

    #[test]
    fn request_from_contact_fills_blanks() {
        let contact: Contact = serde_json::from_str(r#"{"id":1,"first_name":"Alan","last_name":"Turing","company":"NPL"}"#).unwrap();
        let payload = ContactRequest::from(&contact);
        assert_eq!(payload.company, "NPL");
        assert_eq!(payload.email, "");
    }
}
