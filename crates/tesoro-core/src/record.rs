use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{ActorId, AuthorizationId, Currency, PaymentMethod, Status, Timestamp};

// ---------------------------------------------------------------------------
// AuthorizationFields — the validated, method-normalized payload
// ---------------------------------------------------------------------------

/// The caller-editable portion of an authorization record.
///
/// Produced by validation in `tesoro-authz`; by the time a value of this
/// type exists, the method-conditional requirements hold and `currency`
/// is the one the payment method forces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationFields {
    pub description: String,
    pub amount: f64,
    pub currency: Currency,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// AuthorizationRecord — a payment order as stored
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: AuthorizationId,
    #[serde(flatten)]
    pub fields: AuthorizationFields,
    pub status: Status,
    pub is_rectified: bool,
    pub created_by: ActorId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AuthorizationRecord {
    /// Assemble a fresh record in the `pending` state.
    pub fn new(fields: AuthorizationFields, created_by: ActorId) -> Self {
        let now = Timestamp::now();
        Self {
            id: AuthorizationId::generate(),
            fields,
            status: Status::Pending,
            is_rectified: false,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> AuthorizationFields {
        AuthorizationFields {
            description: "Pago proveedor".into(),
            amount: 150.0,
            currency: Currency::Bs,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            bank_name: Some("Banco X".into()),
            phone_number: Some("04141234567".into()),
            document_type: Some("V".into()),
            document_number: Some("12345678".into()),
            account_number: Some("01020304050607080910".into()),
            email: None,
            category: None,
        }
    }

    #[test]
    fn test_new_record_starts_pending_and_unrectified() {
        let record = AuthorizationRecord::new(sample_fields(), ActorId::new("ana@example.com"));
        assert_eq!(record.status, Status::Pending);
        assert!(!record.is_rectified);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.created_by.as_str(), "ana@example.com");
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = AuthorizationRecord::new(sample_fields(), ActorId::new("ana@example.com"));
        let json = serde_json::to_string(&record).unwrap();
        let back: AuthorizationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_json_uses_method_label() {
        let record = AuthorizationRecord::new(sample_fields(), ActorId::new("ana@example.com"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("Transferencia Bancaria"));
        assert!(json.contains("\"status\":\"pending\""));
    }
}
