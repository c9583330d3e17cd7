//! Field validation for authorization drafts.
//!
//! Validation is method-conditional: each payment method names the fields it
//! requires, and the settlement currency is forced by the method rather than
//! taken from the caller. Errors always name the offending field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tesoro_core::{AuthorizationFields, Currency, PaymentMethod};

use crate::error::{AuthzError, AuthzResult};

/// Unvalidated form input for creating or editing an authorization.
///
/// `currency` is advisory only; validation replaces it with the currency
/// the payment method forces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationDraft {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<Currency>,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Validate a draft and produce the normalized field set.
///
/// Fields that do not belong to the chosen payment method are dropped, so a
/// record never carries, say, an account number left over from a previously
/// selected method.
pub fn validate(draft: &AuthorizationDraft) -> AuthzResult<AuthorizationFields> {
    if draft.description.trim().is_empty() {
        return Err(AuthzError::validation("description", "must not be empty"));
    }
    if !draft.amount.is_finite() || draft.amount <= 0.0 {
        return Err(AuthzError::validation("amount", "must be greater than zero"));
    }

    let method = draft.payment_method;
    let mut fields = AuthorizationFields {
        description: draft.description.trim().to_string(),
        amount: draft.amount,
        currency: method.forced_currency(),
        date: draft.date,
        payment_method: method,
        bank_name: None,
        phone_number: None,
        document_type: None,
        document_number: None,
        account_number: None,
        email: None,
        category: draft.category.clone(),
    };

    match method {
        PaymentMethod::PagoMovil | PaymentMethod::BankTransfer => {
            fields.bank_name = Some(required_text(&draft.bank_name, "bank_name")?);
            fields.phone_number = Some(required_digits(
                &draft.phone_number,
                "phone_number",
                11,
            )?);
            fields.document_type = Some(required_text(&draft.document_type, "document_type")?);
            fields.document_number =
                Some(required_text(&draft.document_number, "document_number")?);
            if method == PaymentMethod::BankTransfer {
                fields.account_number = Some(required_digits(
                    &draft.account_number,
                    "account_number",
                    20,
                )?);
            }
        }
        PaymentMethod::ForeignTransfer => {
            fields.bank_name = Some(required_text(&draft.bank_name, "bank_name")?);
            fields.email = Some(required_email(&draft.email)?);
        }
    }

    Ok(fields)
}

fn required_text(value: &Option<String>, field: &'static str) -> AuthzResult<String> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(AuthzError::validation(field, "is required")),
    }
}

fn required_digits(
    value: &Option<String>,
    field: &'static str,
    length: usize,
) -> AuthzResult<String> {
    let s = required_text(value, field)?;
    if s.len() != length || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthzError::validation(
            field,
            format!("must be exactly {} digits", length),
        ));
    }
    Ok(s)
}

fn required_email(value: &Option<String>) -> AuthzResult<String> {
    let s = required_text(value, "email")?;
    if !s.contains('@') {
        return Err(AuthzError::validation("email", "must be a valid address"));
    }
    Ok(s)
}
