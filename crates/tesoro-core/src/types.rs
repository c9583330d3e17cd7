use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Timestamp — canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            seconds_since_epoch: now.timestamp() as u64,
            nanoseconds: now.timestamp_subsec_nanos(),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }

    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        let dt = chrono::DateTime::parse_from_rfc3339(s).ok()?;
        Some(Self {
            seconds_since_epoch: dt.timestamp() as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        })
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp() as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

// ---------------------------------------------------------------------------
// Deadline — upper time bound for a repository round-trip
// ---------------------------------------------------------------------------

/// Upper time bound on an operation against the shared repository.
///
/// Every mutating call and every notification refresh accepts a `Deadline`;
/// an expired deadline aborts the operation before any write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    expires_at: Option<Timestamp>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self { expires_at: None }
    }

    /// A deadline `seconds` from now.
    pub fn within_seconds(seconds: u64) -> Self {
        let now = Timestamp::now();
        Self {
            expires_at: Some(Timestamp::from_seconds(
                now.seconds_since_epoch + seconds,
            )),
        }
    }

    /// A deadline at an explicit instant (for tests).
    pub fn at(instant: Timestamp) -> Self {
        Self {
            expires_at: Some(instant),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(t) => Timestamp::now() >= t,
            None => false,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers — prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    AuthorizationId,
    "Unique identifier for an authorization (payment order) record."
);
define_id!(
    ActorId,
    "Identity of an actor (the login email of a back-office user)."
);

impl AuthorizationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(format!("auth-{:032x}", u128::from_be_bytes(bytes)))
    }
}

/// Handle to an active change-feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

// ---------------------------------------------------------------------------
// Currency — the two settlement currencies the back office handles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "BS")]
    Bs,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Bs => "BS",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "BS" => Ok(Currency::Bs),
            other => Err(format!("unknown currency '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// PaymentMethod — wire labels are the exact strings the dashboard shows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Pago móvil")]
    PagoMovil,
    #[serde(rename = "Transferencia Bancaria")]
    BankTransfer,
    #[serde(rename = "Transferencia moneda extranjera")]
    ForeignTransfer,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::PagoMovil => "Pago móvil",
            PaymentMethod::BankTransfer => "Transferencia Bancaria",
            PaymentMethod::ForeignTransfer => "Transferencia moneda extranjera",
        }
    }

    /// The settlement currency is determined by the method, never chosen
    /// by the caller: foreign transfers settle in USD, everything else in BS.
    pub fn forced_currency(&self) -> Currency {
        match self {
            PaymentMethod::ForeignTransfer => Currency::Usd,
            PaymentMethod::PagoMovil | PaymentMethod::BankTransfer => Currency::Bs,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pago móvil" => Ok(PaymentMethod::PagoMovil),
            "Transferencia Bancaria" => Ok(PaymentMethod::BankTransfer),
            "Transferencia moneda extranjera" => Ok(PaymentMethod::ForeignTransfer),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Status — the authorization lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of an authorization.
///
/// `Pending → Approved` is terminal; `Pending → Rejected` may be reversed
/// exactly once per rejection by rectification (`Rejected → Pending`), which
/// permanently flags the record as rectified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }

    /// Whether any outgoing transition exists from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Approved)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Capability — typed capability flags (no stringly-typed field lookup)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    AccessIncome,
    AccessExpenses,
    AccessPayroll,
    AccessStaff,
    AccessBanks,
    ManagePaymentOrders,
    AssignAccess,
}

/// Per-actor capability record.
///
/// Absence of a stored record resolves to `CapabilitySet::default()`
/// (all flags false); the sentinel identity resolves to `all()` without
/// a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub access_income: bool,
    #[serde(default)]
    pub access_expenses: bool,
    #[serde(default)]
    pub access_payroll: bool,
    #[serde(default)]
    pub access_staff: bool,
    #[serde(default)]
    pub access_banks: bool,
    #[serde(default)]
    pub manage_payment_orders: bool,
    #[serde(default)]
    pub assign_access: bool,
}

impl CapabilitySet {
    pub fn all() -> Self {
        Self {
            access_income: true,
            access_expenses: true,
            access_payroll: true,
            access_staff: true,
            access_banks: true,
            manage_payment_orders: true,
            assign_access: true,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::AccessIncome => self.access_income,
            Capability::AccessExpenses => self.access_expenses,
            Capability::AccessPayroll => self.access_payroll,
            Capability::AccessStaff => self.access_staff,
            Capability::AccessBanks => self.access_banks,
            Capability::ManagePaymentOrders => self.manage_payment_orders,
            Capability::AssignAccess => self.assign_access,
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeEvent — typed "something changed" signal from the datastore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Authorizations,
    Capabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A change notification carries the table and the kind of mutation but
/// no payload; consumers must re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let t1 = Timestamp::from_seconds(100);
        let t2 = Timestamp::from_seconds(200);
        assert!(t1 < t2);
    }

    #[test]
    fn test_timestamp_rfc3339_round_trip() {
        let t = Timestamp::from_seconds(1_700_000_000);
        let s = t.to_rfc3339();
        assert!(s.contains("2023"));
        let parsed = Timestamp::parse_rfc3339(&s).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_timestamp_parse_invalid() {
        assert!(Timestamp::parse_rfc3339("not a timestamp").is_none());
    }

    #[test]
    fn test_deadline_unbounded_never_expires() {
        assert!(!Deadline::unbounded().is_expired());
    }

    #[test]
    fn test_deadline_in_the_past_is_expired() {
        let past = Deadline::at(Timestamp::from_seconds(1_000));
        assert!(past.is_expired());
    }

    #[test]
    fn test_deadline_within_seconds_not_yet_expired() {
        assert!(!Deadline::within_seconds(3600).is_expired());
    }

    #[test]
    fn test_authorization_id_generation_unique() {
        let a = AuthorizationId::generate();
        let b = AuthorizationId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("auth-"));
    }

    #[test]
    fn test_typed_ids_distinct() {
        let auth = AuthorizationId::new("abc");
        let actor = ActorId::new("ana@example.com");
        assert_ne!(auth.as_str(), actor.as_str());
    }

    #[test]
    fn test_currency_round_trip() {
        assert_eq!(Currency::Usd.to_string(), "USD");
        assert_eq!("BS".parse::<Currency>().unwrap(), Currency::Bs);
        assert!("EUR".parse::<Currency>().is_err());
    }

    #[test]
    fn test_payment_method_labels() {
        assert_eq!(PaymentMethod::PagoMovil.label(), "Pago móvil");
        assert_eq!(
            PaymentMethod::BankTransfer.label(),
            "Transferencia Bancaria"
        );
        assert_eq!(
            PaymentMethod::ForeignTransfer.label(),
            "Transferencia moneda extranjera"
        );
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(
            "Pago móvil".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::PagoMovil
        );
        assert!("Cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_forces_currency() {
        assert_eq!(
            PaymentMethod::ForeignTransfer.forced_currency(),
            Currency::Usd
        );
        assert_eq!(PaymentMethod::PagoMovil.forced_currency(), Currency::Bs);
        assert_eq!(PaymentMethod::BankTransfer.forced_currency(), Currency::Bs);
    }

    #[test]
    fn test_payment_method_serde_uses_labels() {
        let json = serde_json::to_string(&PaymentMethod::PagoMovil).unwrap();
        assert_eq!(json, "\"Pago móvil\"");
        let back: PaymentMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PaymentMethod::PagoMovil);
    }

    #[test]
    fn test_status_terminality() {
        assert!(Status::Approved.is_terminal());
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Rejected.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [Status::Pending, Status::Approved, Status::Rejected] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("cancelled".parse::<Status>().is_err());
    }

    #[test]
    fn test_capability_set_default_denies_everything() {
        let caps = CapabilitySet::default();
        for cap in [
            Capability::AccessIncome,
            Capability::AccessExpenses,
            Capability::AccessPayroll,
            Capability::AccessStaff,
            Capability::AccessBanks,
            Capability::ManagePaymentOrders,
            Capability::AssignAccess,
        ] {
            assert!(!caps.has(cap));
        }
    }

    #[test]
    fn test_capability_set_all_grants_everything() {
        let caps = CapabilitySet::all();
        assert!(caps.has(Capability::ManagePaymentOrders));
        assert!(caps.has(Capability::AssignAccess));
        assert!(caps.has(Capability::AccessBanks));
    }

    #[test]
    fn test_capability_set_deserializes_missing_flags_as_false() {
        let caps: CapabilitySet =
            serde_json::from_str(r#"{"manage_payment_orders": true}"#).unwrap();
        assert!(caps.has(Capability::ManagePaymentOrders));
        assert!(!caps.has(Capability::AssignAccess));
    }

    #[test]
    fn test_change_event_serde() {
        let event = ChangeEvent {
            table: Table::Authorizations,
            op: ChangeOp::Update,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
