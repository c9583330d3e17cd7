use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use tesoro_core::{
    ActorId, AuthorizationFields, AuthorizationId, AuthorizationRecord, AuthorizationRepository,
    CapabilitySet, ChangeEvent, ChangeOp, Currency, KeyValueStore, PaymentMethod,
    PermissionSource, Status, Table, TesoroError, TesoroResult, Timestamp,
};

use crate::feed::ChangeFeedHub;

const RECORD_COLUMNS: &str = "id, description, amount, currency, date, payment_method, \
     bank_name, phone_number, document_type, document_number, account_number, email, \
     category, status, is_rectified, created_by, created_at, updated_at";

/// SQLite store backing all three durable contracts: the authorization
/// repository, the capability source, and the per-installation key-value
/// slots. Status transitions are conditional updates keyed on the expected
/// prior status; a zero-row match surfaces as `false`, never as a silent
/// overwrite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    feed: Option<Arc<ChangeFeedHub>>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &str) -> TesoroResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| TesoroError::Storage(format!("failed to open database: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS authorizations (
                id TEXT PRIMARY KEY NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                date TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                bank_name TEXT,
                phone_number TEXT,
                document_type TEXT,
                document_number TEXT,
                account_number TEXT,
                email TEXT,
                category TEXT,
                status TEXT NOT NULL,
                is_rectified INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_authorizations_status
                ON authorizations (status, updated_at);
            CREATE TABLE IF NOT EXISTS capabilities (
                actor_id TEXT PRIMARY KEY NOT NULL,
                access_income INTEGER NOT NULL DEFAULT 0,
                access_expenses INTEGER NOT NULL DEFAULT 0,
                access_payroll INTEGER NOT NULL DEFAULT 0,
                access_staff INTEGER NOT NULL DEFAULT 0,
                access_banks INTEGER NOT NULL DEFAULT 0,
                manage_payment_orders INTEGER NOT NULL DEFAULT 0,
                assign_access INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| TesoroError::Storage(format!("failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            feed: None,
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> TesoroResult<Self> {
        Self::open(":memory:")
    }

    /// Attach the change-feed hub; every successful mutation on a shared
    /// table publishes a typed event through it.
    pub fn with_feed(mut self, feed: Arc<ChangeFeedHub>) -> Self {
        self.feed = Some(feed);
        self
    }

    fn lock(&self) -> TesoroResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))
    }

    fn publish(&self, table: Table, op: ChangeOp) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent { table, op });
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawRecord {
    id: String,
    description: String,
    amount: f64,
    currency: String,
    date: String,
    payment_method: String,
    bank_name: Option<String>,
    phone_number: Option<String>,
    document_type: Option<String>,
    document_number: Option<String>,
    account_number: Option<String>,
    email: Option<String>,
    category: Option<String>,
    status: String,
    is_rectified: bool,
    created_by: String,
    created_at: String,
    updated_at: String,
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        date: row.get(4)?,
        payment_method: row.get(5)?,
        bank_name: row.get(6)?,
        phone_number: row.get(7)?,
        document_type: row.get(8)?,
        document_number: row.get(9)?,
        account_number: row.get(10)?,
        email: row.get(11)?,
        category: row.get(12)?,
        status: row.get(13)?,
        is_rectified: row.get(14)?,
        created_by: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

impl RawRecord {
    fn into_record(self) -> TesoroResult<AuthorizationRecord> {
        let corrupt = |what: &str| TesoroError::Storage(format!("corrupt column: {}", what));
        Ok(AuthorizationRecord {
            id: AuthorizationId::new(self.id),
            fields: AuthorizationFields {
                description: self.description,
                amount: self.amount,
                currency: Currency::from_str(&self.currency)
                    .map_err(|_| corrupt("currency"))?,
                date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
                    .map_err(|_| corrupt("date"))?,
                payment_method: PaymentMethod::from_str(&self.payment_method)
                    .map_err(|_| corrupt("payment_method"))?,
                bank_name: self.bank_name,
                phone_number: self.phone_number,
                document_type: self.document_type,
                document_number: self.document_number,
                account_number: self.account_number,
                email: self.email,
                category: self.category,
            },
            status: Status::from_str(&self.status).map_err(|_| corrupt("status"))?,
            is_rectified: self.is_rectified,
            created_by: ActorId::new(self.created_by),
            created_at: Timestamp::parse_rfc3339(&self.created_at)
                .ok_or_else(|| corrupt("created_at"))?,
            updated_at: Timestamp::parse_rfc3339(&self.updated_at)
                .ok_or_else(|| corrupt("updated_at"))?,
        })
    }
}

fn date_to_text(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ---------------------------------------------------------------------------
// AuthorizationRepository
// ---------------------------------------------------------------------------

impl AuthorizationRepository for SqliteStore {
    fn create(&self, record: &AuthorizationRecord) -> TesoroResult<()> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO authorizations (id, description, amount, currency, date, \
                 payment_method, bank_name, phone_number, document_type, document_number, \
                 account_number, email, category, status, is_rectified, created_by, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    record.id.as_str(),
                    record.fields.description,
                    record.fields.amount,
                    record.fields.currency.as_str(),
                    date_to_text(&record.fields.date),
                    record.fields.payment_method.label(),
                    record.fields.bank_name,
                    record.fields.phone_number,
                    record.fields.document_type,
                    record.fields.document_number,
                    record.fields.account_number,
                    record.fields.email,
                    record.fields.category,
                    record.status.as_str(),
                    record.is_rectified,
                    record.created_by.as_str(),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TesoroError::Storage(format!("insert failed: {}", e)))?;
        }
        self.publish(Table::Authorizations, ChangeOp::Insert);
        Ok(())
    }

    fn get(&self, id: &AuthorizationId) -> TesoroResult<Option<AuthorizationRecord>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM authorizations WHERE id = ?1",
                RECORD_COLUMNS
            ),
            params![id.as_str()],
            raw_from_row,
        );
        match result {
            Ok(raw) => Ok(Some(raw.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TesoroError::Storage(format!("query failed: {}", e))),
        }
    }

    fn update_fields(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let rows = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE authorizations SET description = ?2, amount = ?3, currency = ?4, \
                 date = ?5, payment_method = ?6, bank_name = ?7, phone_number = ?8, \
                 document_type = ?9, document_number = ?10, account_number = ?11, \
                 email = ?12, category = ?13, updated_at = ?14 \
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    fields.description,
                    fields.amount,
                    fields.currency.as_str(),
                    date_to_text(&fields.date),
                    fields.payment_method.label(),
                    fields.bank_name,
                    fields.phone_number,
                    fields.document_type,
                    fields.document_number,
                    fields.account_number,
                    fields.email,
                    fields.category,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| TesoroError::Storage(format!("update failed: {}", e)))?
        };
        if rows > 0 {
            self.publish(Table::Authorizations, ChangeOp::Update);
        }
        Ok(rows > 0)
    }

    fn update_status_checked(
        &self,
        id: &AuthorizationId,
        expected: Status,
        target: Status,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let rows = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE authorizations SET status = ?2, updated_at = ?3 \
                 WHERE id = ?1 AND status = ?4",
                params![
                    id.as_str(),
                    target.as_str(),
                    now.to_rfc3339(),
                    expected.as_str()
                ],
            )
            .map_err(|e| TesoroError::Storage(format!("status update failed: {}", e)))?
        };
        if rows > 0 {
            self.publish(Table::Authorizations, ChangeOp::Update);
        }
        Ok(rows > 0)
    }

    fn rectify_checked(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let rows = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE authorizations SET description = ?2, amount = ?3, currency = ?4, \
                 date = ?5, payment_method = ?6, bank_name = ?7, phone_number = ?8, \
                 document_type = ?9, document_number = ?10, account_number = ?11, \
                 email = ?12, category = ?13, status = 'pending', is_rectified = 1, \
                 updated_at = ?14 \
                 WHERE id = ?1 AND status = 'rejected'",
                params![
                    id.as_str(),
                    fields.description,
                    fields.amount,
                    fields.currency.as_str(),
                    date_to_text(&fields.date),
                    fields.payment_method.label(),
                    fields.bank_name,
                    fields.phone_number,
                    fields.document_type,
                    fields.document_number,
                    fields.account_number,
                    fields.email,
                    fields.category,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| TesoroError::Storage(format!("rectify failed: {}", e)))?
        };
        if rows > 0 {
            self.publish(Table::Authorizations, ChangeOp::Update);
        }
        Ok(rows > 0)
    }

    fn delete(&self, id: &AuthorizationId) -> TesoroResult<bool> {
        let rows = {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM authorizations WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| TesoroError::Storage(format!("delete failed: {}", e)))?
        };
        if rows > 0 {
            self.publish(Table::Authorizations, ChangeOp::Delete);
        }
        Ok(rows > 0)
    }

    fn pending(&self) -> TesoroResult<Vec<AuthorizationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM authorizations WHERE status = 'pending' \
                 ORDER BY created_at DESC",
                RECORD_COLUMNS
            ))
            .map_err(|e| TesoroError::Storage(format!("prepare failed: {}", e)))?;
        let raws = stmt
            .query_map([], raw_from_row)
            .map_err(|e| TesoroError::Storage(format!("query failed: {}", e)))?;
        let mut records = Vec::new();
        for raw in raws {
            let raw = raw.map_err(|e| TesoroError::Storage(format!("row failed: {}", e)))?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    fn history(&self, limit: usize) -> TesoroResult<Vec<AuthorizationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM authorizations WHERE status != 'pending' \
                 ORDER BY updated_at DESC LIMIT ?1",
                RECORD_COLUMNS
            ))
            .map_err(|e| TesoroError::Storage(format!("prepare failed: {}", e)))?;
        let raws = stmt
            .query_map(params![limit as i64], raw_from_row)
            .map_err(|e| TesoroError::Storage(format!("query failed: {}", e)))?;
        let mut records = Vec::new();
        for raw in raws {
            let raw = raw.map_err(|e| TesoroError::Storage(format!("row failed: {}", e)))?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// PermissionSource
// ---------------------------------------------------------------------------

impl PermissionSource for SqliteStore {
    fn capabilities(&self, actor: &ActorId) -> TesoroResult<Option<CapabilitySet>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT access_income, access_expenses, access_payroll, access_staff, \
             access_banks, manage_payment_orders, assign_access \
             FROM capabilities WHERE actor_id = ?1",
            params![actor.as_str()],
            |row| {
                Ok(CapabilitySet {
                    access_income: row.get(0)?,
                    access_expenses: row.get(1)?,
                    access_payroll: row.get(2)?,
                    access_staff: row.get(3)?,
                    access_banks: row.get(4)?,
                    manage_payment_orders: row.get(5)?,
                    assign_access: row.get(6)?,
                })
            },
        );
        match result {
            Ok(caps) => Ok(Some(caps)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TesoroError::Storage(format!(
                "capabilities query failed: {}",
                e
            ))),
        }
    }

    fn set_capabilities(&self, actor: &ActorId, caps: &CapabilitySet) -> TesoroResult<()> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT OR REPLACE INTO capabilities (actor_id, access_income, \
                 access_expenses, access_payroll, access_staff, access_banks, \
                 manage_payment_orders, assign_access) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    actor.as_str(),
                    caps.access_income,
                    caps.access_expenses,
                    caps.access_payroll,
                    caps.access_staff,
                    caps.access_banks,
                    caps.manage_payment_orders,
                    caps.assign_access,
                ],
            )
            .map_err(|e| TesoroError::Storage(format!("capabilities upsert failed: {}", e)))?;
        }
        self.publish(Table::Capabilities, ChangeOp::Update);
        Ok(())
    }

    fn remove_capabilities(&self, actor: &ActorId) -> TesoroResult<bool> {
        let rows = {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM capabilities WHERE actor_id = ?1",
                params![actor.as_str()],
            )
            .map_err(|e| TesoroError::Storage(format!("capabilities delete failed: {}", e)))?
        };
        if rows > 0 {
            self.publish(Table::Capabilities, ChangeOp::Delete);
        }
        Ok(rows > 0)
    }
}

// ---------------------------------------------------------------------------
// KeyValueStore — actor-local slots, no feed events
// ---------------------------------------------------------------------------

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> TesoroResult<Option<String>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TesoroError::Storage(format!("kv query failed: {}", e))),
        }
    }

    fn write(&self, key: &str, value: &str) -> TesoroResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| TesoroError::Storage(format!("kv upsert failed: {}", e)))?;
        Ok(())
    }

    fn clear(&self, key: &str) -> TesoroResult<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| TesoroError::Storage(format!("kv delete failed: {}", e)))?;
        Ok(rows > 0)
    }
}
