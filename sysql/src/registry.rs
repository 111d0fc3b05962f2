///
/// # Virtual Table Registry
///
/// Process-wide catalog of virtual tables. Each `VirtualTableContent` is
/// shared by every engine handle the table is attached to and carries:
///
/// - the column schema and declared attributes
/// - a generator producing rows for a `QueryContext`
/// - per-query constraint plans recorded while SQLite plans a statement
/// - a per-query result cache keyed by constraints
///
/// Plans and cached rows are owned by the query session that produced them.
/// `clear_query_state(session)` discards one session's entries and leaves
/// those of other live sessions untouched.
///

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rusqlite::types::Value as SqlValue;
use rusqlite::vtab::IndexConstraintOp;

use crate::attributes::TableAttributes;
use crate::columns::{ColumnDef, ColumnType, TableColumns};
use crate::errors::{Result, SqlError};

pub type TableRows = Vec<Vec<SqlValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    Like,
    Glob,
}

impl ConstraintOp {
    pub fn from_index_op(op: &IndexConstraintOp) -> Option<Self> {
        match op {
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ => Some(ConstraintOp::Equals),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_NE => Some(ConstraintOp::NotEquals),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GT => Some(ConstraintOp::GreaterThan),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GE => Some(ConstraintOp::GreaterThanOrEquals),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LT => Some(ConstraintOp::LessThan),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LE => Some(ConstraintOp::LessThanOrEquals),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LIKE => Some(ConstraintOp::Like),
            IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GLOB => Some(ConstraintOp::Glob),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintOp::Equals => "=",
            ConstraintOp::NotEquals => "!=",
            ConstraintOp::GreaterThan => ">",
            ConstraintOp::GreaterThanOrEquals => ">=",
            ConstraintOp::LessThan => "<",
            ConstraintOp::LessThanOrEquals => "<=",
            ConstraintOp::Like => "LIKE",
            ConstraintOp::Glob => "GLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub column: String,
    pub op: ConstraintOp,
    pub value: SqlValue,
}

/// Constraints and flags handed to a table generator for one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    pub constraints: Vec<Constraint>,
    pub use_cache: bool,
}

impl QueryContext {
    /// Values constrained with `=` on `column`.
    pub fn equals(&self, column: &str) -> Vec<&SqlValue> {
        self.constraints
            .iter()
            .filter(|c| c.column == column && c.op == ConstraintOp::Equals)
            .map(|c| &c.value)
            .collect()
    }

    pub fn is_constrained(&self, column: &str) -> bool {
        self.constraints.iter().any(|c| c.column == column)
    }

    pub fn cache_key(&self) -> String {
        let mut key = String::new();
        for c in &self.constraints {
            key.push_str(&format!("{}{}{:?};", c.column, c.op.as_str(), c.value));
        }
        key
    }
}

/// Column index and operator of each constraint SQLite agreed to pass, in
/// filter argument order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintPlan {
    pub constraints: Vec<(usize, ConstraintOp)>,
}

pub trait TableGenerator: Send + Sync {
    fn generate(&self, context: &QueryContext) -> Result<TableRows>;
}

impl<F> TableGenerator for F
where
    F: Fn(&QueryContext) -> Result<TableRows> + Send + Sync,
{
    fn generate(&self, context: &QueryContext) -> Result<TableRows> {
        self(context)
    }
}

pub struct VirtualTableContent {
    name: String,
    columns: TableColumns,
    attributes: TableAttributes,
    generator: Box<dyn TableGenerator>,
    constraints: Mutex<HashMap<(u64, i32), ConstraintPlan>>,
    next_plan: AtomicI32,
    cache: Mutex<HashMap<(u64, String), Arc<TableRows>>>,
}

impl fmt::Debug for VirtualTableContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTableContent")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl VirtualTableContent {
    pub fn new(
        name: impl Into<String>,
        columns: TableColumns,
        generator: Box<dyn TableGenerator>,
    ) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(SqlError::Table {
                name,
                reason: "table names must be plain identifiers".to_string(),
            });
        }
        if columns.is_empty() {
            return Err(SqlError::Table {
                name,
                reason: "a table needs at least one column".to_string(),
            });
        }
        if let Some(bad) = columns.iter().find(|c| !is_identifier(&c.name)) {
            return Err(SqlError::Table {
                reason: format!("invalid column name '{}'", bad.name),
                name,
            });
        }

        Ok(Self {
            name,
            columns,
            attributes: TableAttributes::empty(),
            generator,
            constraints: Mutex::new(HashMap::new()),
            next_plan: AtomicI32::new(0),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_fn<F>(name: impl Into<String>, columns: TableColumns, generator: F) -> Result<Self>
    where
        F: Fn(&QueryContext) -> Result<TableRows> + Send + Sync + 'static,
    {
        Self::new(name, columns, Box::new(generator))
    }

    pub fn with_attributes(mut self, attributes: TableAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &TableColumns {
        &self.columns
    }

    pub fn attributes(&self) -> TableAttributes {
        self.attributes
    }

    /// CREATE TABLE statement declared to SQLite for this table.
    pub fn schema(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.column_type {
                ColumnType::Unknown => c.name.clone(),
                t => format!("{} {}", c.name, t.as_str()),
            })
            .collect();
        format!("CREATE TABLE {}({})", self.name, columns.join(", "))
    }

    /// Store a plan for `session` and return its index. Zero is reserved
    /// for "no plan".
    pub fn push_constraint_plan(&self, session: u64, plan: ConstraintPlan) -> i32 {
        let idx = self.next_plan.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let idx = if idx <= 0 { 1 } else { idx };
        self.constraints.lock().insert((session, idx), plan);
        idx
    }

    pub fn constraint_plan(&self, session: u64, idx: i32) -> Option<ConstraintPlan> {
        self.constraints.lock().get(&(session, idx)).cloned()
    }

    pub fn cached_rows(&self, session: u64, key: &str) -> Option<Arc<TableRows>> {
        self.cache.lock().get(&(session, key.to_string())).cloned()
    }

    pub fn store_rows(&self, session: u64, key: String, rows: Arc<TableRows>) {
        self.cache.lock().insert((session, key), rows);
    }

    /// Run the generator, rejecting rows whose width does not match the schema.
    pub fn generate(&self, context: &QueryContext) -> Result<TableRows> {
        let rows = self.generator.generate(context)?;
        if let Some(row) = rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(SqlError::Table {
                name: self.name.clone(),
                reason: format!(
                    "generated row has {} values, expected {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        Ok(rows)
    }

    /// Drop the plans and cached rows owned by `session`.
    pub fn clear_query_state(&self, session: u64) {
        self.constraints.lock().retain(|(owner, _), _| *owner != session);
        self.cache.lock().retain(|(owner, _), _| *owner != session);
    }

    /// Whether any session holds plans or cached rows for this table.
    pub fn has_query_state(&self) -> bool {
        !self.constraints.lock().is_empty() || !self.cache.lock().is_empty()
    }

    pub fn has_session_state(&self, session: u64) -> bool {
        self.constraints.lock().keys().any(|(owner, _)| *owner == session)
            || self.cache.lock().keys().any(|(owner, _)| *owner == session)
    }
}

/// Registered tables in registration order.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RwLock<IndexMap<String, Arc<VirtualTableContent>>>,
    generation: AtomicU64,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, content: VirtualTableContent) -> Result<Arc<VirtualTableContent>> {
        let mut tables = self.tables.write();
        if tables.contains_key(content.name()) {
            return Err(SqlError::DuplicateTable {
                name: content.name().to_string(),
            });
        }
        let content = Arc::new(content);
        tables.insert(content.name().to_string(), Arc::clone(&content));
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(content)
    }

    pub fn get(&self, name: &str) -> Option<Arc<VirtualTableContent>> {
        self.tables.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn tables(&self) -> Vec<Arc<VirtualTableContent>> {
        self.tables.read().values().cloned().collect()
    }

    pub fn attributes(&self, name: &str) -> Option<TableAttributes> {
        self.tables.read().get(name).map(|t| t.attributes())
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Bumped on every registration.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
pub(crate) mod test_tables {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Two-column table yielding `rows` rows and counting generator calls.
    pub fn counting_table(
        name: &str,
        rows: i64,
        calls: Arc<AtomicUsize>,
    ) -> VirtualTableContent {
        VirtualTableContent::from_fn(
            name,
            vec![
                ColumnDef::new("id", ColumnType::BigInt),
                ColumnDef::new("label", ColumnType::Text),
            ],
            move |_ctx: &QueryContext| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((1..=rows)
                    .map(|i| vec![SqlValue::Integer(i), SqlValue::Text(format!("row{}", i))])
                    .collect())
            },
        )
        .unwrap()
    }

    pub fn simple_table(name: &str, rows: i64) -> VirtualTableContent {
        counting_table(name, rows, Arc::new(AtomicUsize::new(0)))
    }
}
