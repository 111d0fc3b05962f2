///
/// SQLite module exposing a `VirtualTableContent` to an engine handle.
///
/// Each table is attached as an eponymous-only module named after the
/// table, so `SELECT * FROM <name>` works without a CREATE VIRTUAL TABLE.
///
/// - `best_index` records the usable comparison constraints as a plan owned
///   by the handle's session and asks SQLite to pass their values to
///   `filter`. Constraints are never omitted; SQLite re-checks every row.
/// - `filter` rebuilds the `QueryContext` from the plan, reports the table
///   to the handle's session and either reuses rows generated earlier in the
///   same query with identical constraints or runs the generator.
///

use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use rusqlite::vtab::{
    Context, IndexInfo, VTab, VTabConnection, VTabCursor, Values, eponymous_only_module,
    sqlite3_vtab, sqlite3_vtab_cursor,
};
use tracing::trace;

use crate::registry::{
    Constraint, ConstraintOp, ConstraintPlan, QueryContext, TableRows, VirtualTableContent,
};
use crate::session::QuerySession;

/// Module auxiliary data: the table and the session of the handle it lives in.
pub struct TableAux {
    content: Arc<VirtualTableContent>,
    session: Arc<QuerySession>,
}

#[repr(C)]
pub struct PluginTable {
    base: sqlite3_vtab,
    content: Arc<VirtualTableContent>,
    session: Arc<QuerySession>,
}

#[repr(C)]
pub struct PluginCursor<'vtab> {
    base: sqlite3_vtab_cursor,
    table: &'vtab PluginTable,
    rows: Arc<TableRows>,
    row: usize,
}

fn module_error(message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::ModuleError(message.into())
}

unsafe impl<'vtab> VTab<'vtab> for PluginTable {
    type Aux = TableAux;
    type Cursor = PluginCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let aux = aux.ok_or_else(|| module_error("table module registered without content"))?;
        let table = PluginTable {
            base: sqlite3_vtab::default(),
            content: Arc::clone(&aux.content),
            session: Arc::clone(&aux.session),
        };
        Ok((aux.content.schema(), table))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let columns = self.content.columns().len();
        let mut usable = Vec::new();
        for (i, constraint) in info.constraints().enumerate() {
            if !constraint.is_usable() {
                continue;
            }
            let Ok(column) = usize::try_from(constraint.column()) else {
                continue;
            };
            if column >= columns {
                continue;
            }
            if let Some(op) = ConstraintOp::from_index_op(&constraint.operator()) {
                usable.push((i, column, op));
            }
        }

        self.session.add_affected_table(&self.content);

        if usable.is_empty() {
            info.set_idx_num(0);
            info.set_estimated_cost(1_000_000.0);
            return Ok(());
        }

        let mut plan = ConstraintPlan::default();
        for (argv, &(i, column, op)) in usable.iter().enumerate() {
            let mut usage = info.constraint_usage(i);
            usage.set_argv_index(argv as c_int + 1);
            usage.set_omit(false);
            plan.constraints.push((column, op));
        }
        let cost = 1_000.0 / usable.len() as f64;
        let idx = self.content.push_constraint_plan(self.session.id(), plan);
        info.set_idx_num(idx);
        info.set_estimated_cost(cost);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<PluginCursor<'vtab>> {
        Ok(PluginCursor {
            base: sqlite3_vtab_cursor::default(),
            table: self,
            rows: Arc::new(Vec::new()),
            row: 0,
        })
    }
}

impl PluginCursor<'_> {
    fn query_context(&self, idx_num: c_int, args: &Values<'_>) -> rusqlite::Result<QueryContext> {
        let table = self.table;
        let mut context = QueryContext {
            constraints: Vec::new(),
            use_cache: table.session.use_cache(),
        };
        if idx_num == 0 {
            return Ok(context);
        }

        let plan = match table.content.constraint_plan(table.session.id(), idx_num) {
            Some(plan) if plan.constraints.len() == args.len() => plan,
            _ => {
                trace!(
                    table = table.content.name(),
                    idx_num, "constraint plan cleared, scanning unconstrained"
                );
                return Ok(context);
            }
        };

        for (i, (column, op)) in plan.constraints.into_iter().enumerate() {
            let value: SqlValue = args.get(i)?;
            let name = table.content.columns()[column].name.clone();
            context.constraints.push(Constraint {
                column: name,
                op,
                value,
            });
        }
        Ok(context)
    }
}

unsafe impl VTabCursor for PluginCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let table = self.table;
        let context = self.query_context(idx_num, args)?;
        let session = table.session.id();
        let key = context.cache_key();

        table.session.add_affected_table(&table.content);

        self.rows = match table.content.cached_rows(session, &key) {
            Some(rows) => rows,
            None => {
                let rows = table
                    .content
                    .generate(&context)
                    .map_err(|e| module_error(e.to_string()))?;
                let rows = Arc::new(rows);
                table.content.store_rows(session, key, Arc::clone(&rows));
                rows
            }
        };
        self.row = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.row += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.row >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let value = usize::try_from(i)
            .ok()
            .and_then(|i| self.rows.get(self.row)?.get(i));
        match value {
            Some(value) => ctx.set_result(value),
            None => ctx.set_result(&SqlValue::Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.row as i64)
    }
}

/// Attach `content` to `conn`, reporting into `session`.
pub fn attach_table(
    conn: &Connection,
    content: &Arc<VirtualTableContent>,
    session: &Arc<QuerySession>,
) -> rusqlite::Result<()> {
    let aux = TableAux {
        content: Arc::clone(content),
        session: Arc::clone(session),
    };
    conn.create_module(
        content.name(),
        eponymous_only_module::<PluginTable>(),
        Some(aux),
    )
}
