//! Column bookkeeping and additive schema evolution for the node and edge tables.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::info;

use crate::error::{GraphError, Result};
use crate::store::meta;
use crate::types::{Attributes, ColumnType};

/// The two graph tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    /// `nodes`
    Nodes,
    /// `edges`
    Edges,
}

impl Table {
    /// SQL table name.
    pub fn name(self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::Edges => "edges",
        }
    }

    /// Columns owned by the adapter; attributes may not use these names.
    pub fn reserved(self) -> &'static [&'static str] {
        match self {
            Table::Nodes => &["_id", "_key", "_x", "_y"],
            Table::Edges => &["_id", "_u", "_v"],
        }
    }

    /// Reserved columns that are still reported as attributes when a row is read.
    fn visible_reserved(self) -> &'static [&'static str] {
        match self {
            Table::Nodes => &["_x", "_y"],
            Table::Edges => &[],
        }
    }
}

/// A column as recorded in the table definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Column {
    pub(crate) name: String,
    pub(crate) ty: Option<ColumnType>,
}

/// Quotes an identifier for use in SQL text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Clone, Debug)]
pub(crate) struct TableSchema {
    table: Table,
    columns: Vec<Column>,
    by_folded: HashMap<String, usize>,
    select_list: String,
}

impl TableSchema {
    fn load(conn: &Connection, table: Table) -> Result<Self> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.name()))?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let declared: String = row.get(2)?;
            columns.push(Column {
                name,
                ty: ColumnType::from_declared(&declared),
            });
        }
        if columns.is_empty() {
            return Err(GraphError::Schema(format!(
                "table '{}' does not exist",
                table.name()
            )));
        }
        let mut schema = TableSchema {
            table,
            columns: Vec::new(),
            by_folded: HashMap::new(),
            select_list: String::new(),
        };
        for column in columns {
            schema.push(column);
        }
        for reserved in table.reserved() {
            if schema.lookup(reserved).is_none() {
                return Err(GraphError::Schema(format!(
                    "table '{}' lacks column '{reserved}'",
                    table.name()
                )));
            }
        }
        Ok(schema)
    }

    fn push(&mut self, column: Column) {
        self.by_folded
            .insert(column.name.to_ascii_lowercase(), self.columns.len());
        self.columns.push(column);
        self.select_list = self
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
    }

    pub(crate) fn table(&self) -> Table {
        self.table
    }

    /// Case-insensitive lookup, matching SQLite's identifier rules.
    pub(crate) fn lookup(&self, name: &str) -> Option<&Column> {
        self.by_folded
            .get(&name.to_ascii_lowercase())
            .map(|idx| &self.columns[*idx])
    }

    /// Every column, quoted, in table order.
    pub(crate) fn select_list(&self) -> &str {
        &self.select_list
    }

    /// Position of `name` in [`Self::select_list`].
    pub(crate) fn position(&self, name: &str) -> Result<usize> {
        self.by_folded
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                GraphError::Schema(format!(
                    "table '{}' lacks column '{name}'",
                    self.table.name()
                ))
            })
    }

    /// Columns reported as attributes when reading a row, with their positions.
    pub(crate) fn attribute_columns(&self) -> impl Iterator<Item = (usize, &Column)> {
        let table = self.table;
        self.columns.iter().enumerate().filter(move |(_, c)| {
            !is_reserved(table, &c.name) || is_visible_reserved(table, &c.name)
        })
    }

    /// Attribute column names in table order.
    pub(crate) fn attribute_names(&self) -> Vec<String> {
        self.attribute_columns()
            .map(|(_, c)| c.name.clone())
            .collect()
    }
}

fn is_reserved(table: Table, name: &str) -> bool {
    table
        .reserved()
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

fn is_visible_reserved(table: Table, name: &str) -> bool {
    table
        .visible_reserved()
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

/// In-process view of both table definitions.
///
/// The cache is keyed on SQLite's `schema_version` cookie so that columns added by another
/// process are picked up at the start of the next write batch.
#[derive(Clone, Debug)]
pub(crate) struct Schema {
    nodes: TableSchema,
    edges: TableSchema,
    cookie: i64,
}

impl Schema {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        Ok(Schema {
            nodes: TableSchema::load(conn, Table::Nodes)?,
            edges: TableSchema::load(conn, Table::Edges)?,
            cookie: schema_cookie(conn)?,
        })
    }

    pub(crate) fn table(&self, table: Table) -> &TableSchema {
        match table {
            Table::Nodes => &self.nodes,
            Table::Edges => &self.edges,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut TableSchema {
        match table {
            Table::Nodes => &mut self.nodes,
            Table::Edges => &mut self.edges,
        }
    }

    pub(crate) fn refresh_if_stale(&mut self, conn: &Connection) -> Result<()> {
        if schema_cookie(conn)? != self.cookie {
            *self = Schema::load(conn)?;
        }
        Ok(())
    }

    /// Adds a nullable column for every attribute key the table does not have yet.
    ///
    /// The column type comes from the value supplied here. Keys whose value is null are left
    /// alone until a typed value shows up. Returns the names of the columns created.
    pub(crate) fn ensure_columns(
        &mut self,
        conn: &Connection,
        table: Table,
        attrs: &Attributes,
    ) -> Result<Vec<String>> {
        validate_names(table, attrs)?;
        let mut added = Vec::new();
        for (key, value) in attrs {
            if self.table(table).lookup(key).is_some() {
                continue;
            }
            let Some(ty) = value.column_type() else {
                continue;
            };
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table.name(),
                    quote_ident(key),
                    ty.sql_name()
                ),
                [],
            )?;
            let version = meta::bump_schema_version(conn)?;
            info!(
                table = table.name(),
                column = %key,
                column_type = ty.sql_name(),
                schema_version = version,
                "store.schema.column_added"
            );
            self.table_mut(table).push(Column {
                name: key.clone(),
                ty: Some(ty),
            });
            added.push(key.clone());
        }
        if !added.is_empty() {
            self.cookie = schema_cookie(conn)?;
        }
        Ok(added)
    }
}

/// Rejects attribute names the table cannot store.
pub(crate) fn validate_names(table: Table, attrs: &Attributes) -> Result<()> {
    let mut folded: HashMap<String, &str> = HashMap::with_capacity(attrs.len());
    for key in attrs.keys() {
        if key.is_empty() {
            return Err(GraphError::Schema("attribute names must not be empty".into()));
        }
        if is_reserved(table, key) {
            return Err(GraphError::Schema(format!(
                "'{key}' is a reserved column of table '{}'",
                table.name()
            )));
        }
        if let Some(previous) = folded.insert(key.to_ascii_lowercase(), key) {
            return Err(GraphError::Schema(format!(
                "attribute names '{previous}' and '{key}' differ only by case"
            )));
        }
    }
    Ok(())
}

fn schema_cookie(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA schema_version", [], |row| row.get(0))?)
}
