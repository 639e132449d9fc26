// used for persistence
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use crate::error::Result;
use crate::metadata::{Column, MetadataStore, NodeId, Snapshot};
use crate::results::{BinPurger, ResultRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
}
impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Persistor> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists NodeMetadata (
                Node_Identity text not null,
                Field text not null,
                Value text not null,
                constraint unique_and_referenceable_NodeMetadata primary key (
                    Node_Identity,
                    Field
                )
            );-- STRICT;
            create table if not exists BinnedResult (
                Node_Identity text not null,
                Bin_Identity integer not null,
                Row text not null
            );-- STRICT;
            create index if not exists BinnedResult_by_bin on BinnedResult (
                Node_Identity,
                Bin_Identity
            );
            ",
        )?;
        Ok(Persistor { connection })
    }
    /// A read-write transaction; it is rolled back unless committed.
    pub fn transaction(&mut self) -> Result<SqliteTransaction<'_>> {
        let tx = self.connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { tx })
    }
    /// A read transaction giving a consistent view of the graph.
    pub fn snapshot(&mut self) -> Result<SqliteTransaction<'_>> {
        let tx = self.connection.transaction_with_behavior(TransactionBehavior::Deferred)?;
        Ok(SqliteTransaction { tx })
    }
}

pub struct SqliteTransaction<'c> {
    tx: Transaction<'c>,
}
impl SqliteTransaction<'_> {
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
    pub fn add_result(&self, node_id: &NodeId, bin_id: i64, row: &ResultRow) -> Result<()> {
        let text = serde_json::to_string(row)?;
        self.tx
            .prepare_cached(
                "
                insert into BinnedResult (
                    Node_Identity,
                    Bin_Identity,
                    Row
                ) values (?, ?, ?)
            ",
            )?
            .execute(params![node_id.as_str(), bin_id, text])?;
        Ok(())
    }
    pub fn results(&self, node_id: &NodeId, bin_id: i64) -> Result<Vec<ResultRow>> {
        let mut statement = self.tx.prepare_cached(
            "
            select Row
                from BinnedResult
                where Node_Identity = ?
                and Bin_Identity = ?
                order by rowid
        ",
        )?;
        let texts = statement
            .query_map(params![node_id.as_str(), bin_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            rows.push(serde_json::from_str(&text)?);
        }
        Ok(rows)
    }
}
impl Snapshot for SqliteTransaction<'_> {
    fn get(&self, id: &NodeId, column: Column) -> Result<Option<String>> {
        let value = self
            .tx
            .prepare_cached(
                "
                select Value
                    from NodeMetadata
                    where Node_Identity = ?
                    and Field = ?
            ",
            )?
            .query_row(params![id.as_str(), column.name()], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }
}
impl MetadataStore for SqliteTransaction<'_> {
    fn put(&mut self, id: &NodeId, column: Column, value: &str) -> Result<()> {
        self.tx
            .prepare_cached(
                "
                insert into NodeMetadata (
                    Node_Identity,
                    Field,
                    Value
                ) values (?, ?, ?)
                on conflict (Node_Identity, Field) do update set Value = excluded.Value
            ",
            )?
            .execute(params![id.as_str(), column.name(), value])?;
        Ok(())
    }
}
impl BinPurger for SqliteTransaction<'_> {
    fn purge_bin(&mut self, node_id: &NodeId, bin_id: i64) -> Result<usize> {
        let deleted = self
            .tx
            .prepare_cached(
                "
                delete from BinnedResult
                    where Node_Identity = ?
                    and Bin_Identity = ?
            ",
            )?
            .execute(params![node_id.as_str(), bin_id])?;
        Ok(deleted)
    }
}
