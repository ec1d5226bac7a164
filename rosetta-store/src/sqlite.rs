//! SQLite backed [`VersionedReader`] and [`VersionedWriter`].
//!
//! A dedicated writer connection serializes `apply_changes`, while an r2d2
//! pool of read-only connections serves queries. With WAL journaling readers
//! keep seeing the last committed block while a new one is being written.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;

use alloy_primitives::Address;
use alloy_primitives::U256;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rosetta_types::BlockChangeSet;
use rosetta_types::BlockNr;
use rosetta_types::TxIndex;
use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use tracing::debug;

use crate::StoreError;
use crate::StoreResult;
use crate::VersionedReader;
use crate::VersionedWriter;

const DEFAULT_READ_POOL_SIZE: u32 = 4;

pub struct SqliteStore {
    read_pool: Pool<SqliteConnectionManager>,
    writer: Mutex<Connection>,
}

fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;",
    )
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path`.
    pub fn new(
        db_path: impl AsRef<Path>,
        read_pool_size: u32,
    ) -> StoreResult<Self> {
        let writer = Connection::open(&db_path)?;
        configure_connection(&writer)?;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|conn| configure_connection(conn));

        Self::with_connections(writer, manager, read_pool_size)
    }

    /// A private in-memory database, shared between the writer and the pool.
    pub fn in_memory() -> StoreResult<Self> {
        let uri = format!("file:rosetta_{}?mode=memory&cache=shared", unique_id());
        let writer = Connection::open(&uri)?;
        configure_connection(&writer)?;

        let manager =
            SqliteConnectionManager::file(&uri).with_init(|conn| configure_connection(conn));

        Self::with_connections(writer, manager, DEFAULT_READ_POOL_SIZE)
    }

    fn with_connections(
        writer: Connection,
        manager: SqliteConnectionManager,
        read_pool_size: u32,
    ) -> StoreResult<Self> {
        init_schema(&writer)?;

        let read_pool = Pool::builder()
            .max_size(read_pool_size.max(1))
            .build(manager)?;

        let store = Self {
            read_pool,
            writer: Mutex::new(writer),
        };

        debug!(
            last_persisted_block = store.last_persisted_block()?,
            "versioned store opened"
        );
        Ok(store)
    }

    fn read_conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.read_pool.get()?)
    }

    fn writer(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::Sqlite("writer connection lock poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS registry_bindings (
             contract TEXT NOT NULL,
             from_block INTEGER NOT NULL,
             from_tx INTEGER NOT NULL,
             address BLOB NOT NULL,
             PRIMARY KEY (contract, from_block, from_tx)
         );

         CREATE TABLE IF NOT EXISTS fee_parameter_samples (
             from_block INTEGER PRIMARY KEY,
             value BLOB NOT NULL
         );

         CREATE TABLE IF NOT EXISTS watermark (
             id INTEGER PRIMARY KEY CHECK (id = 0),
             last_persisted_block INTEGER NOT NULL
         );
         INSERT OR IGNORE INTO watermark (id, last_persisted_block) VALUES (0, 0);",
    )?;
    Ok(())
}

impl VersionedReader for SqliteStore {
    fn last_persisted_block(&self) -> StoreResult<BlockNr> {
        let conn = self.read_conn()?;
        read_watermark(&conn)
    }

    fn fee_parameter_as_of(
        &self,
        block: BlockNr,
    ) -> StoreResult<U256> {
        let mut conn = self.read_conn()?;
        let snapshot = conn.transaction()?;
        ensure_not_future(&snapshot, block)?;

        let value: Option<Vec<u8>> = snapshot
            .query_row(
                "SELECT value FROM fee_parameter_samples
                 WHERE from_block <= ?1
                 ORDER BY from_block DESC
                 LIMIT 1",
                params![to_sql_int(block)?],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(bytes) => Ok(u256_from_row(&bytes, 0)?),
            None => Ok(U256::ZERO),
        }
    }

    fn registry_address_as_of(
        &self,
        block: BlockNr,
        tx_index: TxIndex,
        contract: &str,
    ) -> StoreResult<Address> {
        let mut conn = self.read_conn()?;
        let snapshot = conn.transaction()?;
        ensure_not_future(&snapshot, block)?;

        query_binding(&snapshot, block, tx_index, contract)?.ok_or_else(|| {
            StoreError::ContractNotFound {
                contract: contract.to_string(),
                block,
                tx_index,
            }
        })
    }

    fn registry_address_after_watermark(
        &self,
        contract: &str,
    ) -> StoreResult<Address> {
        let mut conn = self.read_conn()?;
        let snapshot = conn.transaction()?;
        let last_persisted = read_watermark(&snapshot)?;

        query_binding(&snapshot, last_persisted + 1, 0, contract)?.ok_or_else(|| {
            StoreError::ContractNotFound {
                contract: contract.to_string(),
                block: last_persisted,
                tx_index: TxIndex::MAX,
            }
        })
    }

    fn registry_addresses_as_of(
        &self,
        block: BlockNr,
        tx_index: TxIndex,
        contracts: &[&str],
    ) -> StoreResult<HashMap<String, Address>> {
        let mut conn = self.read_conn()?;
        let snapshot = conn.transaction()?;
        ensure_not_future(&snapshot, block)?;

        let mut addresses = HashMap::with_capacity(contracts.len());
        for contract in contracts {
            if let Some(address) = query_binding(&snapshot, block, tx_index, contract)? {
                addresses.insert(contract.to_string(), address);
            }
        }
        Ok(addresses)
    }
}

impl VersionedWriter for SqliteStore {
    fn apply_changes(
        &self,
        changes: &BlockChangeSet,
    ) -> StoreResult<()> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;

        // The transaction rolls back when dropped on the error path.
        write_changes(&tx, changes).map_err(into_write_failure)?;
        tx.commit()
            .map_err(|err| into_write_failure(err.into()))?;

        debug!(
            block = changes.block_number,
            registry_changes = changes.registry_changes.len(),
            fee_parameter = ?changes.fee_parameter,
            "applied block changes"
        );
        Ok(())
    }
}

fn write_changes(
    tx: &Connection,
    changes: &BlockChangeSet,
) -> StoreResult<()> {
    let block = to_sql_int(changes.block_number)?;
    // Blocks up to the watermark were already served, a replay may only
    // repeat what they contain. The empty store has persisted nothing.
    let persisted = read_watermark(tx)?;
    let replay = persisted > 0 && changes.block_number <= persisted;
    let refuse_new = |what: String| StoreError::WriteFailure {
        reason: format!(
            "block {} is at or below the watermark {persisted}, refusing new {what}",
            changes.block_number
        ),
    };

    tx.execute(
        "UPDATE watermark
         SET last_persisted_block = MAX(last_persisted_block, ?1)
         WHERE id = 0",
        params![block],
    )?;

    if let Some(value) = changes.fee_parameter {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO fee_parameter_samples (from_block, value) VALUES (?1, ?2)",
            params![block, value.to_be_bytes::<32>().as_slice()],
        )?;
        if inserted > 0 && replay {
            return Err(refuse_new(format!("fee parameter {value}")));
        }
        if inserted == 0 {
            let existing: Vec<u8> = tx.query_row(
                "SELECT value FROM fee_parameter_samples WHERE from_block = ?1",
                params![block],
                |row| row.get(0),
            )?;
            let existing = u256_from_row(&existing, 0)?;
            if existing != value {
                return Err(StoreError::WriteFailure {
                    reason: format!(
                        "fee parameter of block {} is already {existing}, refusing {value}",
                        changes.block_number
                    ),
                });
            }
        }
    }

    for binding in changes.bindings() {
        if binding.contract.is_empty() {
            return Err(StoreError::WriteFailure {
                reason: format!(
                    "empty contract name at block {} tx {}",
                    binding.from_block, binding.from_tx
                ),
            });
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO registry_bindings (contract, from_block, from_tx, address)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                binding.contract,
                block,
                i64::from(binding.from_tx),
                binding.address.as_slice()
            ],
        )?;
        if inserted > 0 && replay {
            return Err(refuse_new(format!(
                "binding of {} at tx {}",
                binding.contract, binding.from_tx
            )));
        }
        if inserted == 0 {
            let existing: Vec<u8> = tx.query_row(
                "SELECT address FROM registry_bindings
                 WHERE contract = ?1 AND from_block = ?2 AND from_tx = ?3",
                params![binding.contract, block, i64::from(binding.from_tx)],
                |row| row.get(0),
            )?;
            let existing = address_from_row(&existing, 0)?;
            if existing != binding.address {
                return Err(StoreError::WriteFailure {
                    reason: format!(
                        "{} at block {} tx {} is already bound to {existing}, refusing {}",
                        binding.contract, binding.from_block, binding.from_tx, binding.address
                    ),
                });
            }
        }
    }

    Ok(())
}

fn into_write_failure(err: StoreError) -> StoreError {
    match err {
        StoreError::WriteFailure { .. } => err,
        other => StoreError::WriteFailure {
            reason: other.to_string(),
        },
    }
}

fn read_watermark(conn: &Connection) -> StoreResult<BlockNr> {
    let block: i64 = conn.query_row(
        "SELECT last_persisted_block FROM watermark WHERE id = 0",
        [],
        |row| row.get(0),
    )?;
    from_sql_int(block)
}

fn ensure_not_future(
    conn: &Connection,
    block: BlockNr,
) -> StoreResult<()> {
    let last_persisted = read_watermark(conn)?;
    if block > last_persisted {
        return Err(StoreError::FutureQuery {
            requested: block,
            last_persisted,
        });
    }
    Ok(())
}

/// Latest binding of `contract` strictly before `(block, tx_index)`.
fn query_binding(
    conn: &Connection,
    block: BlockNr,
    tx_index: TxIndex,
    contract: &str,
) -> StoreResult<Option<Address>> {
    let address: Option<Vec<u8>> = conn
        .query_row(
            "SELECT address FROM registry_bindings
             WHERE contract = ?1
               AND (from_block < ?2 OR (from_block = ?2 AND from_tx < ?3))
             ORDER BY from_block DESC, from_tx DESC
             LIMIT 1",
            params![contract, to_sql_int(block)?, i64::from(tx_index)],
            |row| row.get(0),
        )
        .optional()?;

    Ok(address
        .map(|bytes| address_from_row(&bytes, 0))
        .transpose()?)
}

fn to_sql_int(value: u64) -> StoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::Sqlite(format!("{value} exceeds the sqlite integer range")))
}

fn from_sql_int(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Sqlite(format!("negative block number {value}")))
}

fn unique_id() -> u64 {
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn address_from_row(
    bytes: &[u8],
    col: usize,
) -> rusqlite::Result<Address> {
    if bytes.len() != 20 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Blob,
            format!("expected 20 bytes for Address, got {}", bytes.len()).into(),
        ));
    }
    Ok(Address::from_slice(bytes))
}

fn u256_from_row(
    bytes: &[u8],
    col: usize,
) -> rusqlite::Result<U256> {
    if bytes.len() != 32 {
        return Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Blob,
            format!("expected 32 bytes for U256, got {}", bytes.len()).into(),
        ));
    }
    Ok(U256::from_be_slice(bytes))
}
