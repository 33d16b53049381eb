//! CQL schema for the four time-series tables.
//!
//! Each table partitions by validator index and clusters newest-first, matching
//! the read pattern: "recent history for one validator".

/// Table creation statements, applied in order on startup.
pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS validator_snapshots (
        validator_index   BIGINT,
        slot              BIGINT,
        status            TEXT,
        balance           BIGINT,
        effective_balance BIGINT,
        timestamp         TIMESTAMP,
        PRIMARY KEY ((validator_index), slot)
    ) WITH CLUSTERING ORDER BY (slot DESC)"#,
    r#"CREATE TABLE IF NOT EXISTS attestation_duties (
        validator_index    BIGINT,
        epoch              BIGINT,
        slot               BIGINT,
        committee_index    INT,
        committee_position INT,
        timestamp          TIMESTAMP,
        PRIMARY KEY ((validator_index), epoch, slot)
    ) WITH CLUSTERING ORDER BY (epoch DESC, slot DESC)"#,
    r#"CREATE TABLE IF NOT EXISTS attestation_rewards (
        validator_index BIGINT,
        epoch           BIGINT,
        head_reward     BIGINT,
        source_reward   BIGINT,
        target_reward   BIGINT,
        total_reward    BIGINT,
        timestamp       TIMESTAMP,
        PRIMARY KEY ((validator_index), epoch)
    ) WITH CLUSTERING ORDER BY (epoch DESC)"#,
    r#"CREATE TABLE IF NOT EXISTS validator_penalties (
        validator_index BIGINT,
        epoch           BIGINT,
        slot            BIGINT,
        penalty_type    TEXT,
        penalty_gwei    BIGINT,
        timestamp       TIMESTAMP,
        PRIMARY KEY ((validator_index), epoch, slot)
    ) WITH CLUSTERING ORDER BY (epoch DESC, slot DESC)"#,
];

/// Names of all tables, for TTL updates.
pub const TABLES: &[&str] = &[
    "validator_snapshots",
    "attestation_duties",
    "attestation_rewards",
    "validator_penalties",
];

pub fn create_keyspace_cql(keyspace: &str, replication_factor: i32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
         {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    )
}

pub fn set_ttl_cql(table: &str, ttl_seconds: i64) -> String {
    format!(
        "ALTER TABLE {} WITH default_time_to_live = {}",
        table, ttl_seconds
    )
}
