use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

// Prices and volumes hold canonical decimal text. No fixed DECIMAL(p, s) spans both
// 28-digit fractions and 28-digit integers.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_bar_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS bars_1m_id_seq;
CREATE SEQUENCE IF NOT EXISTS bars_1h_id_seq;
CREATE SEQUENCE IF NOT EXISTS bars_1d_id_seq;

CREATE TABLE IF NOT EXISTS bars_1m (
    id BIGINT NOT NULL DEFAULT nextval('bars_1m_id_seq'),
    symbol TEXT NOT NULL,
    quote_currency TEXT NOT NULL,
    ts TIMESTAMP NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume_base TEXT NOT NULL,
    volume_quote TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(symbol, quote_currency, ts)
);

CREATE TABLE IF NOT EXISTS bars_1h (
    id BIGINT NOT NULL DEFAULT nextval('bars_1h_id_seq'),
    symbol TEXT NOT NULL,
    quote_currency TEXT NOT NULL,
    ts TIMESTAMP NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume_base TEXT NOT NULL,
    volume_quote TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(symbol, quote_currency, ts)
);

CREATE TABLE IF NOT EXISTS bars_1d (
    id BIGINT NOT NULL DEFAULT nextval('bars_1d_id_seq'),
    symbol TEXT NOT NULL,
    quote_currency TEXT NOT NULL,
    ts TIMESTAMP NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume_base TEXT NOT NULL,
    volume_quote TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(symbol, quote_currency, ts)
);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}
