/// Structural validation of the PostgreSQL migration file. Full execution
/// against a live database is covered by `pairing_flow.rs`.
const MIGRATION_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/0001_init.sql");

fn read_migration() -> String {
    std::fs::read_to_string(MIGRATION_PATH)
        .expect("migration file should exist at services/gateway/migrations/0001_init.sql")
}

#[test]
fn all_five_tables_are_defined() {
    let sql = read_migration();
    for table in ["buckets", "entry_codes", "device_owners", "users", "weather_cache"] {
        assert!(
            sql.contains(&format!("CREATE TABLE {table}")),
            "migration must define {table} table"
        );
    }
}

#[test]
fn buckets_has_composite_primary_key() {
    let sql = read_migration();
    assert!(sql.contains("PRIMARY KEY (serial, object_key)"));
}

#[test]
fn entry_codes_code_is_the_primary_key() {
    let sql = read_migration();
    assert!(sql.contains("code        TEXT PRIMARY KEY") || sql.contains("code TEXT PRIMARY KEY"));
}

#[test]
fn weather_cache_has_composite_primary_key() {
    let sql = read_migration();
    assert!(sql.contains("PRIMARY KEY (postal_code, country)"));
}
