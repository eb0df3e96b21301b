pub const CHECKPOINTS_TABLE: &str = "troupe_checkpoints";
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_CHECKPOINTS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS troupe_checkpoints (\
    thread_id TEXT NOT NULL,\
    seq INTEGER NOT NULL,\
    run_id TEXT NOT NULL,\
    created_at TEXT NOT NULL,\
    step INTEGER NOT NULL,\
    ran_json TEXT NOT NULL,\
    queue_json TEXT NOT NULL,\
    state_json TEXT NOT NULL,\
    PRIMARY KEY (thread_id, seq)\
)";

pub const CREATE_SCHEMA_VERSION_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS troupe_schema_version (\
    version INTEGER NOT NULL\
)";

pub const MIGRATION_STATEMENTS_SQL: [&str; 2] =
    [CREATE_CHECKPOINTS_TABLE_SQL, CREATE_SCHEMA_VERSION_TABLE_SQL];
