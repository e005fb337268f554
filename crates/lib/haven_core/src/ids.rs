// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// PostgreSQL does not natively support UUIDv7 for auto-generation.
// For tables where time-ordering matters (session tokens, one-time
// codes), we generate UUIDv7 app-side. Tables where time-ordering is
// irrelevant (users, organizations) continue to use PG's
// gen_random_uuid() (v4).

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
