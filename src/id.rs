use uuid::Uuid;

/// UUIDv7 keeps primary keys roughly time-ordered, which keeps btree inserts cheap.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}
