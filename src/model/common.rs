use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Current UTC time, the single timestamp source for all record stamps.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
