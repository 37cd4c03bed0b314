//! User directory: resolves handles to identities.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use parking_lot::RwLock;

use super::pool::DbPool;
use super::schema::users;
use super::StoreError;
use crate::models::user::Identity;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact, case-sensitive handle lookup.
    async fn find_by_handle(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    /// Case-insensitive substring search, ordered by lowercased username with
    /// the exact username breaking ties.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Identity>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

diesel::define_sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

/// Escape `LIKE` metacharacters so the query matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn find_by_handle(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let mut conn = self.pool.get().await?;
        let identity = diesel_async::RunQueryDsl::get_result(
            users::table
                .filter(users::username.eq(username))
                .select(Identity::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(identity)
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Identity>, StoreError> {
        let mut conn = self.pool.get().await?;
        let pattern = like_pattern(query);
        let found = diesel_async::RunQueryDsl::load(
            users::table
                .filter(users::username.ilike(&pattern).or(users::email.ilike(&pattern)))
                .order((lower(users::username).asc(), users::username.asc()))
                .limit(limit)
                .select(Identity::as_select()),
            &mut conn,
        )
        .await?;
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// In-memory (tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDirectory {
    by_username: RwLock<BTreeMap<String, Identity>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Identity>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    pub fn insert(&self, identity: Identity) {
        self.by_username.write().insert(identity.username.clone(), identity);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_handle(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.by_username.read().get(username).cloned())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Identity>, StoreError> {
        let needle = query.to_lowercase();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let mut found: Vec<Identity> = self
            .by_username
            .read()
            .values()
            .filter(|identity| identity.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by_cached_key(|identity| (identity.username.to_lowercase(), identity.username.clone()));
        found.truncate(limit);
        Ok(found)
    }
}
