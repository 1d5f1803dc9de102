// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use rusqlite::{params, Row};
use thiserror::Error;

use crate::db::models::{Category, Page, User, UserProfile};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

fn category_from_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        views: row.get(2)?,
        likes: row.get(3)?,
    })
}

fn page_from_row(row: &Row) -> Result<Page, rusqlite::Error> {
    Ok(Page {
        id: row.get(0)?,
        category_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        views: row.get(4)?,
    })
}

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Category queries in exactly the shapes the handlers use.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn insert(&self, name: &str) -> Result<Category, RepositoryError>;

    async fn by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError>;

    async fn by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;

    /// Top `n` categories ordered by likes descending.
    async fn top_by_likes(&self, n: usize) -> Result<Vec<Category>, RepositoryError>;

    /// Full category index, alphabetical.
    async fn all_by_name(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn name_starts_with(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Category>, RepositoryError>;

    /// Atomic `likes = likes + 1`. Returns the new count, or None on a miss.
    async fn increment_likes(&self, id: i64) -> Result<Option<i64>, RepositoryError>;
}

/// Page queries in exactly the shapes the handlers use.
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn insert(
        &self,
        category_id: i64,
        title: &str,
        url: &str,
    ) -> Result<Page, RepositoryError>;

    async fn by_category(&self, category_id: i64) -> Result<Vec<Page>, RepositoryError>;

    async fn by_category_top_by_views(
        &self,
        category_id: i64,
    ) -> Result<Vec<Page>, RepositoryError>;

    async fn top_by_views(&self, n: usize) -> Result<Vec<Page>, RepositoryError>;

    /// Atomic `views = views + 1`. Returns the stored URL, or None on a miss.
    async fn increment_views(&self, id: i64) -> Result<Option<String>, RepositoryError>;

    /// Idempotent lookup-or-insert keyed on (category, title, url).
    async fn get_or_create(
        &self,
        category_id: i64,
        title: &str,
        url: &str,
    ) -> Result<Page, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the user and their profile in a single transaction.
    /// `password_hash` must already be hashed by the caller.
    async fn create_with_profile(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        website: Option<&str>,
        picture_path: Option<&str>,
    ) -> Result<User, RepositoryError>;

    async fn by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn profile_for(&self, user_id: &str) -> Result<Option<UserProfile>, RepositoryError>;
}

/// SQLite implementations
pub struct SqliteCategoryRepository {
    pool: DbPool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn insert(&self, name: &str) -> Result<Category, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "INSERT INTO categories (name) VALUES (?1) RETURNING id, name, views, likes",
            params![name],
            category_from_row,
        );
        match result {
            Ok(category) => Ok(category),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RepositoryError::Conflict(format!(
                    "category '{}' already exists",
                    name
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT id, name, views, likes FROM categories WHERE id = ?1",
            params![id],
            category_from_row,
        );
        match result {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT id, name, views, likes FROM categories WHERE name = ?1",
            params![name],
            category_from_row,
        );
        match result {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn top_by_likes(&self, n: usize) -> Result<Vec<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, views, likes FROM categories ORDER BY likes DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], category_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn all_by_name(&self) -> Result<Vec<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, name, views, likes FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], category_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn name_starts_with(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, views, likes FROM categories
             WHERE name LIKE ?1 || '%' ESCAPE '\\'
             ORDER BY name LIMIT ?2",
        )?;
        let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let rows = stmt.query_map(params![escaped, limit as i64], category_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn increment_likes(&self, id: i64) -> Result<Option<i64>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "UPDATE categories SET likes = likes + 1 WHERE id = ?1 RETURNING likes",
            params![id],
            |row| row.get(0),
        );
        match result {
            Ok(likes) => Ok(Some(likes)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct SqlitePageRepository {
    pool: DbPool,
}

impl SqlitePageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageRepository for SqlitePageRepository {
    async fn insert(
        &self,
        category_id: i64,
        title: &str,
        url: &str,
    ) -> Result<Page, RepositoryError> {
        let conn = self.pool.get()?;
        let page = conn.query_row(
            "INSERT INTO pages (category_id, title, url) VALUES (?1, ?2, ?3)
             RETURNING id, category_id, title, url, views",
            params![category_id, title, url],
            page_from_row,
        )?;
        Ok(page)
    }

    async fn by_category(&self, category_id: i64) -> Result<Vec<Page>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_id, title, url, views FROM pages WHERE category_id = ?1",
        )?;
        let rows = stmt.query_map(params![category_id], page_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn by_category_top_by_views(
        &self,
        category_id: i64,
    ) -> Result<Vec<Page>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_id, title, url, views FROM pages
             WHERE category_id = ?1 ORDER BY views DESC",
        )?;
        let rows = stmt.query_map(params![category_id], page_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn top_by_views(&self, n: usize) -> Result<Vec<Page>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_id, title, url, views FROM pages ORDER BY views DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n as i64], page_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn increment_views(&self, id: i64) -> Result<Option<String>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "UPDATE pages SET views = views + 1 WHERE id = ?1 RETURNING url",
            params![id],
            |row| row.get(0),
        );
        match result {
            Ok(url) => Ok(Some(url)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_or_create(
        &self,
        category_id: i64,
        title: &str,
        url: &str,
    ) -> Result<Page, RepositoryError> {
        let conn = self.pool.get()?;
        let existing = conn.query_row(
            "SELECT id, category_id, title, url, views FROM pages
             WHERE category_id = ?1 AND title = ?2 AND url = ?3",
            params![category_id, title, url],
            page_from_row,
        );
        match existing {
            Ok(page) => Ok(page),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                let page = conn.query_row(
                    "INSERT INTO pages (category_id, title, url) VALUES (?1, ?2, ?3)
                     RETURNING id, category_id, title, url, views",
                    params![category_id, title, url],
                    page_from_row,
                )?;
                Ok(page)
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_with_profile(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        website: Option<&str>,
        picture_path: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let id = uuid::Uuid::now_v7().to_string();
        let result = tx.query_row(
            "INSERT INTO users (id, username, email, password_hash)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, username, email, password_hash, is_active, created_at",
            params![id, username, email, password_hash],
            user_from_row,
        );
        let user = match result {
            Ok(user) => user,
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(RepositoryError::Conflict(format!(
                    "username '{}' is taken",
                    username
                )));
            }
            Err(e) => return Err(e.into()),
        };

        tx.execute(
            "INSERT INTO profiles (user_id, website, picture_path) VALUES (?1, ?2, ?3)",
            params![user.id, website, picture_path],
        )?;

        tx.commit()?;
        Ok(user)
    }

    async fn by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT id, username, email, password_hash, is_active, created_at
             FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn profile_for(&self, user_id: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let conn = self.pool.get()?;
        let result = conn.query_row(
            "SELECT user_id, website, picture_path FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserProfile {
                    user_id: row.get(0)?,
                    website: row.get(1)?,
                    picture_path: row.get(2)?,
                })
            },
        );
        match result {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn insert_and_lookup_category() {
        let repo = SqliteCategoryRepository::new(test_pool());
        let cat = repo.insert("Python").await.unwrap();
        assert_eq!(cat.likes, 0);
        assert_eq!(cat.views, 0);

        let found = repo.by_name("Python").await.unwrap().unwrap();
        assert_eq!(found.id, cat.id);
        assert!(repo.by_name("Rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_category_is_a_conflict() {
        let repo = SqliteCategoryRepository::new(test_pool());
        repo.insert("Python").await.unwrap();
        let err = repo.insert("Python").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn top_by_likes_orders_descending() {
        let pool = test_pool();
        let repo = SqliteCategoryRepository::new(pool.clone());
        for name in ["A", "B", "C"] {
            repo.insert(name).await.unwrap();
        }
        let b = repo.by_name("B").await.unwrap().unwrap();
        for _ in 0..3 {
            repo.increment_likes(b.id).await.unwrap();
        }
        let c = repo.by_name("C").await.unwrap().unwrap();
        repo.increment_likes(c.id).await.unwrap();

        let top = repo.top_by_likes(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "B");
        assert_eq!(top[1].name, "C");
    }

    #[tokio::test]
    async fn increment_likes_returns_new_count_and_handles_misses() {
        let repo = SqliteCategoryRepository::new(test_pool());
        let cat = repo.insert("Python").await.unwrap();
        assert_eq!(repo.increment_likes(cat.id).await.unwrap(), Some(1));
        assert_eq!(repo.increment_likes(cat.id).await.unwrap(), Some(2));
        assert_eq!(repo.increment_likes(9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn name_starts_with_filters_and_limits() {
        let repo = SqliteCategoryRepository::new(test_pool());
        for name in ["Python", "Python Web", "Perl", "Rust"] {
            repo.insert(name).await.unwrap();
        }
        let hits = repo.name_starts_with("Py", 8).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|c| c.name.starts_with("Py")));

        let limited = repo.name_starts_with("P", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn like_wildcards_in_prefix_are_literal() {
        let repo = SqliteCategoryRepository::new(test_pool());
        repo.insert("Python").await.unwrap();
        repo.insert("P_thon").await.unwrap();
        let hits = repo.name_starts_with("P_", 8).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "P_thon");
        assert!(repo.name_starts_with("%", 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_views_increment_atomically_and_return_url() {
        let pool = test_pool();
        let cats = SqliteCategoryRepository::new(pool.clone());
        let pages = SqlitePageRepository::new(pool);
        let cat = cats.insert("Python").await.unwrap();
        let page = pages
            .insert(cat.id, "Docs", "http://docs.python.org")
            .await
            .unwrap();

        assert_eq!(
            pages.increment_views(page.id).await.unwrap().as_deref(),
            Some("http://docs.python.org")
        );
        assert_eq!(pages.increment_views(9999).await.unwrap(), None);

        let listed = pages.by_category(cat.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].views, 1);
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let pool = test_pool();
        let cats = SqliteCategoryRepository::new(pool.clone());
        let pages = SqlitePageRepository::new(pool);
        let cat = cats.insert("Python").await.unwrap();

        let first = pages
            .get_or_create(cat.id, "Docs", "http://docs.python.org")
            .await
            .unwrap();
        let second = pages
            .get_or_create(cat.id, "Docs", "http://docs.python.org")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(pages.by_category(cat.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_with_profile_writes_both_rows() {
        let pool = test_pool();
        let repo = SqliteUserRepository::new(pool.clone());
        let user = repo
            .create_with_profile("alice", "alice@example.com", "$2b$fakehash", Some("http://alice.example.com"), None)
            .await
            .unwrap();
        assert!(user.is_active);

        let profile = repo.profile_for(&user.id).await.unwrap().unwrap();
        assert_eq!(profile.website.as_deref(), Some("http://alice.example.com"));
        assert!(profile.picture_path.is_none());
    }

    #[tokio::test]
    async fn duplicate_username_rolls_back_cleanly() {
        let pool = test_pool();
        let repo = SqliteUserRepository::new(pool.clone());
        repo.create_with_profile("alice", "a@example.com", "h", None, None)
            .await
            .unwrap();
        let err = repo
            .create_with_profile("alice", "b@example.com", "h", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let conn = pool.get().unwrap();
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(profiles, 1);
    }
}
