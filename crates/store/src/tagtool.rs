//! Tag and tool registries.
//!
//! Both are interned strings: `register_*` hands out the existing id when
//! the value is already known. Partial lookup switches between the
//! full-text index and a LIKE scan on the same three-character rule the
//! query compiler uses.

use crate::error::{ErrorKind, Result};
use crate::exec::{self, bind_u64};
use crate::sql;
use crate::store::Store;
use exn::OptionExt;
use tokio_util::sync::CancellationToken;

impl Store {
    /// Intern a tag value, returning its id (existing or fresh).
    pub async fn register_tag(&mut self, value: &str, cancel: &CancellationToken) -> Result<u32> {
        self.register(sql::REGISTER_TAG, value, cancel).await
    }

    /// Intern a tool value, returning its id (existing or fresh).
    pub async fn register_tool(&mut self, value: &str, cancel: &CancellationToken) -> Result<u32> {
        self.register(sql::REGISTER_TOOL, value, cancel).await
    }

    async fn register(&mut self, stmt: &str, value: &str, cancel: &CancellationToken) -> Result<u32> {
        if value.is_empty() {
            exn::bail!(ErrorKind::InvalidData("cannot register an empty value"));
        }
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt).bind(value))
            .await?
            .ok_or_raise(|| ErrorKind::Database)?;
        exec::col_u32(&row, 0, "registered id")
    }

    /// Look up a tag id by exact value.
    pub async fn find_tag(&mut self, value: &str, cancel: &CancellationToken) -> Result<Option<u32>> {
        self.find(sql::FIND_TAG, value, cancel).await
    }

    /// Look up a tool id by exact value.
    pub async fn find_tool(&mut self, value: &str, cancel: &CancellationToken) -> Result<Option<u32>> {
        self.find(sql::FIND_TOOL, value, cancel).await
    }

    async fn find(&mut self, stmt: &str, value: &str, cancel: &CancellationToken) -> Result<Option<u32>> {
        let row =
            exec::fetch_optional(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt).bind(value)).await?;
        row.map(|row| exec::col_u32(&row, 0, "id")).transpose()
    }

    /// Resolve a tag id back to its text.
    pub async fn tag_value(&mut self, id: u32, cancel: &CancellationToken) -> Result<Option<String>> {
        self.value_of(sql::GET_TAG, id, cancel).await
    }

    /// Resolve a tool id back to its text.
    pub async fn tool_value(&mut self, id: u32, cancel: &CancellationToken) -> Result<Option<String>> {
        self.value_of(sql::GET_TOOL, id, cancel).await
    }

    async fn value_of(&mut self, stmt: &str, id: u32, cancel: &CancellationToken) -> Result<Option<String>> {
        let id = bind_u64(u64::from(id), "id")?;
        let row = exec::fetch_optional(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt).bind(id)).await?;
        row.map(|row| exec::col_str(&row, 0)).transpose()
    }

    /// Every tag id whose value partially matches `term`: token match for
    /// terms of three or more characters, substring scan otherwise.
    pub async fn search_tags(&mut self, term: &str, cancel: &CancellationToken) -> Result<Vec<u32>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = if term.chars().count() >= 3 {
            sql::SEARCH_TAGS_MATCH
        } else {
            sql::SEARCH_TAGS_LIKE
        };
        let rows =
            exec::fetch_all(&mut self.conn, &self.retry, cancel, || sqlx::query(stmt).bind(term)).await?;
        rows.iter().map(|row| exec::col_u32(row, 0, "tag id")).collect()
    }
}
