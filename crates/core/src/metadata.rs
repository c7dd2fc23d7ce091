//! Keyword lookup over the cast/crew store.
//!
//! The store holds `movies(id, title)` and `movie_cast(movie_id, actor,
//! role)`. A title matches a keyword set when, for every keyword, the
//! lower-cased and space-stripped concatenation of title, actor and role
//! across its cast contains the lower-cased, space-stripped keyword.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use serde_json::json;

use crate::{
    error::{Result, ScenesearchError},
    normalize::RawResultSet,
};

/// Largest keyword set considered. Extra keywords are ignored.
pub const MAX_KEYWORDS: usize = 12;

/// Smaller combination sizes tried after the full set finds nothing.
const FALLBACK_DEPTH: usize = 3;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Records as `[{"id", "title"}, ...]`.
    async fn search(&self, keywords: &[String]) -> Result<RawResultSet>;
}

/// A matching movie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MovieMatch {
    pub id: String,
    pub title: String,
}

pub struct SqliteMetadataStore {
    path: PathBuf,
}

impl SqliteMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn search(&self, keywords: &[String]) -> Result<RawResultSet> {
        let path = self.path.clone();
        let keywords = keywords.to_vec();

        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<MovieMatch>> {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            search_with_fallback(&conn, &keywords)
        })
        .await??;

        tracing::debug!(count = matches.len(), "metadata matches");

        Ok(RawResultSet::Flat(
            matches
                .into_iter()
                .map(|m| json!({ "id": m.id, "title": m.title }))
                .collect(),
        ))
    }
}

/// Try the full keyword set, then ever smaller combinations of it, and stop
/// at the first size that matches anything.
pub fn search_with_fallback(conn: &Connection, keywords: &[String]) -> Result<Vec<MovieMatch>> {
    let keywords: Vec<&String> = keywords
        .iter()
        .filter(|k| !squash(k).is_empty())
        .take(MAX_KEYWORDS)
        .collect();

    let n = keywords.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let smallest = n.saturating_sub(FALLBACK_DEPTH) + 1;
    let mut seen = HashSet::new();
    let mut output = Vec::new();

    for size in (smallest..=n).rev() {
        for combo in combinations(n, size) {
            let subset: Vec<&str> = combo.iter().map(|&i| keywords[i].as_str()).collect();
            for found in search_movies_like(conn, &subset)? {
                if seen.insert(found.clone()) {
                    output.push(found);
                }
            }
        }
        if !output.is_empty() {
            break;
        }
    }

    Ok(output)
}

/// Movies whose title's combined cast text contains every keyword. Every id
/// carrying a matching title is returned, in table order.
pub fn search_movies_like(conn: &Connection, keywords: &[&str]) -> Result<Vec<MovieMatch>> {
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let condition = "(LOWER(REPLACE(GROUP_CONCAT(DISTINCT m.title || IFNULL(c.actor, '') || IFNULL(c.role, '')), ' ', '')) LIKE ? ESCAPE '\\')";
    let sql = format!(
        "SELECT m.id, m.title
         FROM movies m
         WHERE EXISTS (SELECT 1 FROM movie_cast c WHERE c.movie_id = m.id)
           AND m.title IN (
             SELECT m.title
             FROM movies m
             JOIN movie_cast c ON m.id = c.movie_id
             GROUP BY m.title
             HAVING {}
           )
         ORDER BY m.rowid",
        vec![condition; keywords.len()].join(" AND ")
    );

    let patterns: Vec<String> = keywords
        .iter()
        .map(|k| format!("%{}%", escape_like(&squash(k))))
        .collect();

    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(params_from_iter(patterns.iter()), |row| {
        Ok(MovieMatch {
            id: row.get(0)?,
            title: row.get(1)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Lower-case and drop spaces, the form both sides of the match use.
fn squash(keyword: &str) -> String {
    keyword.replace(' ', "").to_lowercase()
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// All `k`-element index combinations of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut combo: Vec<usize> = (0..k).collect();
    loop {
        out.push(combo.clone());

        // Rightmost position that can still advance.
        let Some(i) = (0..k).rev().find(|&i| combo[i] != i + n - k) else {
            return out;
        };
        combo[i] += 1;
        for j in i + 1..k {
            combo[j] = combo[j - 1] + 1;
        }
    }
}

/// Fail early when the configured store is missing.
pub fn open_store(path: &Path) -> Result<SqliteMetadataStore> {
    if !path.exists() {
        return Err(ScenesearchError::Config {
            reason: format!("metadata_db {} does not exist", path.display()),
        });
    }
    Ok(SqliteMetadataStore::new(path))
}
