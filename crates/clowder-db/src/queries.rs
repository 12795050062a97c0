use crate::Database;
use crate::models::{PostRow, PostTagRow, TagCountRow, TokenRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, login: &str, password_hash: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (login, password) VALUES (?1, ?2)",
                (login, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// First user row matching the login. Logins are not unique by schema;
    /// duplicates resolve to whichever row sorts first by id.
    pub fn user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_login(conn, login))
    }

    pub fn set_password(&self, user: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                (password_hash, user),
            )?;
            Ok(())
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }

    // -- Sessions --

    pub fn insert_token(&self, user: i64, value: &str, info: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (user, value, info, expiry) VALUES (?1, ?2, ?3, 'none')",
                (user, value, info),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn token_by_value(&self, value: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user, value, info, expiry FROM tokens WHERE value = ?1",
                [value],
                token_from_row,
            )
            .optional()
        })
    }

    /// All sessions owned by the user, in insertion order.
    pub fn tokens_for_user(&self, user: i64) -> Result<Vec<TokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user, value, info, expiry FROM tokens WHERE user = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([user], token_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Silent no-op when no such session exists.
    pub fn delete_token(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tokens WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Bulk invalidation: removes every session the user owns, including the
    /// one authorizing the call. Used by password change.
    pub fn delete_tokens_for_user(&self, user: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM tokens WHERE user = ?1", [user])?;
            Ok(n)
        })
    }

    // -- Tags --

    /// Resolves a tag by normalized name, creating it on first sight.
    /// INSERT OR IGNORE under the UNIQUE(name) constraint keeps concurrent
    /// creates of the same name from racing.
    pub fn find_or_create_tag(&self, raw_name: &str) -> Result<i64> {
        let name = normalize_tag(raw_name);
        self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [&name])?;
            let id = conn.query_row("SELECT id FROM tags WHERE name = ?1", [&name], |row| {
                row.get(0)
            })?;
            Ok(id)
        })
    }

    /// Attaches a tag (by free-form name) to a post. Idempotent: re-attaching
    /// an already-attached tag is swallowed by the UNIQUE(tag, post) constraint.
    pub fn attach_tag(&self, post: &str, raw_name: &str) -> Result<i64> {
        let tag = self.find_or_create_tag(raw_name)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO pairs (tag, post) VALUES (?1, ?2)",
                (tag, post),
            )?;
            Ok(tag)
        })
    }

    /// Mirror of attach: drops the pair row. No-op when nothing matches; the
    /// tag row itself is never deleted, even once orphaned.
    pub fn detach_tag(&self, post: &str, tag: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM pairs WHERE tag = ?1 AND post = ?2",
                (tag, post),
            )?;
            Ok(())
        })
    }

    /// Every tag with its pair count (zero-pair tags included), most-used
    /// first, ids ascending as the stable tie-break.
    pub fn tags_with_counts(&self) -> Result<Vec<TagCountRow>> {
        self.with_conn(query_tags_with_counts)
    }

    // -- Posts --

    /// Ingestion insert. OR IGNORE: post ids are content-derived, so seeing
    /// the same id again means the same post.
    pub fn insert_post(&self, post: &PostRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO posts (id, time, source, caption, media)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (&post.id, post.time, &post.source, &post.caption, &post.media),
            )?;
            Ok(())
        })
    }

    /// Pagination-independent total: all posts, or distinct posts carrying
    /// the tag (one pair row per post per tag, by constraint).
    pub fn count_posts(&self, tag: Option<i64>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = match tag {
                Some(tag) => conn.query_row(
                    "SELECT COUNT(*) FROM pairs WHERE tag = ?1",
                    [tag],
                    |row| row.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?,
            };
            Ok(count)
        })
    }

    /// One page of posts, newest first. The tag filter narrows which posts
    /// appear; it says nothing about which tags each post carries.
    pub fn posts_page(&self, page: i64, per_page: i64, tag: Option<i64>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| query_posts_page(conn, page, per_page, tag))
    }

    /// Batch-fetch all tags for a page of post ids.
    pub fn tags_for_posts(&self, post_ids: &[String]) -> Result<Vec<PostTagRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| query_tags_for_posts(conn, post_ids))
    }
}

/// Tag names are stored normalized; callers pass free-form input.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn token_from_row(row: &rusqlite::Row) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        id: row.get(0)?,
        user: row.get(1)?,
        value: row.get(2)?,
        info: row.get(3)?,
        expiry: row.get(4)?,
    })
}

fn post_from_row(row: &rusqlite::Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        time: row.get(1)?,
        source: row.get(2)?,
        caption: row.get(3)?,
        media: row.get(4)?,
    })
}

fn query_user_by_login(conn: &Connection, login: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, login, password FROM users WHERE login = ?1 ORDER BY id LIMIT 1")?;

    let row = stmt
        .query_row([login], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                login: row.get(1)?,
                password: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_tags_with_counts(conn: &Connection) -> Result<Vec<TagCountRow>> {
    let mut stmt = conn.prepare(
        "SELECT tags.id, tags.name, COUNT(pairs.tag) AS count
         FROM tags
         LEFT JOIN pairs ON pairs.tag = tags.id
         GROUP BY tags.id, tags.name
         ORDER BY count DESC, tags.id ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(TagCountRow {
                id: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_posts_page(
    conn: &Connection,
    page: i64,
    per_page: i64,
    tag: Option<i64>,
) -> Result<Vec<PostRow>> {
    let offset = page * per_page;

    let rows = match tag {
        Some(tag) => {
            let mut stmt = conn.prepare(
                "SELECT id, time, source, caption, media FROM posts
                 WHERE id IN (SELECT post FROM pairs WHERE tag = ?1)
                 ORDER BY time DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            stmt.query_map(rusqlite::params![tag, per_page, offset], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, time, source, caption, media FROM posts
                 ORDER BY time DESC, id DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            stmt.query_map(rusqlite::params![per_page, offset], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn query_tags_for_posts(conn: &Connection, post_ids: &[String]) -> Result<Vec<PostTagRow>> {
    let placeholders: Vec<String> = (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT pairs.post, tags.id, tags.name
         FROM pairs
         JOIN tags ON tags.id = pairs.tag
         WHERE pairs.post IN ({})
         ORDER BY tags.id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = post_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(PostTagRow {
                post: row.get(0)?,
                tag_id: row.get(1)?,
                tag_name: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_posts(db: &Database, n: i64) {
        for i in 0..n {
            db.insert_post(&PostRow {
                id: format!("post-{i:02}"),
                time: 1_700_000_000 + i,
                source: format!("https://example.net/{i}"),
                caption: format!("caption {i}"),
                media: format!("media/{i}.jpg"),
            })
            .unwrap();
        }
    }

    #[test]
    fn tag_names_normalize_to_one_row() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 1);

        let a = db.attach_tag("post-00", "  Foo ").unwrap();
        let b = db.attach_tag("post-00", "foo").unwrap();
        assert_eq!(a, b);

        let tags = db.tags_with_counts().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "foo");
        assert_eq!(tags[0].count, 1);
    }

    #[test]
    fn attach_twice_keeps_one_pair() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 1);

        db.attach_tag("post-00", "cats").unwrap();
        db.attach_tag("post-00", "cats").unwrap();

        let tags = db.tags_with_counts().unwrap();
        assert_eq!(tags[0].count, 1);
    }

    #[test]
    fn detach_removes_pair_but_not_tag() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 1);

        let tag = db.attach_tag("post-00", "cats").unwrap();
        db.detach_tag("post-00", tag).unwrap();

        let tags = db.tags_with_counts().unwrap();
        assert_eq!(tags.len(), 1, "orphan tag row persists");
        assert_eq!(tags[0].count, 0);

        // detaching again is a silent no-op
        db.detach_tag("post-00", tag).unwrap();
    }

    #[test]
    fn tag_counts_order_most_used_first() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 3);

        db.attach_tag("post-00", "rare").unwrap();
        for id in ["post-00", "post-01", "post-02"] {
            db.attach_tag(id, "common").unwrap();
        }
        db.find_or_create_tag("unused").unwrap();

        let tags = db.tags_with_counts().unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["common", "rare", "unused"]);
        assert_eq!(tags[2].count, 0);
    }

    #[test]
    fn pages_slice_newest_first() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 45);

        assert_eq!(db.count_posts(None).unwrap(), 45);

        let page0 = db.posts_page(0, 20, None).unwrap();
        assert_eq!(page0.len(), 20);
        assert_eq!(page0[0].id, "post-44", "newest first");

        let page2 = db.posts_page(2, 20, None).unwrap();
        assert_eq!(page2.len(), 5);
        assert_eq!(page2[4].id, "post-00", "oldest last");

        // past-the-end page is empty while the count stands
        assert!(db.posts_page(3, 20, None).unwrap().is_empty());
        assert_eq!(db.count_posts(None).unwrap(), 45);
    }

    #[test]
    fn tag_filter_narrows_posts_not_their_tags() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 45);

        let wanted = db.attach_tag("post-03", "wanted").unwrap();
        db.attach_tag("post-17", "wanted").unwrap();
        db.attach_tag("post-30", "wanted").unwrap();
        // a second tag on one of the filtered posts must still show up
        db.attach_tag("post-17", "other").unwrap();

        assert_eq!(db.count_posts(Some(wanted)).unwrap(), 3);

        let page = db.posts_page(0, 20, Some(wanted)).unwrap();
        let ids: Vec<&str> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["post-30", "post-17", "post-03"]);

        let annotations = db
            .tags_for_posts(&page.iter().map(|p| p.id.clone()).collect::<Vec<_>>())
            .unwrap();
        let on_17: Vec<&str> = annotations
            .iter()
            .filter(|a| a.post == "post-17")
            .map(|a| a.tag_name.as_str())
            .collect();
        assert_eq!(on_17, ["wanted", "other"]);
    }

    #[test]
    fn untagged_posts_have_no_annotations() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 2);
        db.attach_tag("post-01", "cats").unwrap();

        let annotations = db
            .tags_for_posts(&["post-00".into(), "post-01".into()])
            .unwrap();
        assert!(annotations.iter().all(|a| a.post == "post-01"));
    }

    #[test]
    fn duplicate_post_ingest_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        seed_posts(&db, 1);

        db.insert_post(&PostRow {
            id: "post-00".into(),
            time: 99,
            source: "other".into(),
            caption: "other".into(),
            media: String::new(),
        })
        .unwrap();

        let page = db.posts_page(0, 20, None).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].caption, "caption 0", "original row kept");
    }

    #[test]
    fn token_bookkeeping() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("admin", "hash").unwrap();

        let a = db.insert_token(user, "tok-a", "phone").unwrap();
        db.insert_token(user, "tok-b", "laptop").unwrap();

        let row = db.token_by_value("tok-a").unwrap().unwrap();
        assert_eq!(row.user, user);
        assert_eq!(row.expiry, "none");
        assert!(db.token_by_value("tok-zzz").unwrap().is_none());

        db.delete_token(a).unwrap();
        assert!(db.token_by_value("tok-a").unwrap().is_none());
        db.delete_token(a).unwrap(); // no-op

        assert_eq!(db.delete_tokens_for_user(user).unwrap(), 1);
        assert!(db.tokens_for_user(user).unwrap().is_empty());
    }
}
