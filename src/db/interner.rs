//! Value -> id interning over the `string` table.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};

/// Interns strings into the `string` table, reusing the row of an exact
/// value match.
///
/// Borrow it from the open transaction: rows it inserts commit or roll back
/// with the rest of the publication. Lookups are memoized for its lifetime.
pub struct Interner<'c> {
    conn: &'c Connection,
    ids: HashMap<String, i64>,
}

impl<'c> Interner<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            ids: HashMap::new(),
        }
    }

    pub fn intern(&mut self, value: &str) -> rusqlite::Result<i64> {
        if let Some(id) = self.ids.get(value) {
            return Ok(*id);
        }

        let existing = self
            .conn
            .query_row(
                "SELECT id FROM string WHERE value = ?1",
                params![value],
                |row| row.get(0),
            )
            .optional()?;
        let id = match existing {
            Some(id) => id,
            None => {
                self.conn
                    .execute("INSERT INTO string (value) VALUES (?1)", params![value])?;
                self.conn.last_insert_rowid()
            }
        };

        self.ids.insert(value.to_string(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::SCHEMA;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM string", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_intern_reuses_rows() {
        let conn = conn();
        let mut interner = Interner::new(&conn);
        let a = interner.intern("DC.type").unwrap();
        let b = interner.intern("DC.title").unwrap();
        assert_ne!(a, b);
        assert_eq!(interner.intern("DC.type").unwrap(), a);
        assert_eq!(count(&conn), 2);
    }

    #[test]
    fn test_intern_finds_rows_from_earlier_sessions() {
        let conn = conn();
        let first = Interner::new(&conn).intern("suelo").unwrap();
        let second = Interner::new(&conn).intern("suelo").unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_intern_rolls_back_with_transaction() {
        let mut conn = conn();
        {
            let tx = conn.transaction().unwrap();
            Interner::new(&tx).intern("temporal").unwrap();
            // dropped without commit
        }
        assert_eq!(count(&conn), 0);
    }
}
