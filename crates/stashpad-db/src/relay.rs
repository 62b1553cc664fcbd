//! Relay sessions: short shared threads anyone holding the code can add a
//! line to until the owner closes them or they fill up.

use rand::Rng;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use stashpad_types::relay::{
    CODE_LENGTH, DEFAULT_TITLE, GUEST_AUTHOR, MAX_AUTHOR_CHARS, MAX_ENTRY_CHARS, RelayState,
    capacity_from_input, clamp_capacity, normalize_code,
};

use crate::Database;
use crate::error::RelayError;
use crate::models::{RelayEntryRow, RelaySessionRow};
use crate::queries::{clean_title, load_stash};
use crate::time;

/// No 0/O or 1/I, so codes survive being read aloud or copied by hand.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: usize = 16;
const MAX_APPEND_ATTEMPTS: usize = 3;

type RelayResult<T> = std::result::Result<T, RelayError>;

/// Who is adding an entry.
#[derive(Debug, Clone, Copy)]
pub enum Contributor<'a> {
    /// Signed-in user; their username is the author name.
    Member(&'a str),
    /// Anonymous visitor with an optional self-chosen display name.
    Guest(Option<&'a str>),
}

impl Contributor<'_> {
    pub fn author_name(&self) -> String {
        match self {
            Self::Member(username) => (*username).to_string(),
            Self::Guest(name) => {
                let name = name.map(str::trim).unwrap_or_default();
                if name.is_empty() {
                    GUEST_AUTHOR.to_string()
                } else {
                    name.chars().take(MAX_AUTHOR_CHARS).collect()
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayView {
    pub session: RelaySessionRow,
    pub entries: Vec<RelayEntryRow>,
    pub state: RelayState,
    pub can_add: bool,
    pub is_owner: bool,
}

impl Database {
    /// Start a relay. `capacity` is raw user input; see
    /// [`capacity_from_input`].
    pub fn create_relay(
        &self,
        owner_id: &str,
        title: Option<&str>,
        prompt: Option<&str>,
        capacity: Option<&str>,
    ) -> RelayResult<RelaySessionRow> {
        let max_entries = capacity_from_input(capacity);
        let session = self.with_tx(|tx| insert_session(tx, owner_id, title, clean_title(prompt), max_entries))?;
        info!(
            "Relay {} created by {} (capacity {})",
            session.code, owner_id, session.max_entries
        );
        Ok(session)
    }

    /// Start a relay seeded from one of the owner's stashes: its title names
    /// the relay and its body, as stored, becomes the prompt.
    pub fn create_relay_from_stash(&self, owner_id: &str, stash_id: &str) -> RelayResult<RelaySessionRow> {
        let session = self.with_tx(|tx| {
            let stash = load_stash(tx, owner_id, stash_id)?.ok_or(RelayError::StashNotFound)?;
            insert_session(
                tx,
                owner_id,
                stash.title.as_deref(),
                Some(stash.body.clone()),
                clamp_capacity(None),
            )
        })?;
        info!("Relay {} created by {} from stash {}", session.code, owner_id, stash_id);
        Ok(session)
    }

    /// `viewer` is the signed-in user id, if any. The session and its
    /// entries are read in one transaction.
    pub fn view_relay(&self, code: &str, viewer: Option<&str>) -> RelayResult<RelayView> {
        let code = normalize_code(code);
        let (session, entries) = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(session) = load_session(&tx, &code)? else {
                return Ok(None);
            };
            let entries = load_entries(&tx, &session.id)?;
            tx.finish()?;
            Ok(Some((session, entries)))
        })?
        .ok_or(RelayError::NotFound)?;

        let state = RelayState::of(session.is_closed, entries.len() as u32, session.max_entries);
        let is_owner = viewer.is_some_and(|id| id == session.owner_id);
        Ok(RelayView {
            session,
            entries,
            state,
            can_add: state.accepts_entries(),
            is_owner,
        })
    }

    /// Append one line and return it with its position.
    ///
    /// Position is `max + 1` read inside an IMMEDIATE transaction. The
    /// `(session_id, position)` unique key still backs it up; a conflict
    /// there is retried a few times before giving up.
    pub fn append_entry(&self, code: &str, contributor: Contributor<'_>, body: &str) -> RelayResult<RelayEntryRow> {
        let code = normalize_code(code);
        let author = contributor.author_name();
        let body = body.trim();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.with_tx(|tx| append_once(tx, &code, &author, body)) {
                Err(e) if e.is_constraint_violation() && attempt < MAX_APPEND_ATTEMPTS => {
                    warn!("Position conflict on relay {} (attempt {}), retrying", code, attempt);
                }
                other => return other,
            }
        }
    }

    /// Only the owner may close. Closing twice keeps the first `closed_at`.
    pub fn close_relay(&self, code: &str, caller_id: &str) -> RelayResult<RelaySessionRow> {
        let code = normalize_code(code);
        self.with_tx(|tx| {
            let mut session = load_session(tx, &code)?.ok_or(RelayError::NotFound)?;
            if session.owner_id != caller_id {
                warn!("User {} tried to close relay {} they do not own", caller_id, code);
                return Err(RelayError::NotOwner);
            }
            if session.is_closed {
                debug!("Relay {} already closed", code);
                return Ok(session);
            }
            let now = time::now();
            tx.execute(
                "UPDATE relay_sessions SET is_closed = 1, closed_at = ?1 WHERE id = ?2",
                params![now, session.id],
            )?;
            session.is_closed = true;
            session.closed_at = Some(now);
            info!("Relay {} closed", code);
            Ok(session)
        })
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn code_in_use(conn: &Connection, code: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM relay_sessions WHERE code = ?1", [code], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert_session(
    conn: &Connection,
    owner_id: &str,
    title: Option<&str>,
    prompt: Option<String>,
    max_entries: u32,
) -> RelayResult<RelaySessionRow> {
    let mut code = None;
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_code();
        if !code_in_use(conn, &candidate)? {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| anyhow::anyhow!("No free relay code after {} attempts", MAX_CODE_ATTEMPTS))?;

    let session = RelaySessionRow {
        id: Uuid::new_v4().to_string(),
        code,
        owner_id: owner_id.to_string(),
        title: clean_title(title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        prompt,
        is_closed: false,
        max_entries,
        created_at: time::now(),
        closed_at: None,
    };
    conn.execute(
        "INSERT INTO relay_sessions (id, code, owner_id, title, prompt, is_closed, max_entries, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        params![
            session.id,
            session.code,
            session.owner_id,
            session.title,
            session.prompt,
            session.max_entries,
            session.created_at,
        ],
    )?;
    Ok(session)
}

fn append_once(conn: &Connection, code: &str, author: &str, body: &str) -> RelayResult<RelayEntryRow> {
    let session = load_session(conn, code)?.ok_or(RelayError::NotFound)?;
    if session.is_closed {
        return Err(RelayError::Closed);
    }
    if body.is_empty() {
        return Err(RelayError::EmptyBody);
    }
    if body.chars().count() > MAX_ENTRY_CHARS {
        return Err(RelayError::TooLong(MAX_ENTRY_CHARS));
    }

    let last: u32 = conn.query_row(
        "SELECT COALESCE(MAX(position), 0) FROM relay_entries WHERE session_id = ?1",
        [&session.id],
        |row| row.get(0),
    )?;
    if last >= session.max_entries {
        return Err(RelayError::Full);
    }

    let entry = RelayEntryRow {
        id: 0,
        session_id: session.id,
        author_name: author.to_string(),
        body: body.to_string(),
        position: last + 1,
        created_at: time::now(),
    };
    conn.execute(
        "INSERT INTO relay_entries (session_id, author_name, body, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![entry.session_id, entry.author_name, entry.body, entry.position, entry.created_at],
    )?;
    Ok(RelayEntryRow {
        id: conn.last_insert_rowid(),
        ..entry
    })
}

fn load_session(conn: &Connection, code: &str) -> anyhow::Result<Option<RelaySessionRow>> {
    let session = conn
        .query_row(
            "SELECT id, code, owner_id, title, prompt, is_closed, max_entries, created_at, closed_at
             FROM relay_sessions WHERE code = ?1",
            [code],
            |row| {
                Ok(RelaySessionRow {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    owner_id: row.get(2)?,
                    title: row.get(3)?,
                    prompt: row.get(4)?,
                    is_closed: row.get(5)?,
                    max_entries: row.get(6)?,
                    created_at: row.get(7)?,
                    closed_at: row.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

fn load_entries(conn: &Connection, session_id: &str) -> anyhow::Result<Vec<RelayEntryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, author_name, body, position, created_at
         FROM relay_entries WHERE session_id = ?1 ORDER BY position",
    )?;
    let entries = stmt
        .query_map([session_id], |row| {
            Ok(RelayEntryRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                author_name: row.get(2)?,
                body: row.get(3)?,
                position: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StashDraft;
    use std::sync::Arc;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("owner", "owner", "owner@example.com", "hash").unwrap();
        db.create_user("other", "other", "other@example.com", "hash").unwrap();
        db
    }

    fn guest() -> Contributor<'static> {
        Contributor::Guest(None)
    }

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
            assert!(!code.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn create_applies_defaults() {
        let db = setup();
        let session = db.create_relay("owner", Some("   "), Some(""), None).unwrap();
        assert_eq!(session.title, DEFAULT_TITLE);
        assert_eq!(session.prompt, None);
        assert_eq!(session.max_entries, 8);
        assert!(!session.is_closed);
    }

    #[test]
    fn capacity_is_clamped_on_create() {
        let db = setup();
        assert_eq!(db.create_relay("owner", None, None, Some("1")).unwrap().max_entries, 3);
        assert_eq!(db.create_relay("owner", None, None, Some("50")).unwrap().max_entries, 20);
        assert_eq!(db.create_relay("owner", None, None, Some("many")).unwrap().max_entries, 8);
    }

    #[test]
    fn capacity_three_fills_after_three_entries() {
        let db = setup();
        let session = db.create_relay("owner", None, None, Some("3")).unwrap();
        let positions: Vec<u32> = ["a", "b", "c"]
            .iter()
            .map(|body| db.append_entry(&session.code, guest(), body).unwrap().position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let err = db.append_entry(&session.code, guest(), "d").unwrap_err();
        assert!(matches!(err, RelayError::Full));

        let view = db.view_relay(&session.code, None).unwrap();
        assert_eq!(view.state, RelayState::Full);
        assert!(!view.can_add);
        assert_eq!(view.entries.len(), 3);
    }

    #[test]
    fn default_capacity_accepts_eight() {
        let db = setup();
        let session = db.create_relay("owner", None, None, None).unwrap();
        for i in 1..=8 {
            let entry = db.append_entry(&session.code, guest(), &format!("line {i}")).unwrap();
            assert_eq!(entry.position, i);
        }
        assert!(matches!(
            db.append_entry(&session.code, guest(), "ninth"),
            Err(RelayError::Full)
        ));
    }

    #[test]
    fn entries_are_validated() {
        let db = setup();
        let session = db.create_relay("owner", None, None, None).unwrap();

        assert!(matches!(
            db.append_entry(&session.code, guest(), "   \n"),
            Err(RelayError::EmptyBody)
        ));
        let long = "x".repeat(MAX_ENTRY_CHARS + 1);
        assert!(matches!(
            db.append_entry(&session.code, guest(), &long),
            Err(RelayError::TooLong(_))
        ));
        let exact = "é".repeat(MAX_ENTRY_CHARS);
        assert!(db.append_entry(&session.code, guest(), &exact).is_ok());

        let entry = db.append_entry(&session.code, guest(), "  padded  ").unwrap();
        assert_eq!(entry.body, "padded");
        assert_eq!(entry.position, 2);
    }

    #[test]
    fn author_names() {
        assert_eq!(Contributor::Member("alice").author_name(), "alice");
        assert_eq!(Contributor::Guest(None).author_name(), GUEST_AUTHOR);
        assert_eq!(Contributor::Guest(Some("  ")).author_name(), GUEST_AUTHOR);
        assert_eq!(Contributor::Guest(Some(" Sam ")).author_name(), "Sam");

        let long = "n".repeat(200);
        assert_eq!(
            Contributor::Guest(Some(&long)).author_name().chars().count(),
            MAX_AUTHOR_CHARS
        );
    }

    #[test]
    fn codes_match_case_insensitively() {
        let db = setup();
        let session = db.create_relay("owner", Some("Lunch"), None, None).unwrap();
        let lower = format!("  {}  ", session.code.to_lowercase());
        assert_eq!(db.view_relay(&lower, None).unwrap().session.id, session.id);
        assert!(db.append_entry(&lower, Contributor::Member("owner"), "hi").is_ok());
        assert!(matches!(db.view_relay("ZZZZZZ", None), Err(RelayError::NotFound)));
    }

    #[test]
    fn only_the_owner_can_close() {
        let db = setup();
        let session = db.create_relay("owner", None, None, None).unwrap();

        assert!(matches!(db.close_relay(&session.code, "other"), Err(RelayError::NotOwner)));
        let view = db.view_relay(&session.code, Some("other")).unwrap();
        assert_eq!(view.state, RelayState::Open);
        assert!(!view.is_owner);

        let closed = db.close_relay(&session.code, "owner").unwrap();
        assert!(closed.is_closed);
        assert!(matches!(
            db.append_entry(&session.code, guest(), "late"),
            Err(RelayError::Closed)
        ));

        let view = db.view_relay(&session.code, Some("owner")).unwrap();
        assert_eq!(view.state, RelayState::Closed);
        assert!(view.is_owner);
        assert!(!view.can_add);
    }

    #[test]
    fn closing_twice_keeps_the_first_timestamp() {
        let db = setup();
        let session = db.create_relay("owner", None, None, None).unwrap();
        let first = db.close_relay(&session.code, "owner").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = db.close_relay(&session.code, "owner").unwrap();
        assert_eq!(first.closed_at, second.closed_at);
    }

    #[test]
    fn closed_beats_validation() {
        let db = setup();
        let session = db.create_relay("owner", None, None, None).unwrap();
        db.close_relay(&session.code, "owner").unwrap();
        assert!(matches!(
            db.append_entry(&session.code, guest(), ""),
            Err(RelayError::Closed)
        ));
    }

    #[test]
    fn relay_from_stash_uses_its_title_and_body() {
        let db = setup();
        let stash = db
            .create_stash(
                "owner",
                &StashDraft {
                    title: Some("Weekend".into()),
                    body: "Where should we go?".into(),
                    ..StashDraft::default()
                },
            )
            .unwrap();
        let session = db.create_relay_from_stash("owner", &stash.id).unwrap();
        assert_eq!(session.title, "Weekend");
        assert_eq!(session.prompt.as_deref(), Some("Where should we go?"));
        assert_eq!(session.max_entries, 8);

        let spaced = db
            .create_stash(
                "owner",
                &StashDraft {
                    title: Some("Poem".into()),
                    body: "  first line\n  second line\n".into(),
                    ..StashDraft::default()
                },
            )
            .unwrap();
        let session = db.create_relay_from_stash("owner", &spaced.id).unwrap();
        let stored = db.get_stash("owner", &spaced.id).unwrap().unwrap();
        assert_eq!(session.prompt.as_deref(), Some(stored.body.as_str()));
        let viewed = db.view_relay(&session.code, None).unwrap();
        assert_eq!(viewed.session.prompt, session.prompt);

        assert!(matches!(
            db.create_relay_from_stash("other", &stash.id),
            Err(RelayError::StashNotFound)
        ));
    }

    #[test]
    fn concurrent_appends_get_distinct_positions() {
        let db = Arc::new(setup());
        let session = db.create_relay("owner", None, None, Some("20")).unwrap();

        let handles: Vec<_> = (0..30)
            .map(|i| {
                let db = Arc::clone(&db);
                let code = session.code.clone();
                std::thread::spawn(move || db.append_entry(&code, Contributor::Guest(None), &format!("line {i}")))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let mut positions: Vec<u32> = results.iter().filter_map(|r| r.as_ref().ok()).map(|e| e.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=20).collect::<Vec<_>>());
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, RelayError::Full))
        );
    }

    #[test]
    fn separate_handles_on_one_file_do_not_collide() {
        let path = std::env::temp_dir().join(format!("stashpad-relay-{}.db", Uuid::new_v4()));
        let a = Arc::new(Database::open(&path).unwrap());
        let b = Arc::new(Database::open(&path).unwrap());
        a.create_user("owner", "owner", "owner@example.com", "hash").unwrap();
        let session = a.create_relay("owner", None, None, Some("12")).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = if i % 2 == 0 { Arc::clone(&a) } else { Arc::clone(&b) };
                let code = session.code.clone();
                std::thread::spawn(move || db.append_entry(&code, Contributor::Guest(None), "x").ok())
            })
            .collect();
        let mut positions: Vec<u32> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|e| e.position)
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=12).collect::<Vec<_>>());

        drop((a, b));
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
