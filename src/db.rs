use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result as StoreResult;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS questions (
            id                TEXT PRIMARY KEY,
            question_bank     TEXT,
            blueprint         TEXT,
            subject           TEXT,
            category          TEXT,
            subcategory       TEXT,
            topic             TEXT,
            difficulty        REAL,
            question_text     TEXT,
            short_explanation TEXT,
            full_explanation  TEXT,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_questions_subject ON questions(subject);

        CREATE TABLE IF NOT EXISTS tags (
            name TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS question_tags (
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            tag_name    TEXT NOT NULL REFERENCES tags(name),
            UNIQUE(question_id, tag_name)
        );
        CREATE INDEX IF NOT EXISTS idx_question_tags_tag ON question_tags(tag_name);

        CREATE TABLE IF NOT EXISTS answer_choices (
            id          TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            is_correct  BOOLEAN NOT NULL DEFAULT 0,
            explanation TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_answers_question ON answer_choices(question_id);

        CREATE TABLE IF NOT EXISTS articles (
            id          TEXT PRIMARY KEY,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            text        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_articles_question ON articles(question_id);

        CREATE TABLE IF NOT EXISTS quick_hits (
            id            TEXT PRIMARY KEY,
            question_id   TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            question_text TEXT NOT NULL,
            rationale     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_quick_hits_question ON quick_hits(question_id);

        CREATE TABLE IF NOT EXISTS quick_hit_answers (
            id           TEXT PRIMARY KEY,
            quick_hit_id TEXT NOT NULL REFERENCES quick_hits(id) ON DELETE CASCADE,
            text         TEXT NOT NULL,
            is_correct   BOOLEAN NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_qh_answers_quick_hit ON quick_hit_answers(quick_hit_id);

        -- One row per attempted document
        CREATE TABLE IF NOT EXISTS imports (
            id             INTEGER PRIMARY KEY,
            source         TEXT NOT NULL,
            format         TEXT,
            question_count INTEGER NOT NULL DEFAULT 0,
            error          TEXT,
            elapsed_ms     INTEGER,
            imported_at    TEXT NOT NULL
        );
        ",
    )
}

// ── Extracted rows ──

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestionRow {
    pub question_bank: Option<String>,
    pub blueprint: Option<String>,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Option<f64>,
    pub question_text: Option<String>,
    pub short_explanation: Option<String>,
    pub full_explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerChoiceRow {
    pub text: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRow {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickHitRow {
    pub question_text: String,
    pub rationale: String,
    pub answers: Vec<QuickHitAnswerRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickHitAnswerRow {
    pub text: String,
    pub is_correct: bool,
}

// ── Persistence store ──

/// Create-side operations the importer needs. Identifiers are assigned here
/// and returned so children can reference their parent right away.
pub trait Store {
    fn create_question(&self, row: &QuestionRow) -> StoreResult<Uuid>;
    fn create_answer_choice(&self, question_id: &Uuid, row: &AnswerChoiceRow) -> StoreResult<Uuid>;
    fn create_article(&self, question_id: &Uuid, row: &ArticleRow) -> StoreResult<Uuid>;
    fn create_quick_hit(&self, question_id: &Uuid, row: &QuickHitRow) -> StoreResult<Uuid>;
    fn create_quick_hit_answer(&self, quick_hit_id: &Uuid, row: &QuickHitAnswerRow) -> StoreResult<Uuid>;
    /// Returns true when the tag did not exist before.
    fn get_or_create_tag(&self, name: &str) -> StoreResult<bool>;
    fn tag_question(&self, question_id: &Uuid, name: &str) -> StoreResult<()>;
}

impl Store for Connection {
    fn create_question(&self, q: &QuestionRow) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO questions
             (id, question_bank, blueprint, subject, category, subcategory, topic,
              difficulty, question_text, short_explanation, full_explanation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                id.to_string(), q.question_bank, q.blueprint, q.subject, q.category,
                q.subcategory, q.topic, q.difficulty, q.question_text,
                q.short_explanation, q.full_explanation,
            ],
        )?;
        Ok(id)
    }

    fn create_answer_choice(&self, question_id: &Uuid, a: &AnswerChoiceRow) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO answer_choices (id, question_id, text, is_correct, explanation)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id.to_string(), question_id.to_string(), a.text, a.is_correct, a.explanation],
        )?;
        Ok(id)
    }

    fn create_article(&self, question_id: &Uuid, a: &ArticleRow) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO articles (id, question_id, text) VALUES (?1, ?2, ?3)",
            rusqlite::params![id.to_string(), question_id.to_string(), a.text],
        )?;
        Ok(id)
    }

    fn create_quick_hit(&self, question_id: &Uuid, qh: &QuickHitRow) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO quick_hits (id, question_id, question_text, rationale)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id.to_string(), question_id.to_string(), qh.question_text, qh.rationale],
        )?;
        Ok(id)
    }

    fn create_quick_hit_answer(&self, quick_hit_id: &Uuid, a: &QuickHitAnswerRow) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.execute(
            "INSERT INTO quick_hit_answers (id, quick_hit_id, text, is_correct)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id.to_string(), quick_hit_id.to_string(), a.text, a.is_correct],
        )?;
        Ok(id)
    }

    fn get_or_create_tag(&self, name: &str) -> StoreResult<bool> {
        let inserted = self.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
        Ok(inserted > 0)
    }

    fn tag_question(&self, question_id: &Uuid, name: &str) -> StoreResult<()> {
        self.execute(
            "INSERT OR IGNORE INTO question_tags (question_id, tag_name) VALUES (?1, ?2)",
            rusqlite::params![question_id.to_string(), name],
        )?;
        Ok(())
    }
}

// ── Import log ──

pub struct ImportLogRow {
    pub source: String,
    pub format: Option<String>,
    pub question_count: usize,
    pub error: Option<String>,
    pub elapsed_ms: i64,
}

pub fn record_import(conn: &Connection, row: &ImportLogRow) -> Result<()> {
    conn.execute(
        "INSERT INTO imports (source, format, question_count, error, elapsed_ms, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            row.source,
            row.format,
            row.question_count as i64,
            row.error,
            row.elapsed_ms,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ── Show ──

#[derive(Debug, Serialize)]
pub struct QuestionDetail {
    pub id: String,
    pub created_at: String,
    #[serde(flatten)]
    pub question: QuestionRow,
    pub tags: Vec<String>,
    pub answer_choices: Vec<AnswerChoiceRow>,
    pub articles: Vec<ArticleRow>,
    pub quick_hits: Vec<QuickHitRow>,
}

pub fn fetch_question(conn: &Connection, id: &str) -> Result<Option<QuestionDetail>> {
    let found = conn
        .query_row(
            "SELECT id, created_at, question_bank, blueprint, subject, category, subcategory,
                    topic, difficulty, question_text, short_explanation, full_explanation
             FROM questions WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    QuestionRow {
                        question_bank: row.get(2)?,
                        blueprint: row.get(3)?,
                        subject: row.get(4)?,
                        category: row.get(5)?,
                        subcategory: row.get(6)?,
                        topic: row.get(7)?,
                        difficulty: row.get(8)?,
                        question_text: row.get(9)?,
                        short_explanation: row.get(10)?,
                        full_explanation: row.get(11)?,
                    },
                ))
            },
        )
        .optional()?;
    let Some((id, created_at, question)) = found else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT tag_name FROM question_tags WHERE question_id = ?1 ORDER BY rowid",
    )?;
    let tags = stmt
        .query_map([&id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT text, is_correct, explanation FROM answer_choices
         WHERE question_id = ?1 ORDER BY rowid",
    )?;
    let answer_choices = stmt
        .query_map([&id], |row| {
            Ok(AnswerChoiceRow {
                text: row.get(0)?,
                is_correct: row.get(1)?,
                explanation: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT text FROM articles WHERE question_id = ?1 ORDER BY rowid")?;
    let articles = stmt
        .query_map([&id], |row| Ok(ArticleRow { text: row.get(0)? }))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, question_text, rationale FROM quick_hits
         WHERE question_id = ?1 ORDER BY rowid",
    )?;
    let hits = stmt
        .query_map([&id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut answer_stmt = conn.prepare(
        "SELECT text, is_correct FROM quick_hit_answers WHERE quick_hit_id = ?1 ORDER BY rowid",
    )?;
    let mut quick_hits = Vec::with_capacity(hits.len());
    for (qh_id, question_text, rationale) in hits {
        let answers = answer_stmt
            .query_map([&qh_id], |row| {
                Ok(QuickHitAnswerRow {
                    text: row.get(0)?,
                    is_correct: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        quick_hits.push(QuickHitRow {
            question_text,
            rationale,
            answers,
        });
    }

    Ok(Some(QuestionDetail {
        id,
        created_at,
        question,
        tags,
        answer_choices,
        articles,
        quick_hits,
    }))
}

// ── Overview ──

pub struct OverviewRow {
    pub id: String,
    pub question_bank: String,
    pub subject: String,
    pub topic: String,
    pub choices: i64,
    pub quick_hits: i64,
    pub tags: String,
}

pub fn fetch_overview(
    conn: &Connection,
    subject: Option<&str>,
    bank: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(s) = subject {
        conditions.push(format!("q.subject = ?{}", params.len() + 1));
        params.push(Box::new(s.to_string()));
    }
    if let Some(b) = bank {
        conditions.push(format!("q.question_bank = ?{}", params.len() + 1));
        params.push(Box::new(b.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT q.id, COALESCE(q.question_bank,''), COALESCE(q.subject,''), COALESCE(q.topic,''),
                (SELECT COUNT(*) FROM answer_choices a WHERE a.question_id = q.id),
                (SELECT COUNT(*) FROM quick_hits h WHERE h.question_id = q.id),
                COALESCE((SELECT GROUP_CONCAT(t.tag_name, ', ') FROM question_tags t
                          WHERE t.question_id = q.id), '')
         FROM questions q{}
         ORDER BY q.created_at DESC, q.rowid DESC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                id: row.get(0)?,
                question_bank: row.get(1)?,
                subject: row.get(2)?,
                topic: row.get(3)?,
                choices: row.get(4)?,
                quick_hits: row.get(5)?,
                tags: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_tags(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT t.name, COUNT(qt.question_id)
         FROM tags t LEFT JOIN question_tags qt ON qt.tag_name = t.name
         GROUP BY t.name
         ORDER BY COUNT(qt.question_id) DESC, t.name",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub questions: usize,
    pub answer_choices: usize,
    pub articles: usize,
    pub quick_hits: usize,
    pub quick_hit_answers: usize,
    pub tags: usize,
    pub imports: usize,
    pub failed_imports: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> rusqlite::Result<usize> { conn.query_row(sql, [], |r| r.get(0)) };
    Ok(Stats {
        questions: count("SELECT COUNT(*) FROM questions")?,
        answer_choices: count("SELECT COUNT(*) FROM answer_choices")?,
        articles: count("SELECT COUNT(*) FROM articles")?,
        quick_hits: count("SELECT COUNT(*) FROM quick_hits")?,
        quick_hit_answers: count("SELECT COUNT(*) FROM quick_hit_answers")?,
        tags: count("SELECT COUNT(*) FROM tags")?,
        imports: count("SELECT COUNT(*) FROM imports")?,
        failed_imports: count("SELECT COUNT(*) FROM imports WHERE error IS NOT NULL")?,
    })
}

#[cfg(test)]
pub fn memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    init_schema(&conn).unwrap();
    conn
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_get_or_create_is_idempotent() {
        let conn = memory();
        assert!(conn.get_or_create_tag("Trauma").unwrap());
        assert!(!conn.get_or_create_tag("Trauma").unwrap());
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.tags, 1);
    }

    #[test]
    fn question_with_children_round_trips_through_show() {
        let conn = memory();
        let qid = conn
            .create_question(&QuestionRow {
                subject: Some("Cardiology".into()),
                difficulty: Some(0.5),
                ..Default::default()
            })
            .unwrap();
        conn.create_answer_choice(
            &qid,
            &AnswerChoiceRow { text: "yes".into(), is_correct: true, explanation: None },
        )
        .unwrap();
        conn.create_article(&qid, &ArticleRow { text: "Smith 2020".into() }).unwrap();
        let qh = QuickHitRow {
            question_text: "Why?".into(),
            rationale: "Because".into(),
            answers: vec![],
        };
        let qh_id = conn.create_quick_hit(&qid, &qh).unwrap();
        conn.create_quick_hit_answer(&qh_id, &QuickHitAnswerRow { text: "A. x".into(), is_correct: false })
            .unwrap();
        conn.get_or_create_tag("a").unwrap();
        conn.tag_question(&qid, "a").unwrap();
        conn.tag_question(&qid, "a").unwrap();

        let detail = fetch_question(&conn, &qid.to_string()).unwrap().unwrap();
        assert_eq!(detail.question.subject.as_deref(), Some("Cardiology"));
        assert_eq!(detail.question.difficulty, Some(0.5));
        assert_eq!(detail.tags, vec!["a".to_string()]);
        assert_eq!(detail.answer_choices.len(), 1);
        assert!(detail.answer_choices[0].is_correct);
        assert_eq!(detail.articles[0].text, "Smith 2020");
        assert_eq!(detail.quick_hits[0].answers[0].text, "A. x");

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["subject"], "Cardiology");
    }

    #[test]
    fn show_unknown_id_is_none() {
        let conn = memory();
        assert!(fetch_question(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn child_requires_existing_parent() {
        let conn = memory();
        let orphan = Uuid::new_v4();
        let row = ArticleRow { text: "x".into() };
        assert!(conn.create_article(&orphan, &row).is_err());
    }

    #[test]
    fn overview_filters_by_subject() {
        let conn = memory();
        for subject in ["Cardiology", "Trauma", "Cardiology"] {
            conn.create_question(&QuestionRow { subject: Some(subject.into()), ..Default::default() })
                .unwrap();
        }
        let rows = fetch_overview(&conn, Some("Cardiology"), None, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.subject == "Cardiology"));
        assert_eq!(fetch_overview(&conn, None, None, 1).unwrap().len(), 1);
    }

    #[test]
    fn import_log_counts_failures() {
        let conn = memory();
        record_import(&conn, &ImportLogRow {
            source: "a.docx".into(),
            format: Some("headings".into()),
            question_count: 1,
            error: None,
            elapsed_ms: 3,
        })
        .unwrap();
        record_import(&conn, &ImportLogRow {
            source: "b.docx".into(),
            format: None,
            question_count: 0,
            error: Some("conversion failed".into()),
            elapsed_ms: 1,
        })
        .unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.imports, 2);
        assert_eq!(stats.failed_imports, 1);
    }
}
