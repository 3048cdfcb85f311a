use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use serde::Serialize;
use tracing::info;

use crate::error::LoadError;
use crate::model::{Class, Component, Spell};

pub const PAGE_SIZE: u32 = 15;

const CATALOG_SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS spells_classes;
DROP TABLE IF EXISTS spells;
DROP TABLE IF EXISTS classes;
DROP TABLE IF EXISTS component_types;

CREATE TABLE component_types (
    name TEXT PRIMARY KEY
);
INSERT INTO component_types (name) VALUES ('verbal'), ('somatic'), ('material');

CREATE TABLE classes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    name_ua TEXT NOT NULL
);

CREATE TABLE spells (
    id INTEGER PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    school TEXT NOT NULL,
    level INTEGER NOT NULL CHECK (level >= 0),
    title TEXT NOT NULL,
    title_ua TEXT NOT NULL,
    title_folded TEXT NOT NULL DEFAULT '',
    title_ua_folded TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL,
    casting_time TEXT NOT NULL,
    duration TEXT NOT NULL,
    distance TEXT NOT NULL,
    components TEXT NOT NULL DEFAULT '[]' CHECK (json_valid(components)),
    material_description TEXT,
    material_price INTEGER
);
CREATE INDEX idx_spells_level ON spells(level);

CREATE TRIGGER spells_components_known
BEFORE INSERT ON spells
WHEN EXISTS (
    SELECT 1 FROM json_each(NEW.components)
    WHERE value NOT IN (SELECT name FROM component_types)
)
BEGIN
    SELECT RAISE(ABORT, 'unknown component type');
END;

CREATE TABLE spells_classes (
    spell_id INTEGER NOT NULL REFERENCES spells(id) ON DELETE CASCADE,
    class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
    PRIMARY KEY (spell_id, class_id)
);
CREATE INDEX idx_spells_classes_class ON spells_classes(class_id);
"#;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadReport {
    pub classes: usize,
    pub spells: usize,
    pub associations: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogStats {
    pub classes: usize,
    pub spells: usize,
    pub associations: usize,
    pub priced_materials: usize,
    pub by_level: BTreeMap<u32, usize>,
}

/// A spell read back from the catalog, with its class associations.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredSpell {
    pub id: i64,
    pub slug: String,
    pub school: String,
    pub level: u32,
    pub title: String,
    pub title_ua: String,
    pub description: String,
    pub casting_time: String,
    pub duration: String,
    pub distance: String,
    pub components: BTreeSet<Component>,
    #[serde(rename = "materialDescription")]
    pub material_description: Option<String>,
    #[serde(rename = "materialPrice")]
    pub material_price: Option<i64>,
    pub class_ids: Vec<i64>,
    pub classes: Vec<String>,
}

/// Search result row; the description is left out.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpellSummary {
    pub id: i64,
    pub slug: String,
    pub school: String,
    pub level: u32,
    pub title: String,
    pub title_ua: String,
    pub casting_time: String,
    pub duration: String,
    pub distance: String,
    pub components: BTreeSet<Component>,
    #[serde(rename = "materialDescription")]
    pub material_description: Option<String>,
    #[serde(rename = "materialPrice")]
    pub material_price: Option<i64>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellQuery {
    pub text: Option<String>,
    /// Matches a class by localized or slug name.
    pub class: Option<String>,
    pub level: Option<u32>,
    /// 1-based; 0 is treated as 1.
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page_number: u32,
    pub page_size: u32,
}

pub fn open_connection(db_path: &Path) -> Result<Connection> {
    ensure_db_parent(db_path)?;
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    connection
        .busy_timeout(Duration::from_secs(5))
        .context("failed to set sqlite busy timeout")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys pragma")?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to enable WAL journal mode")?;
    Ok(connection)
}

/// Drop and recreate the catalog tables in one transaction.
pub fn create_schema(connection: &mut Connection) -> Result<()> {
    let transaction = connection
        .transaction()
        .context("failed to start schema transaction")?;
    transaction
        .execute_batch(CATALOG_SCHEMA_SQL)
        .context("failed to create catalog schema")?;
    transaction
        .commit()
        .context("failed to commit schema transaction")?;
    info!("catalog schema created");
    Ok(())
}

pub fn schema_exists(connection: &Connection) -> Result<bool> {
    for table in ["classes", "spells", "spells_classes"] {
        if !table_exists(connection, table)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Replace the whole catalog. Truncation and inserts share one transaction,
/// so a failure leaves the previous catalog in place.
pub fn load_all(
    connection: &mut Connection,
    classes: &[Class],
    spells: &[Spell],
) -> Result<LoadReport, LoadError> {
    let transaction = connection
        .transaction()
        .map_err(failed("starting the transaction"))?;
    transaction
        .execute_batch(
            "DELETE FROM spells_classes;
             DELETE FROM spells;
             DELETE FROM classes;",
        )
        .map_err(failed("truncating the catalog"))?;
    let report = insert_catalog(&transaction, classes, spells)?;
    transaction
        .commit()
        .map_err(failed("committing the transaction"))?;

    info!(
        classes = report.classes,
        spells = report.spells,
        associations = report.associations,
        "catalog loaded"
    );
    Ok(report)
}

/// Recreate the schema and load the catalog in one transaction. Works on an
/// empty database and on one with an older schema; a failure rolls back the
/// schema change together with the inserts.
pub fn rebuild_all(
    connection: &mut Connection,
    classes: &[Class],
    spells: &[Spell],
) -> Result<LoadReport, LoadError> {
    let transaction = connection
        .transaction()
        .map_err(failed("starting the transaction"))?;
    transaction
        .execute_batch(CATALOG_SCHEMA_SQL)
        .map_err(failed("recreating the schema"))?;
    let report = insert_catalog(&transaction, classes, spells)?;
    transaction
        .commit()
        .map_err(failed("committing the transaction"))?;

    info!(
        classes = report.classes,
        spells = report.spells,
        associations = report.associations,
        "catalog rebuilt"
    );
    Ok(report)
}

fn failed(stage: &'static str) -> impl Fn(rusqlite::Error) -> LoadError {
    move |source| LoadError::Transaction { stage, source }
}

fn insert_catalog(
    transaction: &Transaction<'_>,
    classes: &[Class],
    spells: &[Spell],
) -> Result<LoadReport, LoadError> {
    let mut class_statement = transaction
        .prepare("INSERT INTO classes (id, name, name_ua) VALUES (?1, ?2, ?3)")
        .map_err(failed("preparing the class insert"))?;
    for class in classes {
        class_statement
            .execute(params![class.id, class.name, class.name_ua])
            .map_err(failed("inserting classes"))?;
    }

    // SQLite LIKE only folds ASCII, so titles are stored lowercased as well.
    let mut spell_statement = transaction
        .prepare(
            "INSERT INTO spells (
                id, slug, school, level,
                title, title_ua, title_folded, title_ua_folded, description,
                casting_time, duration, distance,
                components, material_description, material_price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .map_err(failed("preparing the spell insert"))?;
    for spell in spells {
        let components =
            serde_json::to_string(&spell.components).map_err(|source| LoadError::Encode {
                spell_id: spell.id,
                source,
            })?;
        spell_statement
            .execute(params![
                spell.id,
                spell.slug,
                spell.school,
                spell.level,
                spell.title,
                spell.title_ua,
                spell.title.to_lowercase(),
                spell.title_ua.to_lowercase(),
                spell.description,
                spell.casting_time,
                spell.duration,
                spell.distance,
                components,
                spell.material_description,
                spell.material_price,
            ])
            .map_err(failed("inserting spells"))?;
    }

    let mut association_statement = transaction
        .prepare("INSERT INTO spells_classes (spell_id, class_id) VALUES (?1, ?2)")
        .map_err(failed("preparing the association insert"))?;
    let mut associations = 0usize;
    for spell in spells {
        for class_id in &spell.classes {
            association_statement
                .execute(params![spell.id, class_id])
                .map_err(failed("inserting class associations"))?;
            associations += 1;
        }
    }

    Ok(LoadReport {
        classes: classes.len(),
        spells: spells.len(),
        associations,
    })
}

pub fn get_spell(connection: &Connection, id: i64) -> Result<Option<StoredSpell>> {
    query_stored_spell(connection, "id = ?1", SqlValue::Integer(id))
}

pub fn get_spell_by_slug(connection: &Connection, slug: &str) -> Result<Option<StoredSpell>> {
    query_stored_spell(
        connection,
        "slug = ?1",
        SqlValue::Text(slug.trim().to_lowercase()),
    )
}

pub fn search_spells(connection: &Connection, query: &SpellQuery) -> Result<Page<SpellSummary>> {
    let page_number = query.page.max(1);
    let mut filters = Vec::new();
    let mut values = Vec::new();

    if let Some(text) = query.text.as_deref().map(str::trim)
        && !text.is_empty()
    {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        filters.push(format!(
            "(s.title_folded LIKE ?{} ESCAPE '\\' OR s.title_ua_folded LIKE ?{} ESCAPE '\\')",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(SqlValue::Text(pattern.clone()));
        values.push(SqlValue::Text(pattern));
    }
    if let Some(class) = query.class.as_deref().map(str::trim)
        && !class.is_empty()
    {
        filters.push(format!(
            "EXISTS (
                SELECT 1 FROM spells_classes sc
                JOIN classes c ON c.id = sc.class_id
                WHERE sc.spell_id = s.id AND (c.name_ua = ?{0} OR c.name = ?{0})
            )",
            values.len() + 1
        ));
        values.push(SqlValue::Text(class.to_lowercase()));
    }
    if let Some(level) = query.level {
        filters.push(format!("s.level = ?{}", values.len() + 1));
        values.push(SqlValue::Integer(i64::from(level)));
    }

    let where_clause = if filters.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", filters.join(" AND "))
    };

    let total: i64 = connection
        .query_row(
            &format!("SELECT COUNT(*) FROM spells s {where_clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )
        .context("failed to count search results")?;

    let limit_index = values.len() + 1;
    let sql = format!(
        "SELECT s.id, s.slug, s.school, s.level, s.title, s.title_ua,
                s.casting_time, s.duration, s.distance, s.components,
                s.material_description, s.material_price
         FROM spells s
         {where_clause}
         ORDER BY s.id ASC
         LIMIT ?{limit_index} OFFSET ?{}",
        limit_index + 1
    );
    values.push(SqlValue::Integer(i64::from(PAGE_SIZE)));
    values.push(SqlValue::Integer(
        i64::from(PAGE_SIZE) * (i64::from(page_number) - 1),
    ));

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare spell search query")?;
    let rows = statement
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<i64>>(11)?,
            ))
        })
        .context("failed to run spell search query")?;

    let mut items = Vec::new();
    for row in rows {
        let (
            id,
            slug,
            school,
            level,
            title,
            title_ua,
            casting_time,
            duration,
            distance,
            components,
            material_description,
            material_price,
        ) = row.context("failed to decode spell search row")?;
        let (_, classes) = spell_classes(connection, id)?;
        items.push(SpellSummary {
            id,
            slug,
            school,
            level,
            title,
            title_ua,
            casting_time,
            duration,
            distance,
            components: decode_components(&components)?,
            material_description,
            material_price,
            classes,
        });
    }

    Ok(Page {
        items,
        total_count: usize::try_from(total).context("count does not fit into usize")?,
        page_number,
        page_size: PAGE_SIZE,
    })
}

pub fn catalog_stats(connection: &Connection) -> Result<Option<CatalogStats>> {
    if !schema_exists(connection)? {
        return Ok(None);
    }

    let classes = count_query(connection, "SELECT COUNT(*) FROM classes")?;
    let spells = count_query(connection, "SELECT COUNT(*) FROM spells")?;
    let associations = count_query(connection, "SELECT COUNT(*) FROM spells_classes")?;
    let priced_materials = count_query(
        connection,
        "SELECT COUNT(*) FROM spells WHERE material_price IS NOT NULL",
    )?;

    let mut statement = connection
        .prepare("SELECT level, COUNT(*) FROM spells GROUP BY level ORDER BY level ASC")
        .context("failed to prepare level aggregation query")?;
    let rows = statement
        .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))
        .context("failed to run level aggregation query")?;
    let mut by_level = BTreeMap::new();
    for row in rows {
        let (level, count) = row.context("failed to read level aggregation row")?;
        let count = usize::try_from(count).context("level count does not fit into usize")?;
        by_level.insert(level, count);
    }

    Ok(Some(CatalogStats {
        classes,
        spells,
        associations,
        priced_materials,
        by_level,
    }))
}

/// Like [`parse_positive_integer`] but also accepts a bare `0`.
pub fn parse_non_negative_integer(text: &str) -> Option<u32> {
    if text.trim() == "0" {
        return Some(0);
    }
    parse_positive_integer(text)
}

/// Strict positive integer: no sign, no leading zero, fits in `u32`.
pub fn parse_positive_integer(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some('1'..='9') => {}
        _ => return None,
    }
    if !chars.all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

fn query_stored_spell(
    connection: &Connection,
    predicate: &str,
    key: SqlValue,
) -> Result<Option<StoredSpell>> {
    if !schema_exists(connection)? {
        return Ok(None);
    }
    let sql = format!(
        "SELECT id, slug, school, level, title, title_ua, description,
                casting_time, duration, distance, components,
                material_description, material_price
         FROM spells
         WHERE {predicate}"
    );
    let row = connection
        .query_row(&sql, [key], read_stored_row)
        .optional()
        .context("failed to query spell")?;

    let Some((mut spell, components)) = row else {
        return Ok(None);
    };
    spell.components = decode_components(&components)?;
    let (class_ids, classes) = spell_classes(connection, spell.id)?;
    spell.class_ids = class_ids;
    spell.classes = classes;
    Ok(Some(spell))
}

fn read_stored_row(row: &Row<'_>) -> rusqlite::Result<(StoredSpell, String)> {
    Ok((
        StoredSpell {
            id: row.get(0)?,
            slug: row.get(1)?,
            school: row.get(2)?,
            level: row.get(3)?,
            title: row.get(4)?,
            title_ua: row.get(5)?,
            description: row.get(6)?,
            casting_time: row.get(7)?,
            duration: row.get(8)?,
            distance: row.get(9)?,
            components: BTreeSet::new(),
            material_description: row.get(11)?,
            material_price: row.get(12)?,
            class_ids: Vec::new(),
            classes: Vec::new(),
        },
        row.get(10)?,
    ))
}

fn spell_classes(connection: &Connection, spell_id: i64) -> Result<(Vec<i64>, Vec<String>)> {
    let mut statement = connection
        .prepare_cached(
            "SELECT c.id, c.name_ua
             FROM spells_classes sc
             JOIN classes c ON c.id = sc.class_id
             WHERE sc.spell_id = ?1
             ORDER BY c.id ASC",
        )
        .context("failed to prepare spell classes query")?;
    let rows = statement
        .query_map([spell_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .context("failed to run spell classes query")?;

    let mut ids = Vec::new();
    let mut names = Vec::new();
    for row in rows {
        let (id, name) = row.context("failed to decode spell classes row")?;
        ids.push(id);
        names.push(name);
    }
    Ok((ids, names))
}

fn decode_components(raw: &str) -> Result<BTreeSet<Component>> {
    serde_json::from_str(raw).with_context(|| format!("invalid components value {raw}"))
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn ensure_db_parent(db_path: &Path) -> Result<()> {
    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create database parent directory {}",
            parent.display()
        )
    })
}

fn table_exists(connection: &Connection, table_name: &str) -> Result<bool> {
    let exists: i64 = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to check sqlite_master for table {table_name}"))?;
    Ok(exists == 1)
}

fn count_query(connection: &Connection, sql: &str) -> Result<usize> {
    let count: i64 = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed query: {sql}"))?;
    usize::try_from(count).context("count does not fit into usize")
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rusqlite::Connection;
    use tempfile::tempdir;

    use super::{
        SpellQuery, catalog_stats, create_schema, get_spell, get_spell_by_slug, load_all,
        open_connection, parse_non_negative_integer, parse_positive_integer, rebuild_all,
        search_spells,
    };
    use crate::error::LoadError;
    use crate::model::{Class, Component, Spell};

    fn class(id: i64, name: &str, name_ua: &str) -> Class {
        Class {
            id,
            name: name.to_string(),
            name_ua: name_ua.to_string(),
        }
    }

    fn spell(
        id: i64,
        slug: &str,
        title: &str,
        title_ua: &str,
        level: u32,
        classes: Vec<i64>,
    ) -> Spell {
        Spell {
            id,
            slug: slug.to_string(),
            school: "evocation".to_string(),
            level,
            classes,
            title: title.to_string(),
            title_ua: title_ua.to_string(),
            description: format!("{title} description"),
            casting_time: "1 дія".to_string(),
            duration: "Миттєва".to_string(),
            distance: "60 футів".to_string(),
            components: BTreeSet::from([Component::Verbal, Component::Somatic]),
            material_description: None,
            material_price: None,
        }
    }

    fn fixture() -> (Vec<Class>, Vec<Spell>) {
        let classes = vec![
            class(1, "cleric", "жрець"),
            class(2, "wizard", "чарівник"),
        ];
        let mut revivify = spell(2, "revivify", "Revivify", "Відродження", 3, vec![1]);
        revivify.components.insert(Component::Material);
        revivify.material_description = Some("діаманти вартістю 300 зм".to_string());
        revivify.material_price = Some(3_000_000);
        let spells = vec![
            spell(1, "fire-bolt", "Fire Bolt", "Вогняний снаряд", 0, vec![2]),
            revivify,
            spell(3, "fireball", "Fireball", "Вогняна куля", 3, vec![2, 1]),
        ];
        (classes, spells)
    }

    fn loaded_connection() -> Connection {
        let mut connection = Connection::open_in_memory().expect("open");
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .expect("foreign keys");
        create_schema(&mut connection).expect("schema");
        let (classes, spells) = fixture();
        load_all(&mut connection, &classes, &spells).expect("load");
        connection
    }

    type TableRows = (Vec<(i64, String)>, Vec<(i64, String, String)>, Vec<(i64, i64)>);

    fn table_rows(connection: &Connection) -> TableRows {
        let mut statement = connection
            .prepare("SELECT id, name FROM classes ORDER BY id")
            .expect("prepare");
        let classes: Vec<(i64, String)> = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows");
        let mut statement = connection
            .prepare("SELECT id, slug, components FROM spells ORDER BY id")
            .expect("prepare");
        let spells: Vec<(i64, String, String)> = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows");
        let mut statement = connection
            .prepare("SELECT spell_id, class_id FROM spells_classes ORDER BY spell_id, class_id")
            .expect("prepare");
        let links: Vec<(i64, i64)> = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows");
        (classes, spells, links)
    }

    #[test]
    fn open_connection_creates_parent_directory() {
        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("data").join("weaver.db");
        let mut connection = open_connection(&db_path).expect("open");
        create_schema(&mut connection).expect("schema");
        assert!(db_path.exists());
    }

    #[test]
    fn create_schema_is_idempotent_and_resets_content() {
        let mut connection = loaded_connection();
        create_schema(&mut connection).expect("schema again");
        let stats = catalog_stats(&connection).expect("stats").expect("schema present");
        assert_eq!(stats.classes, 0);
        assert_eq!(stats.spells, 0);
    }

    #[test]
    fn load_all_persists_classes_spells_and_links() {
        let connection = loaded_connection();
        let (classes, spells, links) = table_rows(&connection);
        assert_eq!(
            classes,
            vec![(1, "cleric".to_string()), (2, "wizard".to_string())]
        );
        assert_eq!(spells.len(), 3);
        assert_eq!(spells[1].2, r#"["verbal","somatic","material"]"#);
        assert_eq!(links, vec![(1, 2), (2, 1), (3, 1), (3, 2)]);
    }

    #[test]
    fn load_all_twice_yields_identical_tables() {
        let mut connection = loaded_connection();
        let first = table_rows(&connection);
        let (classes, spells) = fixture();
        let report = load_all(&mut connection, &classes, &spells).expect("reload");
        assert_eq!(report.classes, 2);
        assert_eq!(report.spells, 3);
        assert_eq!(report.associations, 4);
        assert_eq!(table_rows(&connection), first);
    }

    #[test]
    fn failed_load_keeps_previous_catalog() {
        let mut connection = loaded_connection();
        let before = table_rows(&connection);

        let classes = vec![
            class(1, "bard", "бард"),
            class(2, "druid", "друїд"),
            class(2, "ranger", "слідопит"),
        ];
        let error = load_all(&mut connection, &classes, &[]).expect_err("must fail");
        assert!(matches!(
            error,
            LoadError::Transaction {
                stage: "inserting classes",
                ..
            }
        ));
        assert_eq!(table_rows(&connection), before);
    }

    #[test]
    fn association_to_unknown_class_rolls_back() {
        let mut connection = loaded_connection();
        let before = table_rows(&connection);

        let classes = vec![class(1, "bard", "бард")];
        let spells = vec![spell(
            1,
            "vicious-mockery",
            "Vicious Mockery",
            "Злісна насмішка",
            0,
            vec![9],
        )];
        let error = load_all(&mut connection, &classes, &spells).expect_err("must fail");
        assert!(matches!(
            error,
            LoadError::Transaction {
                stage: "inserting class associations",
                ..
            }
        ));
        assert_eq!(table_rows(&connection), before);
    }

    #[test]
    fn rebuild_all_creates_schema_on_empty_database() {
        let mut connection = Connection::open_in_memory().expect("open");
        let (classes, spells) = fixture();
        let report = rebuild_all(&mut connection, &classes, &spells).expect("rebuild");
        assert_eq!(report.spells, 3);
        assert_eq!(report.associations, 4);

        let rebuilt = table_rows(&connection);
        assert_eq!(rebuilt, table_rows(&loaded_connection()));
    }

    #[test]
    fn failed_rebuild_keeps_previous_catalog_and_schema() {
        let mut connection = loaded_connection();
        let before = table_rows(&connection);

        let (_, spells) = fixture();
        let classes = vec![class(1, "cleric", "жрець"), class(1, "wizard", "чарівник")];
        let error = rebuild_all(&mut connection, &classes, &spells).expect_err("must fail");
        assert!(matches!(
            error,
            LoadError::Transaction {
                stage: "inserting classes",
                ..
            }
        ));
        assert_eq!(table_rows(&connection), before);
        let stats = catalog_stats(&connection).expect("stats").expect("schema");
        assert_eq!(stats.spells, 3);
    }

    #[test]
    fn unknown_component_type_is_rejected_by_schema() {
        let connection = loaded_connection();
        let error = connection
            .execute(
                "INSERT INTO spells (id, slug, school, level, title, title_ua, description,
                    casting_time, duration, distance, components)
                 VALUES (99, 'x', 's', 1, 't', 't', 'd', 'c', 'd', 'r', '[\"focus\"]')",
                [],
            )
            .expect_err("must fail");
        assert!(error.to_string().contains("unknown component type"));
    }

    #[test]
    fn get_spell_round_trips_components_price_and_classes() {
        let connection = loaded_connection();
        let (_, spells) = fixture();

        let stored = get_spell(&connection, 2).expect("query").expect("spell exists");
        assert_eq!(stored.components, spells[1].components);
        assert_eq!(stored.material_price, Some(3_000_000));
        assert_eq!(
            stored.material_description.as_deref(),
            Some("діаманти вартістю 300 зм")
        );
        assert_eq!(stored.class_ids, vec![1]);
        assert_eq!(stored.classes, vec!["жрець".to_string()]);
        assert_eq!(stored.description, "Revivify description");

        let by_slug = get_spell_by_slug(&connection, "Fireball")
            .expect("query")
            .expect("spell exists");
        assert_eq!(
            by_slug.class_ids.iter().copied().collect::<BTreeSet<_>>(),
            BTreeSet::from([1, 2])
        );

        assert!(get_spell(&connection, 42).expect("query").is_none());
    }

    #[test]
    fn get_spell_without_schema_returns_none() {
        let connection = Connection::open_in_memory().expect("open");
        assert!(get_spell(&connection, 1).expect("query").is_none());
        assert!(catalog_stats(&connection).expect("stats").is_none());
    }

    #[test]
    fn search_filters_by_text_class_and_level() {
        let connection = loaded_connection();

        let page = search_spells(
            &connection,
            &SpellQuery {
                text: Some("fire".to_string()),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 2);
        assert_eq!(page.page_number, 1);
        assert_eq!(page.page_size, 15);
        assert_eq!(
            page.items.iter().map(|item| item.id).collect::<Vec<_>>(),
            vec![1, 3]
        );

        let page = search_spells(
            &connection,
            &SpellQuery {
                text: Some("Вогнян".to_string()),
                class: Some("жрець".to_string()),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].slug, "fireball");
        assert_eq!(
            page.items[0].classes,
            vec!["жрець".to_string(), "чарівник".to_string()]
        );

        let page = search_spells(
            &connection,
            &SpellQuery {
                class: Some("Wizard".to_string()),
                level: Some(0),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].slug, "fire-bolt");
    }

    #[test]
    fn search_ignores_case_for_cyrillic_titles() {
        let connection = loaded_connection();
        let page = search_spells(
            &connection,
            &SpellQuery {
                text: Some("вогнян".to_string()),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(
            page.items.iter().map(|item| item.slug.as_str()).collect::<Vec<_>>(),
            vec!["fire-bolt", "fireball"]
        );

        let page = search_spells(
            &connection,
            &SpellQuery {
                text: Some("ВОГНЯНА КУЛЯ".to_string()),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].title_ua, "Вогняна куля");
    }

    #[test]
    fn search_pages_past_the_end_are_empty() {
        let connection = loaded_connection();
        let page = search_spells(
            &connection,
            &SpellQuery {
                page: 2,
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 3);
        assert_eq!(page.page_number, 2);
        assert!(page.items.is_empty());

        let page = search_spells(&connection, &SpellQuery::default()).expect("search");
        assert_eq!(page.page_number, 1);
        assert_eq!(page.items.len(), 3);
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let connection = loaded_connection();
        let page = search_spells(
            &connection,
            &SpellQuery {
                text: Some("%".to_string()),
                ..SpellQuery::default()
            },
        )
        .expect("search");
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn catalog_stats_counts_levels() {
        let connection = loaded_connection();
        let stats = catalog_stats(&connection).expect("stats").expect("schema");
        assert_eq!(stats.classes, 2);
        assert_eq!(stats.spells, 3);
        assert_eq!(stats.associations, 4);
        assert_eq!(stats.priced_materials, 1);
        assert_eq!(stats.by_level, BTreeMap::from([(0, 1), (3, 2)]));
    }

    #[test]
    fn parse_positive_integer_is_strict() {
        assert_eq!(parse_positive_integer("1"), Some(1));
        assert_eq!(parse_positive_integer(" 42 "), Some(42));
        assert_eq!(parse_positive_integer("0"), None);
        assert_eq!(parse_positive_integer("07"), None);
        assert_eq!(parse_positive_integer("+3"), None);
        assert_eq!(parse_positive_integer("3.5"), None);
        assert_eq!(parse_positive_integer(""), None);
        assert_eq!(parse_positive_integer("99999999999"), None);
    }

    #[test]
    fn parse_non_negative_integer_accepts_zero_only_as_itself() {
        assert_eq!(parse_non_negative_integer("0"), Some(0));
        assert_eq!(parse_non_negative_integer(" 0 "), Some(0));
        assert_eq!(parse_non_negative_integer("9"), Some(9));
        assert_eq!(parse_non_negative_integer("00"), None);
        assert_eq!(parse_non_negative_integer("-1"), None);
        assert_eq!(parse_non_negative_integer("05"), None);
    }
}
