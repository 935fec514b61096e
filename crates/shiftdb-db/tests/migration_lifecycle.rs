use std::path::Path;

use rusqlite::Connection;
use shiftdb_common::MigrationError;
use shiftdb_config::AppConfig;
use shiftdb_db::Runner;
use tempfile::TempDir;

const CREATE_POST_UP: &str = "CREATE TABLE post (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL
);";
const CREATE_POST_DOWN: &str = "DROP TABLE post;";
const CREATION_DATE_UP: &str = "ALTER TABLE post ADD COLUMN createdAt TEXT;";
const CREATION_DATE_DOWN: &str = "ALTER TABLE post DROP COLUMN createdAt;";

/// A scratch project: migrations directory plus database file.
struct Project {
    dir: TempDir,
    config: AppConfig,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("blog.sqlite3");
        config.migrations.directory = dir.path().join("migrations");
        std::fs::create_dir_all(&config.migrations.directory).expect("create migrations dir");
        Self { dir, config }
    }

    fn add(&self, id: &str, up: &str, down: &str) {
        let dir = &self.config.migrations.directory;
        std::fs::write(dir.join(format!("{id}.up.sql")), up).expect("write up");
        std::fs::write(dir.join(format!("{id}.down.sql")), down).expect("write down");
    }

    fn runner(&self) -> Runner {
        Runner::open(&self.config).expect("open runner")
    }

    fn inspect(&self) -> Connection {
        Connection::open(&self.config.database.path).expect("open db for inspection")
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// User tables and their columns, excluding the history table.
fn schema(conn: &Connection) -> Vec<(String, Vec<String>)> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != 'migrations'
             ORDER BY name",
        )
        .unwrap();
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    tables
        .into_iter()
        .map(|table| {
            let mut stmt = conn
                .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
                .unwrap();
            let columns: Vec<String> = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
            (table, columns)
        })
        .collect()
}

fn history(conn: &Connection) -> Vec<(i64, String)> {
    let mut stmt = conn
        .prepare("SELECT timestamp, name FROM migrations ORDER BY timestamp")
        .unwrap();
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    rows
}

#[test]
fn create_post_apply_and_revert() {
    let project = Project::new();
    project.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);

    let runner = project.runner();
    let report = runner.apply().unwrap();
    assert_eq!(report.applied.len(), 1);

    let conn = project.inspect();
    assert_eq!(history(&conn), vec![(100, "CreatePost".to_string())]);
    assert_eq!(
        schema(&conn),
        vec![(
            "post".to_string(),
            vec!["id".to_string(), "title".to_string(), "content".to_string()]
        )]
    );

    runner.revert().unwrap();
    assert!(history(&conn).is_empty());
    assert!(schema(&conn).is_empty());
}

#[test]
fn only_new_migration_runs_on_second_release() {
    let project = Project::new();
    project.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    project.runner().apply().unwrap();

    project.add("200_PostCreationDate", CREATION_DATE_UP, CREATION_DATE_DOWN);
    let report = project.runner().apply().unwrap();

    let ids: Vec<String> = report.applied.iter().map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["200_PostCreationDate"]);
    assert_eq!(report.already_applied, 1);

    let conn = project.inspect();
    assert_eq!(
        history(&conn),
        vec![
            (100, "CreatePost".to_string()),
            (200, "PostCreationDate".to_string())
        ]
    );
    let (_, columns) = &schema(&conn)[0];
    assert!(columns.contains(&"createdAt".to_string()));
}

#[test]
fn one_run_and_many_runs_reach_same_schema() {
    let all_at_once = Project::new();
    all_at_once.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    all_at_once.add("200_PostCreationDate", CREATION_DATE_UP, CREATION_DATE_DOWN);
    all_at_once.runner().apply().unwrap();

    let stepwise = Project::new();
    stepwise.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    stepwise.runner().apply().unwrap();
    stepwise.add("200_PostCreationDate", CREATION_DATE_UP, CREATION_DATE_DOWN);
    stepwise.runner().apply().unwrap();
    assert!(stepwise.runner().apply().unwrap().is_noop());

    assert_eq!(
        schema(&all_at_once.inspect()),
        schema(&stepwise.inspect())
    );
    assert_eq!(
        history(&all_at_once.inspect()),
        history(&stepwise.inspect())
    );
}

#[test]
fn reverting_everything_restores_original_schema() {
    let project = Project::new();
    {
        let conn = project.inspect();
        conn.execute_batch("CREATE TABLE existing (id INTEGER PRIMARY KEY);")
            .unwrap();
    }
    let original = schema(&project.inspect());

    project.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    project.add("200_PostCreationDate", CREATION_DATE_UP, CREATION_DATE_DOWN);
    project.add(
        "300_CreateComment",
        "CREATE TABLE comment (id INTEGER PRIMARY KEY, post_id INTEGER REFERENCES post(id));",
        "DROP TABLE comment;",
    );

    let runner = project.runner();
    assert_eq!(runner.apply().unwrap().applied.len(), 3);
    for _ in 0..3 {
        assert!(runner.revert().unwrap().is_some());
    }
    assert!(runner.revert().unwrap().is_none());

    let conn = project.inspect();
    assert_eq!(schema(&conn), original);
    assert!(history(&conn).is_empty());
}

#[test]
fn failure_stops_the_batch() {
    let project = Project::new();
    project.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    project.add(
        "200_Broken",
        "ALTER TABLE post ADD COLUMN slug TEXT; ALTER TABLE nope ADD COLUMN x TEXT;",
        "ALTER TABLE post DROP COLUMN slug;",
    );
    project.add(
        "300_CreateComment",
        "CREATE TABLE comment (id INTEGER PRIMARY KEY);",
        "DROP TABLE comment;",
    );

    let err = project.runner().apply().unwrap_err();
    assert!(matches!(
        err.as_migration(),
        Some(MigrationError::BatchAborted {
            applied: 1,
            total: 3,
            ..
        })
    ));

    let conn = project.inspect();
    assert_eq!(history(&conn), vec![(100, "CreatePost".to_string())]);
    let tables = schema(&conn);
    assert_eq!(tables.len(), 1);
    assert!(!tables[0].1.contains(&"slug".to_string()));
}

#[test]
fn deleted_definition_blocks_revert() {
    let project = Project::new();
    project.add("100_CreatePost", CREATE_POST_UP, CREATE_POST_DOWN);
    project.add("200_PostCreationDate", CREATION_DATE_UP, CREATION_DATE_DOWN);
    project.runner().apply().unwrap();

    let dir = project.root().join("migrations");
    std::fs::remove_file(dir.join("200_PostCreationDate.up.sql")).unwrap();
    std::fs::remove_file(dir.join("200_PostCreationDate.down.sql")).unwrap();

    let runner = project.runner();
    let err = runner.revert().unwrap_err();
    assert!(matches!(
        err.as_migration(),
        Some(MigrationError::DefinitionMissing { timestamp: 200, .. })
    ));

    let status = runner.status().unwrap();
    assert_eq!(status.orphaned.len(), 1);
    assert_eq!(status.pending_count(), 0);
}

#[test]
fn demo_blog_migrations_apply_and_revert() {
    let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/blog/migrations");
    let project = Project::new();
    let mut config = project.config.clone();
    config.migrations.directory = demo;

    let runner = Runner::open(&config).unwrap();
    let ids: Vec<String> = runner
        .apply()
        .unwrap()
        .applied
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["1658694616973_CreatePost", "1658695123456_PostCreationDate"]
    );

    runner.revert().unwrap();
    runner.revert().unwrap();
    assert!(schema(&project.inspect()).is_empty());
}
