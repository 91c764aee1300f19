//! Integration tests for floe

use rusqlite::Connection;
use tempfile::TempDir;

use floe::config::{CheckpointConfig, Config, LimitsConfig, SinkConfig, SourceConfig};
use floe::pipeline::{run_dump, run_migrate, run_relabel};

/// A scratch workspace with the directory layout the pipeline expects.
struct Workspace {
    _root: TempDir,
    config: Config,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let db_dir = root.path().join("db");
        let csv_dir = root.path().join("csv_output");
        std::fs::create_dir(&db_dir).unwrap();
        std::fs::create_dir(&csv_dir).unwrap();

        let config = Config {
            source: SourceConfig {
                db_dir: db_dir.to_string_lossy().into_owned(),
                table: "main".to_string(),
                csv_dir: csv_dir.to_string_lossy().into_owned(),
            },
            sink: SinkConfig {
                path: root
                    .path()
                    .join("metadata.db")
                    .to_string_lossy()
                    .into_owned(),
                table: "data".to_string(),
                fts_table: None,
            },
            checkpoint: CheckpointConfig {
                path: root
                    .path()
                    .join("checkpoints")
                    .to_string_lossy()
                    .into_owned(),
            },
            limits: LimitsConfig {
                chunk_size: 10,
                dump_chunk_size: 7,
                row_cap: 100,
                sample_size: 100,
                label_threshold: 3,
                max_workers: 2,
            },
        };

        Self {
            _root: root,
            config,
        }
    }

    fn seed_db(&self, name: &str, columns: &[&str], rows: usize) {
        let path = format!("{}/{}", self.config.source.db_dir, name);
        let conn = Connection::open(path).unwrap();
        let defs: Vec<String> = columns.iter().map(|c| format!("{c} TEXT")).collect();
        conn.execute(&format!("CREATE TABLE main ({})", defs.join(", ")), [])
            .unwrap();

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let mut stmt = conn
            .prepare(&format!(
                "INSERT INTO main ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ))
            .unwrap();
        for i in 0..rows {
            let values: Vec<String> = columns.iter().map(|c| format!("{c}{i}")).collect();
            stmt.execute(rusqlite::params_from_iter(values.iter())).unwrap();
        }
    }

    fn write_csv(&self, name: &str, content: &str) {
        let path = format!("{}/{}", self.config.source.csv_dir, name);
        std::fs::write(path, content).unwrap();
    }

    fn csv_path(&self, name: &str) -> String {
        format!("{}/{}", self.config.source.csv_dir, name)
    }

    fn sink_conn(&self) -> Connection {
        Connection::open(&self.config.sink.path).unwrap()
    }

    fn sink_row_count(&self) -> i64 {
        self.sink_conn()
            .query_row("SELECT COUNT(*) FROM data", [], |r| r.get(0))
            .unwrap()
    }
}

mod dump_tests {
    use super::*;

    #[tokio::test]
    async fn test_gated_size_dump() {
        let ws = Workspace::new();
        // 50 rows: under the cap of 100, gets dumped
        ws.seed_db("small.db", &["a", "b"], 50);
        // 150 rows: over the cap, skipped entirely
        ws.seed_db("big.db", &["a", "b"], 150);

        let stats = run_dump(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 1);
        assert_eq!(stats.items_skipped, 1);
        assert_eq!(stats.rows_written, 50);
        // 50 rows at dump_chunk_size 7 -> 8 chunks
        assert_eq!(stats.chunks_written, 8);

        let dumped = std::fs::read_to_string(ws.csv_path("small.csv")).unwrap();
        let mut lines = dumped.lines();
        assert_eq!(lines.next(), Some("a,b"));
        assert_eq!(lines.count(), 50);

        // The over-cap table produced no CSV and no checkpoint entry
        assert!(!std::path::Path::new(&ws.csv_path("big.csv")).exists());
        let log = std::fs::read_to_string(
            ws.config.checkpoint.log_path("dump"),
        )
        .unwrap();
        assert!(log.contains("small.db"));
        assert!(!log.contains("big.db"));
    }

    #[tokio::test]
    async fn test_dump_creates_missing_output_dir() {
        let ws = Workspace::new();
        ws.seed_db("only.db", &["x"], 5);
        std::fs::remove_dir(&ws.config.source.csv_dir).unwrap();

        let stats = run_dump(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 1);
        assert!(std::path::Path::new(&ws.csv_path("only.csv")).exists());
    }

    #[tokio::test]
    async fn test_dump_is_idempotent_under_checkpoint() {
        let ws = Workspace::new();
        ws.seed_db("only.db", &["x"], 20);

        let first = run_dump(&ws.config).await.unwrap();
        assert_eq!(first.items_processed, 1);
        let stamp = std::fs::metadata(ws.csv_path("only.csv"))
            .unwrap()
            .modified()
            .unwrap();

        let second = run_dump(&ws.config).await.unwrap();
        assert_eq!(second.items_processed, 0);
        assert_eq!(second.rows_written, 0);
        let stamp_after = std::fs::metadata(ws.csv_path("only.csv"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(stamp, stamp_after);
    }
}

mod migrate_tests {
    use super::*;

    #[tokio::test]
    async fn test_additive_migration() {
        let ws = Workspace::new();
        ws.write_csv("a_first.csv", "a,b\n1,2\n3,4\n");
        ws.write_csv("b_second.csv", "a,b,c\n5,6,7\n");

        let stats = run_migrate(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 2);
        assert_eq!(stats.rows_written, 3);

        let conn = ws.sink_conn();
        let columns = floe::schema::table_columns(&conn, "data").unwrap();
        assert!(columns.contains(&"a".to_string()));
        assert!(columns.contains(&"b".to_string()));
        assert!(columns.contains(&"c".to_string()));

        // Rows from the two-column file have c as null
        let nulls: i64 = conn
            .query_row("SELECT COUNT(*) FROM data WHERE c IS NULL", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(nulls, 2);
    }

    #[tokio::test]
    async fn test_migrate_classifies_columns() {
        let ws = Workspace::new();
        let mut content = String::from("c0,c1\n");
        for i in 0..10 {
            content.push_str(&format!("user{i}@example.com,+7 (912) 345-67-{i:02}\n"));
        }
        ws.write_csv("contacts.csv", &content);

        run_migrate(&ws.config).await.unwrap();

        let conn = ws.sink_conn();
        let columns = floe::schema::table_columns(&conn, "data").unwrap();
        assert!(columns.contains(&"email".to_string()));
        assert!(columns.contains(&"phone_number".to_string()));

        let email: String = conn
            .query_row("SELECT email FROM data LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert!(email.ends_with("@example.com"));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent_under_checkpoint() {
        let ws = Workspace::new();
        ws.write_csv("one.csv", "a,b\n1,2\n3,4\n");

        run_migrate(&ws.config).await.unwrap();
        assert_eq!(ws.sink_row_count(), 2);

        // Second run performs zero additional writes
        let second = run_migrate(&ws.config).await.unwrap();
        assert_eq!(second.items_processed, 0);
        assert_eq!(second.rows_written, 0);
        assert_eq!(ws.sink_row_count(), 2);
    }

    #[tokio::test]
    async fn test_migrate_skips_malformed_rows() {
        let ws = Workspace::new();
        ws.write_csv("messy.csv", "a,b\n1,2\n1,2,3,4\n5,6\n");

        let stats = run_migrate(&ws.config).await.unwrap();
        // The four-field row is dropped, the rest land
        assert_eq!(stats.rows_written, 2);
        assert_eq!(ws.sink_row_count(), 2);
    }

    #[tokio::test]
    async fn test_migrate_fixed_width_with_fts() {
        let mut ws = Workspace::new();
        ws.config.sink.fts_table = Some("data_fts".to_string());
        ws.write_csv("narrow.csv", "a,b\nhello,world\n");
        ws.write_csv("wide.csv", "a,b,c\nfoo,bar,baz\n");

        let stats = run_migrate(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 2);

        let conn = ws.sink_conn();
        // Width floors at 10 even though the widest source has 3 columns
        let columns = floe::schema::table_columns(&conn, "data").unwrap();
        assert_eq!(columns.len(), 11); // id + col_1..col_10

        // Both files are searchable through the synced index
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM data_fts WHERE data_fts MATCH 'hello'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM data_fts WHERE data_fts MATCH 'baz'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        // Index and primary table agree on row count
        let data: i64 = conn
            .query_row("SELECT COUNT(*) FROM data", [], |r| r.get(0))
            .unwrap();
        let indexed: i64 = conn
            .query_row("SELECT COUNT(*) FROM data_fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(data, indexed);
    }

    #[tokio::test]
    async fn test_unreadable_item_does_not_stop_the_batch() {
        let ws = Workspace::new();
        ws.write_csv("empty.csv", "");
        ws.write_csv("fine.csv", "a\n1\n");

        let stats = run_migrate(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 1);
        assert_eq!(stats.items_failed, 1);
        assert_eq!(ws.sink_row_count(), 1);

        // The failed item is not checkpointed and would be retried
        let log =
            std::fs::read_to_string(ws.config.checkpoint.log_path("migrate")).unwrap();
        assert!(!log.contains("empty.csv"));
        assert!(log.contains("fine.csv"));
    }
}

mod relabel_tests {
    use super::*;

    #[tokio::test]
    async fn test_relabel_databases_and_csvs() {
        let ws = Workspace::new();

        // Database whose first column is clearly emails
        let db_path = format!("{}/contacts.db", ws.config.source.db_dir);
        let conn = Connection::open(&db_path).unwrap();
        conn.execute("CREATE TABLE main (c0 TEXT, c1 TEXT)", [])
            .unwrap();
        for i in 0..10 {
            conn.execute(
                "INSERT INTO main (c0, c1) VALUES (?1, ?2)",
                rusqlite::params![format!("u{i}@example.com"), format!("{i}")],
            )
            .unwrap();
        }
        drop(conn);

        // CSV with a person-name column
        ws.write_csv("people.csv", "x,y\nJohn Smith,1\nJane Doe,2\n");

        let stats = run_relabel(&ws.config).await.unwrap();
        assert_eq!(stats.items_processed, 2);

        let conn = Connection::open(&db_path).unwrap();
        let columns = floe::schema::table_columns(&conn, "main").unwrap();
        assert_eq!(columns, vec!["email", "c1"]);

        let rewritten = std::fs::read_to_string(ws.csv_path("people.csv")).unwrap();
        assert!(rewritten.starts_with("name,y\n"));
        assert!(rewritten.contains("John Smith,1"));
    }

    #[tokio::test]
    async fn test_relabel_is_idempotent_under_checkpoint() {
        let ws = Workspace::new();
        ws.write_csv("people.csv", "x\nJohn Smith\n");

        let first = run_relabel(&ws.config).await.unwrap();
        assert_eq!(first.items_processed, 1);

        // Once checkpointed, the renamed file is not touched again
        let second = run_relabel(&ws.config).await.unwrap();
        assert_eq!(second.items_processed, 0);

        let content = std::fs::read_to_string(ws.csv_path("people.csv")).unwrap();
        assert!(content.starts_with("name\n"));
    }
}
