//! Integration tests for the gator RSS aggregator
//!
//! These tests drive the command table end to end against an on-disk
//! database and a config file in a temporary directory.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

mod common {
    use super::*;
    use gator::fetcher::DEFAULT_TIMEOUT;
    use gator::{Command, Commands, Config, Database, Fetcher, State};
    use tempfile::TempDir;

    /// Output sink that tests can read back after a command ran.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn take(&self) -> String {
            let bytes = std::mem::take(&mut *self.0.lock().unwrap());
            String::from_utf8(bytes).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("gator.db");
        format!("sqlite:{}", db_path.display())
    }

    /// Write a fresh config file pointing at a database in `temp_dir`.
    pub fn write_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let path = temp_dir.path().join(".gatorconfig.json");
        Config::new(create_db_path(temp_dir))
            .write_to(&path)
            .unwrap();
        path
    }

    /// One CLI invocation: read config, open database, run a command.
    pub async fn run_gator(config_path: &std::path::Path, words: &[&str]) -> gator::Result<String> {
        let config = Config::read_from(config_path)?;
        let db = Database::connect(&config.db_url).await?;
        let fetcher = Fetcher::new(DEFAULT_TIMEOUT)?;
        let output = SharedBuffer::default();
        let mut state = State::new(config, db, fetcher, Box::new(output.clone()));

        let cmd = Command::from_words(words.iter().map(|w| w.to_string())).unwrap();
        Commands::with_defaults().run(&mut state, &cmd).await?;
        Ok(output.take())
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::common::*;
    use gator::Config;

    #[tokio::test]
    async fn test_register_persists_current_user() {
        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);

        run_gator(&config_path, &["register", "kahya"]).await.unwrap();

        let config = Config::read_from(&config_path).unwrap();
        assert_eq!(config.current_user_name, "kahya");
        assert!(config.db_url.starts_with("sqlite:"));
    }

    #[tokio::test]
    async fn test_login_survives_between_invocations() {
        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);

        run_gator(&config_path, &["register", "kahya"]).await.unwrap();
        run_gator(&config_path, &["register", "lane"]).await.unwrap();
        run_gator(&config_path, &["login", "kahya"]).await.unwrap();

        let printed = run_gator(&config_path, &["users"]).await.unwrap();
        assert_eq!(printed, "* kahya (current)\n* lane\n");
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use gator::Database;

    #[tokio::test]
    async fn test_database_persistence() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        // Create database and add data
        {
            let db = Database::connect(&db_url).await.unwrap();
            let user = db.create_user("kahya").await.unwrap();
            let feed = db
                .create_feed("Persistent Feed", "https://persistent.com/rss", user.id)
                .await
                .unwrap();
            db.create_feed_follow(&user, &feed).await.unwrap();
        }

        // Reopen database and verify data persists
        {
            let db = Database::new(&db_url).await.unwrap();
            // Don't reinitialize - just use existing data

            let user = db.get_user("kahya").await.unwrap().unwrap();
            let feeds = db.get_feeds().await.unwrap();
            assert_eq!(feeds.len(), 1);
            assert_eq!(feeds[0].feed.name, "Persistent Feed");
            assert_eq!(feeds[0].user_name, "kahya");

            let follows = db.get_feed_follows_for_user(user.id).await.unwrap();
            assert_eq!(follows.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_reset_cascades_on_disk() {
        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);

        run_gator(&config_path, &["register", "kahya"]).await.unwrap();
        run_gator(&config_path, &["addfeed", "Blog", "https://blog.example.com/rss"])
            .await
            .unwrap();
        run_gator(&config_path, &["reset"]).await.unwrap();

        let db = Database::connect(&create_db_path(&temp_dir)).await.unwrap();
        assert!(db.get_users().await.unwrap().is_empty());
        assert!(db.get_feeds().await.unwrap().is_empty());
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use gator::{Database, Error};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_body(title: &str, items: &[&str]) -> String {
        let items: String = items
            .iter()
            .map(|t| format!("<item><title>{}</title></item>", t))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0">
                <channel>
                    <title>{}</title>
                    <link>https://example.com</link>
                    <description>integration feed</description>
                    {}
                </channel>
            </rss>"#,
            title, items
        )
    }

    #[tokio::test]
    async fn test_follow_workflow_between_users() {
        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);
        let url = "https://www.wagslane.dev/index.xml";

        run_gator(&config_path, &["register", "kahya"]).await.unwrap();
        run_gator(&config_path, &["addfeed", "Lanes Blog", url]).await.unwrap();

        run_gator(&config_path, &["register", "holgith"]).await.unwrap();
        let result = run_gator(&config_path, &["addfeed", "Lanes Blog", url]).await;
        assert!(matches!(result, Err(Error::FeedExists(_))));

        run_gator(&config_path, &["follow", url]).await.unwrap();
        let result = run_gator(&config_path, &["follow", url]).await;
        assert!(matches!(result, Err(Error::AlreadyFollowing { .. })));

        let printed = run_gator(&config_path, &["following"]).await.unwrap();
        assert!(printed.contains("* Lanes Blog"));

        run_gator(&config_path, &["unfollow", url]).await.unwrap();
        let printed = run_gator(&config_path, &["following"]).await.unwrap();
        assert_eq!(printed, "No feed follows found for this user.\n");

        // The feed itself is untouched by unfollowing
        let printed = run_gator(&config_path, &["feeds"]).await.unwrap();
        assert!(printed.contains("* User:          kahya"));
    }

    #[tokio::test]
    async fn test_unknown_command_fails() {
        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);

        let result = run_gator(&config_path, &["fly"]).await;
        assert!(matches!(result, Err(Error::UnknownCommand(_))));
    }

    #[tokio::test]
    async fn test_scrape_round_robin_on_disk() {
        let server = MockServer::start().await;
        for name in ["alpha", "beta"] {
            Mock::given(method("GET"))
                .and(path(format!("/{}.xml", name)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(rss_body(name, &["Hello", "World"])),
                )
                .mount(&server)
                .await;
        }

        let temp_dir = create_temp_dir();
        let config_path = write_config(&temp_dir);
        run_gator(&config_path, &["register", "kahya"]).await.unwrap();
        for name in ["alpha", "beta"] {
            let url = format!("{}/{}.xml", server.uri(), name);
            run_gator(&config_path, &["addfeed", name, url.as_str()]).await.unwrap();
        }

        let db = Database::connect(&create_db_path(&temp_dir)).await.unwrap();
        let fetcher = gator::Fetcher::new(gator::fetcher::DEFAULT_TIMEOUT).unwrap();
        let mut out = Vec::new();

        gator::scraper::run(
            &db,
            &fetcher,
            std::time::Duration::from_millis(20),
            &mut out,
            Some(3),
        )
        .await
        .unwrap();

        let printed = String::from_utf8(out).unwrap();
        let order: Vec<&str> = printed
            .lines()
            .filter_map(|line| line.strip_prefix("Feed: "))
            .collect();
        assert_eq!(order, vec!["alpha", "beta", "alpha"]);
        assert_eq!(printed.matches(" * Hello").count(), 3);

        let feeds = db.get_feeds().await.unwrap();
        assert!(feeds.iter().all(|f| f.feed.last_fetched_at.is_some()));
        // alpha was fetched last, so beta is due next
        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.name, "beta");
    }
}
