use crate::error::App;
use crate::scores::Scoreboard;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const PLAYERS_FILE: &str = "players.json";

/// The persisted player list, one JSON array under a fixed file name.
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PLAYERS_FILE),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Scoreboard, App> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Scoreboard::default()),
            Err(e) => return Err(App::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Scoreboard::default());
        }
        Ok(Scoreboard::new(serde_json::from_str(&content)?))
    }

    /// Overwrites the whole list through a temporary sibling and a rename.
    pub async fn save(&self, board: &Scoreboard) -> Result<(), App> {
        let json = serde_json::to_string_pretty(board)?;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    async fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "tq-storage-{tag}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = scratch_dir("missing").await;
        let store = ScoreStore::new(&dir);
        assert!(store.load().await.unwrap().is_empty());
        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn empty_file_loads_empty() {
        let dir = scratch_dir("empty").await;
        let store = ScoreStore::new(&dir);
        fs::write(store.path(), "  \n").await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn list_round_trips_unchanged() {
        let dir = scratch_dir("roundtrip").await;
        let store = ScoreStore::new(&dir);

        let mut board = Scoreboard::default();
        let zoe = board.add("Zoë").unwrap().id.clone();
        board.add("bob");
        board.adjust(&zoe, 4);
        store.save(&board).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded, board);
        assert_eq!(reloaded.players()[0].name, "Zoë");
        assert_eq!(reloaded.players()[0].score, 4);
        assert!(!store.path().with_extension("json.tmp").exists());
        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn stored_format_is_a_plain_array() {
        let dir = scratch_dir("format").await;
        let store = ScoreStore::new(&dir);
        fs::write(
            store.path(),
            r#"[{"id":"1700000000000","name":"Ada","score":2}]"#,
        )
        .await
        .unwrap();

        let board = store.load().await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board.players()[0].id, "1700000000000");

        store.save(&board).await.unwrap();
        let raw = fs::read_to_string(store.path()).await.unwrap();
        assert!(raw.trim_start().starts_with('['));
        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = scratch_dir("corrupt").await;
        let store = ScoreStore::new(&dir);
        fs::write(store.path(), "{not json").await.unwrap();
        assert!(matches!(store.load().await, Err(App::Json(_))));
        fs::remove_dir_all(dir).await.unwrap();
    }
}
