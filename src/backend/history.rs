use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::mangadex::{Chapter, Manga};

const BOOKMARKS_KEY: &str = "bookmarks";
const HISTORY_KEY: &str = "read_history";
const HISTORY_LIMIT: usize = 100;

/// Persistence boundary for bookmarks and reading history. Injected into
/// the app instead of reached for as ambient state, so the navigation side
/// can be tested against an in-memory store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// One JSON file per key under a directory in the platform config dir.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create store directory {}: {e}", dir.display());
        }
        Self { dir }
    }

    pub fn in_config_dir() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("yomidex-tui");
        Self::new(dir)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = fs::write(self.path_for(key), value) {
            warn!("Failed to persist {key}: {e}");
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct BookmarkData {
    manga_ids: HashSet<String>,
    #[serde(default)]
    manga_cache: Vec<BookmarkedManga>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkedManga {
    pub id: String,
    pub title: String,
    pub author: String,
    pub status: String,
    pub description: String,
    pub cover_url: String,
}

impl From<&Manga> for BookmarkedManga {
    fn from(manga: &Manga) -> Self {
        BookmarkedManga {
            id: manga.id.clone(),
            title: manga.title.clone(),
            author: manga.author.clone(),
            status: manga.status.clone(),
            description: manga.description.clone(),
            cover_url: manga.cover_url.clone(),
        }
    }
}

impl From<&BookmarkedManga> for Manga {
    fn from(bm: &BookmarkedManga) -> Self {
        Manga {
            id: bm.id.clone(),
            title: bm.title.clone(),
            author: bm.author.clone(),
            artist: String::new(),
            status: bm.status.clone(),
            description: bm.description.clone(),
            cover_url: bm.cover_url.clone(),
        }
    }
}

pub struct Bookmarks {
    store: Arc<dyn KeyValueStore>,
    data: BookmarkData,
}

impl Bookmarks {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let data = store
            .get(BOOKMARKS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { store, data }
    }

    fn save(&self) {
        match serde_json::to_string_pretty(&self.data) {
            Ok(raw) => self.store.set(BOOKMARKS_KEY, &raw),
            Err(e) => warn!("Failed to serialize bookmarks: {e}"),
        }
    }

    pub fn add(&mut self, manga: &Manga) {
        self.data.manga_ids.insert(manga.id.clone());
        if !self.data.manga_cache.iter().any(|m| m.id == manga.id) {
            self.data.manga_cache.push(BookmarkedManga::from(manga));
        }
        self.save();
    }

    pub fn remove(&mut self, manga_id: &str) {
        self.data.manga_ids.remove(manga_id);
        self.data.manga_cache.retain(|m| m.id != manga_id);
        self.save();
    }

    pub fn is_bookmarked(&self, manga_id: &str) -> bool {
        self.data.manga_ids.contains(manga_id)
    }

    pub fn toggle(&mut self, manga: &Manga) -> bool {
        if self.is_bookmarked(&manga.id) {
            self.remove(&manga.id);
            false
        } else {
            self.add(manga);
            true
        }
    }

    pub fn get_bookmarked_manga(&self) -> Vec<Manga> {
        self.data.manga_cache.iter().map(Manga::from).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub manga_id: String,
    pub manga_title: String,
    pub chapter_id: String,
    pub chapter_number: Option<String>,
    pub language: String,
    pub read_at_secs: u64,
}

/// Most-recent-first reading history, appended on every chapter visit and
/// capped so the file stays small.
pub struct ReadHistory {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
}

impl ReadHistory {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = store
            .get(HISTORY_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { store, entries }
    }

    fn save(&self) {
        match serde_json::to_string_pretty(&self.entries) {
            Ok(raw) => self.store.set(HISTORY_KEY, &raw),
            Err(e) => warn!("Failed to serialize read history: {e}"),
        }
    }

    pub fn record(&mut self, manga: &Manga, chapter: &Chapter) {
        let read_at_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.entries
            .retain(|e| !(e.manga_id == manga.id && e.chapter_id == chapter.id));
        self.entries.insert(
            0,
            HistoryEntry {
                manga_id: manga.id.clone(),
                manga_title: manga.title.clone(),
                chapter_id: chapter.id.clone(),
                chapter_number: chapter.chapter.clone(),
                language: chapter.translated_language.clone(),
                read_at_secs,
            },
        );
        self.entries.truncate(HISTORY_LIMIT);
        self.save();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
