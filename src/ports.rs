//! Collaborators the menu store depends on: a key-value slot for persisted
//! state and a source for the canonical seed document.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::error::FetchError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The seed bundled with the binary, used when no `--seed` is given.
pub const DEFAULT_SEED: &str = include_str!("../assets/seed.json");

pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

pub trait SeedSource {
    fn fetch(&self) -> Result<String, FetchError>;
    fn describe(&self) -> String;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.slot_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.slot_path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.slots.insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

pub struct FileSeed(pub PathBuf);

impl SeedSource for FileSeed {
    fn fetch(&self) -> Result<String, FetchError> {
        Ok(fs::read_to_string(&self.0)?)
    }

    fn describe(&self) -> String {
        self.0.display().to_string()
    }
}

pub struct HttpSeed {
    url: Url,
    client: Client,
}

impl HttpSeed {
    pub fn new(url: Url) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        Ok(Self { url, client })
    }
}

impl SeedSource for HttpSeed {
    fn fetch(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .text()
            .map_err(|err| FetchError::Body(err.to_string()))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

pub struct StaticSeed(pub String);

impl StaticSeed {
    pub fn bundled() -> Self {
        StaticSeed(DEFAULT_SEED.to_string())
    }
}

impl SeedSource for StaticSeed {
    fn fetch(&self) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "bundled seed".into()
    }
}

/// `http://` and `https://` locations are fetched over the network,
/// anything else is read as a file path.
pub fn seed_from_location(location: &str) -> Result<Box<dyn SeedSource>, FetchError> {
    let lowered = location.trim().to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        let url = Url::parse(location.trim()).map_err(|err| FetchError::Http(err.to_string()))?;
        Ok(Box::new(HttpSeed::new(url)?))
    } else {
        Ok(Box::new(FileSeed(PathBuf::from(location))))
    }
}
