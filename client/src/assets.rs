//! Image asset cache and asynchronous loading.
//!
//! Assets are requested at most once per key. A request either completes with
//! decoded image data or fails permanently, in which case the renderer keeps
//! drawing the procedural fallback for that asset.

use log::{debug, error, info};
use shared::KNOWN_CAR_TYPES;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKey {
    Track,
    Car(String),
}

impl AssetKey {
    /// Sprite key for a car type the client ships art for. Any other name,
    /// including ones carrying path separators, has no sprite.
    pub fn car(car_type: &str) -> Option<AssetKey> {
        KNOWN_CAR_TYPES
            .contains(&car_type)
            .then(|| AssetKey::Car(car_type.to_string()))
    }

    /// Path relative to the asset root.
    pub fn path(&self) -> String {
        match self {
            AssetKey::Track => "track.jpg".to_string(),
            AssetKey::Car(car_type) => format!("cars/{}.png", car_type),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Missing,
    Pending,
    Ready,
    Failed,
}

enum Slot<I> {
    Pending,
    Ready(I),
    Failed,
}

/// Per-key load state for one kind of image handle.
pub struct AssetCache<I> {
    slots: HashMap<AssetKey, Slot<I>>,
}

impl<I> AssetCache<I> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    pub fn get(&self, key: &AssetKey) -> Option<&I> {
        match self.slots.get(key) {
            Some(Slot::Ready(image)) => Some(image),
            _ => None,
        }
    }

    pub fn status(&self, key: &AssetKey) -> AssetStatus {
        match self.slots.get(key) {
            None => AssetStatus::Missing,
            Some(Slot::Pending) => AssetStatus::Pending,
            Some(Slot::Ready(_)) => AssetStatus::Ready,
            Some(Slot::Failed) => AssetStatus::Failed,
        }
    }

    /// Marks `key` pending. Returns false if it was already requested, loaded
    /// or failed, in which case no new load should be issued.
    pub fn begin_load(&mut self, key: &AssetKey) -> bool {
        if self.slots.contains_key(key) {
            return false;
        }
        self.slots.insert(key.clone(), Slot::Pending);
        true
    }

    pub fn complete(&mut self, key: AssetKey, image: I) {
        info!("Asset {} loaded", key);
        self.slots.insert(key, Slot::Ready(image));
    }

    pub fn fail(&mut self, key: AssetKey) {
        self.slots.insert(key, Slot::Failed);
    }
}

impl<I> Default for AssetCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw outcome of a load request, before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEvent {
    Loaded { key: AssetKey, bytes: Vec<u8> },
    Failed { key: AssetKey, reason: String },
}

/// Starts asynchronous asset loads; results come back as [`AssetEvent`]s.
pub trait AssetLoader {
    fn request(&mut self, key: &AssetKey);
}

/// Reads assets from a directory on the tokio runtime.
pub struct FileAssetLoader {
    root: PathBuf,
    runtime: Handle,
    events: mpsc::UnboundedSender<AssetEvent>,
}

impl FileAssetLoader {
    pub fn new(
        root: impl Into<PathBuf>,
        runtime: Handle,
        events: mpsc::UnboundedSender<AssetEvent>,
    ) -> Self {
        Self {
            root: root.into(),
            runtime,
            events,
        }
    }
}

impl AssetLoader for FileAssetLoader {
    fn request(&mut self, key: &AssetKey) {
        let path = self.root.join(key.path());
        let key = key.clone();
        let events = self.events.clone();
        debug!("Loading asset {}", path.display());

        self.runtime.spawn(async move {
            let event = match tokio::fs::read(&path).await {
                Ok(bytes) => AssetEvent::Loaded { key, bytes },
                Err(e) => {
                    error!("Failed to load asset {}: {}", path.display(), e);
                    AssetEvent::Failed {
                        key,
                        reason: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_paths() {
        assert_eq!(AssetKey::Track.path(), "track.jpg");
        assert_eq!(AssetKey::Car("red_bull".to_string()).path(), "cars/red_bull.png");
    }

    #[test]
    fn test_car_keys_only_for_known_types() {
        assert_eq!(AssetKey::car("mercedes"), Some(AssetKey::Car("mercedes".to_string())));
        assert_eq!(AssetKey::car("williams"), None);
        assert_eq!(AssetKey::car("../x"), None);
        assert_eq!(AssetKey::car("../../../etc/passwd\0"), None);
        assert_eq!(AssetKey::car(""), None);
    }

    #[test]
    fn test_begin_load_only_once() {
        let mut cache: AssetCache<u32> = AssetCache::new();
        let key = AssetKey::Car("ferrari".to_string());

        assert_eq!(cache.status(&key), AssetStatus::Missing);
        assert!(cache.begin_load(&key));
        assert!(!cache.begin_load(&key));
        assert_eq!(cache.status(&key), AssetStatus::Pending);
        assert!(cache.get(&key).is_none());

        cache.complete(key.clone(), 7);
        assert_eq!(cache.get(&key), Some(&7));
        assert!(!cache.begin_load(&key));
    }

    #[test]
    fn test_failed_asset_is_never_retried() {
        let mut cache: AssetCache<u32> = AssetCache::new();
        assert!(cache.begin_load(&AssetKey::Track));
        cache.fail(AssetKey::Track);
        assert_eq!(cache.status(&AssetKey::Track), AssetStatus::Failed);
        assert!(!cache.begin_load(&AssetKey::Track));
        assert!(cache.get(&AssetKey::Track).is_none());
    }

    #[tokio::test]
    async fn test_file_loader_reports_both_outcomes() {
        let root = std::env::temp_dir().join(format!("race-client-assets-{}", std::process::id()));
        tokio_test::assert_ok!(tokio::fs::create_dir_all(root.join("cars")).await);
        tokio_test::assert_ok!(tokio::fs::write(root.join("cars/zauber.png"), b"png-bytes").await);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut loader = FileAssetLoader::new(root.clone(), Handle::current(), tx);

        loader.request(&AssetKey::Car("zauber".to_string()));
        assert_eq!(
            rx.recv().await,
            Some(AssetEvent::Loaded {
                key: AssetKey::Car("zauber".to_string()),
                bytes: b"png-bytes".to_vec(),
            })
        );

        loader.request(&AssetKey::Track);
        assert!(matches!(
            rx.recv().await,
            Some(AssetEvent::Failed { key: AssetKey::Track, .. })
        ));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
