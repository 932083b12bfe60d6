//! Per-renderer scene bookkeeping.
//!
//! Each id listed in the index moves through
//! `Unloaded -> Loading -> Ready`, and additionally `Ready -> Reloading -> Ready`
//! when its files change on disk. A failed load falls back to `Unloaded`, so
//! selecting the id again retries; a failed reload keeps the old scene.

use std::collections::BTreeMap;

use crate::errors::SceneLoadError;
use crate::renderer::Release;
use crate::schema::SceneId;

#[derive(Debug)]
pub enum SceneSlot<S> {
    Unloaded,
    Loading,
    Ready(S),
    Reloading(S),
}

impl<S> SceneSlot<S> {
    pub fn scene(&self) -> Option<&S> {
        match self {
            SceneSlot::Ready(s) | SceneSlot::Reloading(s) => Some(s),
            SceneSlot::Unloaded | SceneSlot::Loading => None,
        }
    }

    fn scene_mut(&mut self) -> Option<&mut S> {
        match self {
            SceneSlot::Ready(s) | SceneSlot::Reloading(s) => Some(s),
            SceneSlot::Unloaded | SceneSlot::Loading => None,
        }
    }
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A new scene became drawable.
    Added,
    /// A reload replaced an existing scene.
    Replaced,
    Failed,
    /// The id is not in the index; the result was released.
    Discarded,
}

#[derive(Debug)]
pub struct SceneRegistry<S> {
    files: BTreeMap<SceneId, String>,
    slots: BTreeMap<SceneId, SceneSlot<S>>,
}

impl<S: Release> SceneRegistry<S> {
    pub fn new(files: BTreeMap<SceneId, String>) -> Self {
        let slots = files.keys().map(|&id| (id, SceneSlot::Unloaded)).collect();
        Self { files, slots }
    }

    /// Description file for `id`, as listed in the index.
    pub fn file(&self, id: SceneId) -> Option<&str> {
        self.files.get(&id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.files.keys().copied()
    }

    pub fn slot(&self, id: SceneId) -> Option<&SceneSlot<S>> {
        self.slots.get(&id)
    }

    pub fn get(&self, id: SceneId) -> Option<&S> {
        self.slots.get(&id)?.scene()
    }

    pub fn ready_mut(&mut self) -> impl Iterator<Item = (SceneId, &mut S)> {
        self.slots.iter_mut().filter_map(|(&id, slot)| slot.scene_mut().map(|s| (id, s)))
    }

    /// Marks `id` as loading. Returns false when a fetch should not be
    /// started: the id is unknown, already loading, or already loaded.
    pub fn begin_load(&mut self, id: SceneId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot @ SceneSlot::Unloaded) => {
                *slot = SceneSlot::Loading;
                true
            }
            _ => false,
        }
    }

    /// Marks a ready scene for replacement. The old scene keeps drawing.
    pub fn begin_reload(&mut self, id: SceneId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        match std::mem::replace(slot, SceneSlot::Unloaded) {
            SceneSlot::Ready(scene) => {
                *slot = SceneSlot::Reloading(scene);
                true
            }
            SceneSlot::Unloaded => {
                *slot = SceneSlot::Loading;
                true
            }
            other => {
                *slot = other;
                false
            }
        }
    }

    pub fn complete(&mut self, id: SceneId, result: Result<S, SceneLoadError>) -> Completion {
        let Some(slot) = self.slots.get_mut(&id) else {
            if let Ok(mut scene) = result {
                scene.release();
            }
            return Completion::Discarded;
        };
        let previous = std::mem::replace(slot, SceneSlot::Unloaded);
        match (previous, result) {
            (SceneSlot::Reloading(mut old), Ok(new)) | (SceneSlot::Ready(mut old), Ok(new)) => {
                old.release();
                *slot = SceneSlot::Ready(new);
                log::info!("scene {id} reloaded");
                Completion::Replaced
            }
            (SceneSlot::Reloading(old), Err(err)) | (SceneSlot::Ready(old), Err(err)) => {
                log::error!("reloading scene {id} failed, keeping the previous version: {err}");
                *slot = SceneSlot::Ready(old);
                Completion::Failed
            }
            (SceneSlot::Loading | SceneSlot::Unloaded, Ok(new)) => {
                *slot = SceneSlot::Ready(new);
                log::info!("scene {id} ready");
                Completion::Added
            }
            (SceneSlot::Loading | SceneSlot::Unloaded, Err(err)) => {
                log::error!("loading scene {id} failed: {err}");
                Completion::Failed
            }
        }
    }

    /// Drops a scene back to `Unloaded`, releasing its resources.
    pub fn evict(&mut self, id: SceneId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        match std::mem::replace(slot, SceneSlot::Unloaded) {
            SceneSlot::Ready(mut scene) | SceneSlot::Reloading(mut scene) => {
                scene.release();
                true
            }
            SceneSlot::Loading | SceneSlot::Unloaded => false,
        }
    }

    pub fn release_all(&mut self) {
        let ids: Vec<_> = self.slots.keys().copied().collect();
        for id in ids {
            self.evict(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Stub {
        tag: u32,
        released: Rc<Cell<u32>>,
    }

    impl Release for Stub {
        fn release(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    fn registry() -> SceneRegistry<Stub> {
        SceneRegistry::new(BTreeMap::from([(1, "a.json".to_string()), (2, "b.json".to_string())]))
    }

    fn failure() -> SceneLoadError {
        SceneLoadError::Fetch(FetchError::Io {
            path: "a.json".into(),
            source: std::io::ErrorKind::NotFound.into(),
        })
    }

    #[test]
    fn load_starts_once_per_id() {
        let mut reg = registry();
        assert!(reg.begin_load(1));
        assert!(!reg.begin_load(1));
        assert!(!reg.begin_load(9));
        assert!(matches!(reg.slot(1), Some(SceneSlot::Loading)));
    }

    #[test]
    fn completion_makes_scene_ready() {
        let mut reg = registry();
        let released = Rc::new(Cell::new(0));
        reg.begin_load(2);
        let done = reg.complete(2, Ok(Stub { tag: 2, released: released.clone() }));
        assert_eq!(done, Completion::Added);
        assert_eq!(reg.get(2).map(|p| p.tag), Some(2));
        assert!(!reg.begin_load(2));
    }

    #[test]
    fn failure_returns_to_unloaded_and_allows_retry() {
        let mut reg = registry();
        reg.begin_load(1);
        assert_eq!(reg.complete(1, Err(failure())), Completion::Failed);
        assert!(matches!(reg.slot(1), Some(SceneSlot::Unloaded)));
        assert!(reg.begin_load(1));
    }

    #[test]
    fn reload_keeps_old_scene_until_replacement_arrives() {
        let mut reg = registry();
        let released = Rc::new(Cell::new(0));
        reg.begin_load(1);
        reg.complete(1, Ok(Stub { tag: 1, released: released.clone() }));

        assert!(reg.begin_reload(1));
        assert_eq!(reg.get(1).map(|p| p.tag), Some(1));
        assert!(!reg.begin_reload(1));

        assert_eq!(reg.complete(1, Err(failure())), Completion::Failed);
        assert_eq!(reg.get(1).map(|p| p.tag), Some(1));
        assert_eq!(released.get(), 0);

        reg.begin_reload(1);
        let done = reg.complete(1, Ok(Stub { tag: 10, released: released.clone() }));
        assert_eq!(done, Completion::Replaced);
        assert_eq!(reg.get(1).map(|p| p.tag), Some(10));
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn late_duplicate_result_replaces_and_releases() {
        let mut reg = registry();
        let released = Rc::new(Cell::new(0));
        reg.begin_load(1);
        reg.complete(1, Ok(Stub { tag: 1, released: released.clone() }));
        reg.complete(1, Ok(Stub { tag: 2, released: released.clone() }));
        assert_eq!(reg.get(1).map(|p| p.tag), Some(2));
        assert_eq!(released.get(), 1);
        assert_eq!(reg.ids().filter(|&id| reg.get(id).is_some()).count(), 1);
    }

    #[test]
    fn evict_releases_and_unloads() {
        let mut reg = registry();
        let released = Rc::new(Cell::new(0));
        reg.begin_load(1);
        reg.complete(1, Ok(Stub { tag: 1, released: released.clone() }));
        assert!(reg.evict(1));
        assert_eq!(released.get(), 1);
        assert!(reg.get(1).is_none());
        assert!(reg.begin_load(1));

        let result = reg.complete(7, Ok(Stub { tag: 7, released: released.clone() }));
        assert_eq!(result, Completion::Discarded);
        assert_eq!(released.get(), 2);
    }
}
