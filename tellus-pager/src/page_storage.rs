use std::collections::HashMap;
use std::sync::Arc;

use crate::page::{Page, Quadrant};
use crate::tile_database::TileDatabase;
use crate::tile_key::TileKey;

/// Arena of live pages indexed by tile key.
///
/// Parent/child topology is stored as key handles into the map: no owning
/// pointers, no cycles. Root pages are owned here; every other page hangs
/// off its parent's child slots.
pub struct PageStorage {
    map: HashMap<TileKey, Page>,
    pub roots: Vec<TileKey>,
    database: Arc<TileDatabase>,
    stream_count: usize,
    next_generation: u64,
}

impl PageStorage {
    pub fn new(database: Arc<TileDatabase>, stream_count: usize) -> Self {
        Self {
            map: HashMap::new(),
            roots: vec![],
            database,
            stream_count,
            next_generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &TileKey) -> Option<&Page> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut Page> {
        self.map.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.map.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.map.values_mut()
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Create the level-zero pages of the configured minzoom, in
    /// deterministic row-major order. Idempotent.
    pub fn create_root_pages(&mut self) {
        if !self.roots.is_empty() {
            return;
        }
        let minzoom = self.database.minzoom();
        let per_side = 1u32 << minzoom;
        for y in 0..per_side {
            for x in 0..per_side {
                let key = TileKey::new(x, y, minzoom);
                let bound = self.database.tile_bounding_sphere(&key);
                let generation = self.next_generation();
                let page = Page::new(
                    key,
                    Quadrant::Root(self.roots.len()),
                    None,
                    bound,
                    self.stream_count,
                    generation,
                );
                self.roots.push(key);
                self.map.insert(key, page);
            }
        }
    }

    /// Ensure all four children of `parent_key` exist, creating only the
    /// missing ones. Surviving children keep their state.
    pub fn subdivide(&mut self, parent_key: &TileKey) {
        if self.get(parent_key).is_none() {
            return;
        }

        let children = [
            (parent_key.northwest(), Quadrant::Northwest),
            (parent_key.northeast(), Quadrant::Northeast),
            (parent_key.southwest(), Quadrant::Southwest),
            (parent_key.southeast(), Quadrant::Southeast),
        ];
        for (child_key, location) in children {
            if self.map.contains_key(&child_key) {
                continue;
            }
            let bound = self.database.tile_bounding_sphere(&child_key);
            let generation = self.next_generation();
            let page = Page::new(
                child_key,
                location,
                Some(*parent_key),
                bound,
                self.stream_count,
                generation,
            );
            self.map.insert(child_key, page);
        }

        let parent = self.map.get_mut(parent_key).expect("parent just seen");
        parent.northwest = Some(parent_key.northwest());
        parent.northeast = Some(parent_key.northeast());
        parent.southwest = Some(parent_key.southwest());
        parent.southeast = Some(parent_key.southeast());
    }

    /// Destroy a page's subtree bottom-up, cancelling in-flight requests.
    /// The page itself is removed unless it is a root; the parent's child
    /// slot is cleared. Returns the number of requests cancelled so callers
    /// can return their in-flight budget.
    pub fn remove_subtree(&mut self, key: &TileKey) -> usize {
        let mut cancelled = self.remove_children(key);

        let is_root = matches!(
            self.get(key).map(|p| &p.location),
            Some(Quadrant::Root(_))
        );
        if is_root {
            return cancelled;
        }

        if let Some(mut page) = self.map.remove(key) {
            cancelled += page.cancel_requests();
            if let Some(parent_key) = page.parent {
                if let Some(parent) = self.map.get_mut(&parent_key) {
                    match page.location {
                        Quadrant::Northwest => parent.northwest = None,
                        Quadrant::Northeast => parent.northeast = None,
                        Quadrant::Southwest => parent.southwest = None,
                        Quadrant::Southeast => parent.southeast = None,
                        Quadrant::Root(_) => {}
                    }
                }
            }
        }
        cancelled
    }

    /// Destroy all descendants of `key`, keeping the page itself. Returns
    /// the number of requests cancelled.
    pub fn remove_children(&mut self, key: &TileKey) -> usize {
        let Some(page) = self.get(key) else {
            return 0;
        };
        let mut cancelled = 0;
        let Some(children) = page.child_keys() else {
            // Children may have been partially pruned already; clear any
            // stragglers individually.
            let slots = self.get(key).map(|p| {
                [p.northwest, p.northeast, p.southwest, p.southeast]
            });
            if let Some(slots) = slots {
                for child in slots.into_iter().flatten() {
                    cancelled += self.remove_subtree(&child);
                }
            }
            return cancelled;
        };
        for child in children {
            cancelled += self.remove_children(&child);
            if let Some(mut removed) = self.map.remove(&child) {
                cancelled += removed.cancel_requests();
            }
        }
        if let Some(page) = self.map.get_mut(key) {
            page.northwest = None;
            page.northeast = None;
            page.southwest = None;
            page.southeast = None;
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_database::TileDatabaseOptions;

    fn storage() -> PageStorage {
        let db = TileDatabase::new(TileDatabaseOptions {
            base_urls: vec!["https://tiles.test/{z}/{x}/{y}.png".to_string()],
            minzoom: 0,
            maxzoom: 10,
            ..Default::default()
        })
        .unwrap();
        PageStorage::new(Arc::new(db), 1)
    }

    #[test]
    fn create_root_pages_is_idempotent() {
        let mut storage = storage();
        storage.create_root_pages();
        assert_eq!(storage.roots.len(), 1);
        assert_eq!(storage.len(), 1);
        storage.create_root_pages();
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn subdivide_creates_all_four_children_once() {
        let mut storage = storage();
        storage.create_root_pages();
        let root = storage.roots[0];
        storage.subdivide(&root);
        assert_eq!(storage.len(), 5);
        let page = storage.get(&root).unwrap();
        assert!(page.has_children());
        for child in page.child_keys().unwrap() {
            let child_page = storage.get(&child).unwrap();
            assert_eq!(child_page.parent, Some(root));
            assert!(child_page.bound.valid());
        }
        storage.subdivide(&root);
        assert_eq!(storage.len(), 5);
    }

    #[test]
    fn generations_are_unique_across_recreation() {
        let mut storage = storage();
        storage.create_root_pages();
        let root = storage.roots[0];
        storage.subdivide(&root);
        let child = storage.get(&root).unwrap().northwest.unwrap();
        let first_generation = storage.get(&child).unwrap().generation;
        storage.remove_children(&root);
        storage.subdivide(&root);
        let second_generation = storage.get(&child).unwrap().generation;
        assert_ne!(first_generation, second_generation);
    }

    #[test]
    fn remove_subtree_prunes_recursively_and_clears_parent_slot() {
        let mut storage = storage();
        storage.create_root_pages();
        let root = storage.roots[0];
        storage.subdivide(&root);
        let child = storage.get(&root).unwrap().northwest.unwrap();
        storage.subdivide(&child);
        assert_eq!(storage.len(), 9);

        storage.remove_subtree(&child);
        assert_eq!(storage.len(), 4);
        assert!(storage.get(&child).is_none());
        assert_eq!(storage.get(&root).unwrap().northwest, None);
    }

    #[test]
    fn roots_survive_remove_subtree() {
        let mut storage = storage();
        storage.create_root_pages();
        let root = storage.roots[0];
        storage.subdivide(&root);
        storage.remove_subtree(&root);
        assert_eq!(storage.len(), 1);
        assert!(storage.get(&root).is_some());
        assert!(!storage.get(&root).unwrap().has_children());
    }
}
