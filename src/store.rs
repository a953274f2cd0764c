//! The real-time tree store the auction state lives in.
//!
//! A key-addressed JSON tree with the contract the rest of the crate builds
//! on: last-write-wins single writes, atomic multi-path updates, push-generated
//! unique keys, and a broadcast of changed paths for subscribers. The bridge
//! is its only auction-tree client.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

/// Notification that a write touched the given absolute paths. All paths of
/// one multi-path update arrive in a single event.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub paths: Vec<String>,
}

pub struct Rtdb {
    tree: RwLock<Value>,
    events: broadcast::Sender<StoreEvent>,
}

impl Rtdb {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Rtdb {
            tree: RwLock::new(Value::Object(Map::new())),
            events: tx,
        }
    }

    /// A unique, lexicographically sortable generated key.
    pub fn push_id(&self) -> String {
        ulid::Ulid::new().to_string()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Read the subtree at `path`. Returns `None` for missing paths.
    pub async fn get(&self, path: &str) -> Option<Value> {
        let tree = self.tree.read().await;
        read_at(&tree, &segments(path)).cloned()
    }

    /// Replace the subtree at `path`, creating intermediate nodes as needed.
    pub async fn set(&self, path: &str, value: Value) {
        self.update([(path.to_string(), Some(value))].into_iter().collect())
            .await;
    }

    /// Delete the subtree at `path`. Deleting a missing path is a no-op.
    pub async fn remove(&self, path: &str) {
        self.update([(path.to_string(), None)].into_iter().collect())
            .await;
    }

    /// Apply a multi-path update as one indivisible write: every entry is a
    /// subtree replacement, `None` deletes. Subscribers observe all paths in
    /// a single event.
    pub async fn update(&self, changes: BTreeMap<String, Option<Value>>) {
        if changes.is_empty() {
            return;
        }

        let paths: Vec<String> = changes.keys().cloned().collect();
        {
            let mut tree = self.tree.write().await;
            for (path, value) in changes {
                let segs = segments(&path);
                match value {
                    Some(v) => write_at(&mut tree, &segs, v),
                    None => delete_at(&mut tree, &segs),
                }
            }
        }
        // No receivers is fine
        let _ = self.events.send(StoreEvent { paths });
    }
}

impl Default for Rtdb {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Whether a write at `a` is visible from a subscription rooted at `b` (or
/// vice versa): true when either path is a segment-wise prefix of the other.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let a = segments(a);
    let b = segments(b);
    let shared = a.len().min(b.len());
    a[..shared] == b[..shared]
}

fn read_at<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segs {
        node = node.as_object()?.get(*seg)?;
    }
    Some(node)
}

fn write_at(root: &mut Value, segs: &[&str], value: Value) {
    if segs.is_empty() {
        *root = value;
        return;
    }
    let mut node = root;
    for seg in &segs[..segs.len() - 1] {
        // A write through a scalar replaces it with an object
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .unwrap()
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .unwrap()
        .insert(segs[segs.len() - 1].to_string(), value);
}

fn delete_at(root: &mut Value, segs: &[&str]) {
    if segs.is_empty() {
        *root = Value::Object(Map::new());
        return;
    }
    let mut node = root;
    for seg in &segs[..segs.len() - 1] {
        match node.as_object_mut().and_then(|m| m.get_mut(*seg)) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(segs[segs.len() - 1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_and_get_nested_paths() {
        let db = Rtdb::new();
        db.set("/aste/a1/nome", json!("LegaTest")).await;

        assert_eq!(db.get("/aste/a1/nome").await, Some(json!("LegaTest")));
        assert_eq!(
            db.get("/aste/a1").await,
            Some(json!({ "nome": "LegaTest" }))
        );
        assert_eq!(db.get("/aste/missing").await, None);
    }

    #[tokio::test]
    async fn set_replaces_whole_subtree() {
        let db = Rtdb::new();
        db.set("/aste/a1", json!({ "nome": "Prima", "teams": { "t1": {} } }))
            .await;
        db.set("/aste/a1", json!({ "nome": "Seconda" })).await;

        assert_eq!(db.get("/aste/a1").await, Some(json!({ "nome": "Seconda" })));
        assert_eq!(db.get("/aste/a1/teams").await, None);
    }

    #[tokio::test]
    async fn multi_path_update_applies_all_paths_at_once() {
        let db = Rtdb::new();
        db.set("/aste/a1", json!({ "partecipantiIscritti": 1, "teams": {} }))
            .await;

        let mut rx = db.subscribe();
        let changes: BTreeMap<String, Option<Value>> = [
            (
                "/aste/a1/teams/team_1".to_string(),
                Some(json!({ "nome": "TeamB" })),
            ),
            ("/aste/a1/partecipantiIscritti".to_string(), Some(json!(2))),
        ]
        .into_iter()
        .collect();
        db.update(changes).await;

        assert_eq!(db.get("/aste/a1/partecipantiIscritti").await, Some(json!(2)));
        assert_eq!(
            db.get("/aste/a1/teams/team_1/nome").await,
            Some(json!("TeamB"))
        );

        // Both paths arrive in one event
        let event = rx.recv().await.unwrap();
        assert_eq!(event.paths.len(), 2);
    }

    #[tokio::test]
    async fn none_deletes_subtree() {
        let db = Rtdb::new();
        db.set(
            "/aste/a1/teams/t1",
            json!({ "nome": "TeamA", "calciatori": { "calc_1": { "id": 1 } } }),
        )
        .await;

        let changes: BTreeMap<String, Option<Value>> =
            [("/aste/a1/teams/t1/calciatori/calc_1".to_string(), None)]
                .into_iter()
                .collect();
        db.update(changes).await;

        assert_eq!(db.get("/aste/a1/teams/t1/calciatori/calc_1").await, None);
        assert_eq!(
            db.get("/aste/a1/teams/t1/nome").await,
            Some(json!("TeamA"))
        );
    }

    #[tokio::test]
    async fn remove_missing_path_is_noop() {
        let db = Rtdb::new();
        db.set("/aste/a1/nome", json!("LegaTest")).await;
        db.remove("/aste/a2").await;
        assert_eq!(db.get("/aste/a1/nome").await, Some(json!("LegaTest")));
    }

    #[test]
    fn path_overlap_respects_segment_boundaries() {
        assert!(paths_overlap("/aste/a1", "/aste/a1/teams/t1"));
        assert!(paths_overlap("/aste/a1/teams/t1", "/aste/a1"));
        assert!(paths_overlap("/aste", "/aste/a1"));
        // "a1" is not a prefix of "a10"
        assert!(!paths_overlap("/aste/a1", "/aste/a10/teams"));
        assert!(!paths_overlap("/aste/a1", "/calciatori"));
    }

    #[test]
    fn push_ids_are_unique() {
        let db = Rtdb::new();
        let a = db.push_id();
        let b = db.push_id();
        assert_ne!(a, b);
    }
}
