use canopy_shared::models::TreeFeature;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const TREES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("trees");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID_KEY: &str = "next_id";

pub struct Storage {
    db: Database,
}

impl Storage {
    pub fn open(path: &Path) -> Arc<Self> {
        let db = Database::create(path)
            .unwrap_or_else(|e| panic!("Failed to open database at {}: {}", path.display(), e));

        // Ensure tables exist
        let write_txn = db.begin_write().expect("Failed to begin write txn");
        {
            let _ = write_txn.open_table(TREES_TABLE);
            let _ = write_txn.open_table(META_TABLE);
        }
        write_txn.commit().expect("Failed to commit initial txn");

        Arc::new(Storage { db })
    }

    /// Allocate the next stable tree id.
    pub fn next_id(&self) -> Result<u64, String> {
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let id = {
            let mut table = write_txn.open_table(META_TABLE).map_err(|e| e.to_string())?;
            let current = table
                .get(NEXT_ID_KEY)
                .map_err(|e| e.to_string())?
                .map(|v| v.value())
                .unwrap_or(1);
            table
                .insert(NEXT_ID_KEY, current + 1)
                .map_err(|e| e.to_string())?;
            current
        };
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn save_tree(&self, tree: &TreeFeature) -> Result<(), String> {
        let json = serde_json::to_vec(tree).map_err(|e| e.to_string())?;

        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        {
            let mut table = write_txn
                .open_table(TREES_TABLE)
                .map_err(|e| e.to_string())?;
            table
                .insert(tree.id, json.as_slice())
                .map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn get_tree(&self, id: u64) -> Result<Option<TreeFeature>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn
            .open_table(TREES_TABLE)
            .map_err(|e| e.to_string())?;

        match table.get(id).map_err(|e| e.to_string())? {
            Some(value) => {
                let tree: TreeFeature =
                    serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
                Ok(Some(tree))
            }
            None => Ok(None),
        }
    }

    /// All trees in id order; soft-removed records are filtered out unless
    /// `include_removed` is set.
    pub fn list_trees(&self, include_removed: bool) -> Result<Vec<TreeFeature>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn
            .open_table(TREES_TABLE)
            .map_err(|e| e.to_string())?;

        let mut trees = Vec::new();
        for entry in table.iter().map_err(|e| e.to_string())? {
            let (_, value) = entry.map_err(|e| e.to_string())?;
            let tree: TreeFeature =
                serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
            if tree.active || include_removed {
                trees.push(tree);
            }
        }
        Ok(trees)
    }

    /// Soft delete: flips the active flag and records who removed it.
    /// Returns the updated record, or None when the id is unknown.
    pub fn soft_remove(
        &self,
        id: u64,
        removed_by: &str,
        removed_at: &str,
    ) -> Result<Option<TreeFeature>, String> {
        let Some(mut tree) = self.get_tree(id)? else {
            return Ok(None);
        };
        tree.active = false;
        tree.removed_by = Some(removed_by.to_string());
        tree.removed_at = Some(removed_at.to_string());
        self.save_tree(&tree)?;
        Ok(Some(tree))
    }

    pub fn count_trees(&self) -> Result<u64, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn
            .open_table(TREES_TABLE)
            .map_err(|e| e.to_string())?;
        table.len().map_err(|e| e.to_string())
    }
}
