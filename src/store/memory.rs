use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    assign_id, document_id, round_total, CategoryStat, Collection, DeleteResult, Document,
    DocumentStore, Filter, InsertOneResult, StoreError, UpdateResult,
};

/// Хранилище в памяти процесса. Порядок документов - порядок вставки.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_locked(
        collections: &mut HashMap<Collection, Vec<Document>>,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, StoreError> {
        let id = assign_id(&mut doc)?;
        let docs = collections.entry(collection).or_default();
        if docs.iter().any(|existing| document_id(existing) == Some(id.as_str())) {
            return Err(StoreError::InvalidDocument(format!(
                "duplicate _id {} in {}",
                id,
                collection.table()
            )));
        }
        docs.push(doc);
        Ok(InsertOneResult { acknowledged: true, inserted_id: id })
    }

    fn delete_many_locked(
        collections: &mut HashMap<Collection, Vec<Document>>,
        collection: Collection,
        filter: &Filter,
    ) -> DeleteResult {
        let Some(docs) = collections.get_mut(&collection) else {
            return DeleteResult::new(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        DeleteResult::new((before - docs.len()) as u64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<InsertOneResult, StoreError> {
        let mut collections = self.collections.write().await;
        Self::insert_locked(&mut collections, collection, doc)
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, set: Document) -> Result<UpdateResult, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|doc| filter.matches(doc)));

        let Some(doc) = target else {
            return Ok(UpdateResult::new(0, 0));
        };

        let mut modified = false;
        for (field, value) in set {
            if doc.get(&field) != Some(&value) {
                doc.insert(field, value);
                modified = true;
            }
        }
        Ok(UpdateResult::new(1, u64::from(modified)))
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(DeleteResult::new(0));
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(Self::delete_many_locked(&mut collections, collection, filter))
    }

    async fn estimated_count(&self, collection: Collection) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn insert_and_delete_many(
        &self,
        insert_into: Collection,
        doc: Document,
        delete_from: Collection,
        filter: &Filter,
    ) -> Result<(InsertOneResult, DeleteResult), StoreError> {
        // Одна блокировка на оба шага: вставка не видна без удаления.
        let mut collections = self.collections.write().await;
        let inserted = Self::insert_locked(&mut collections, insert_into, doc)?;
        let deleted = Self::delete_many_locked(&mut collections, delete_from, filter);
        Ok((inserted, deleted))
    }

    async fn order_states(&self) -> Result<Vec<CategoryStat>, StoreError> {
        let collections = self.collections.read().await;
        let menu = collections.get(&Collection::Menu).map(Vec::as_slice).unwrap_or_default();
        let payments = collections.get(&Collection::Payments).map(Vec::as_slice).unwrap_or_default();

        let menu_by_id: HashMap<&str, &Document> = menu
            .iter()
            .filter_map(|item| document_id(item).map(|id| (id, item)))
            .collect();

        let mut groups: BTreeMap<Option<String>, (u64, f64)> = BTreeMap::new();
        for payment in payments {
            let Some(Value::Array(items)) = payment.get("menuItems") else {
                continue;
            };
            for item_id in items {
                let key = match item_id {
                    Value::String(id) => id.clone(),
                    other => other.to_string(),
                };
                let Some(item) = menu_by_id.get(key.as_str()) else {
                    continue;
                };
                let category = item.get("category").and_then(Value::as_str).map(str::to_string);
                let price = item.get("price").and_then(Value::as_f64).unwrap_or(0.0);
                let entry = groups.entry(category).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += price;
            }
        }

        debug!("order_states: {} categories", groups.len());

        Ok(groups
            .into_iter()
            .map(|(category, (count, total))| CategoryStat {
                category,
                count,
                total: round_total(total),
            })
            .collect())
    }
}
