//! store
//!
//! Документное хранилище: пять коллекций (users, menu, reviews, carts, payments)
//! с единым контрактом find / insert / update / delete.
//!
//! Документ - это произвольный JSON-объект. Идентификатор хранится в поле `_id`
//! строкой (UUID v4 генерируется при вставке, если клиент его не прислал).
//!
//! Реализации:
//! - [`crate::database::PgStore`] - PostgreSQL, по таблице JSONB на коллекцию.
//! - [`memory::MemoryStore`] - в памяти процесса, для локальной разработки и тестов.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;

/// Поле с идентификатором документа.
pub const ID_FIELD: &str = "_id";

/// Документ коллекции.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Menu,
    Reviews,
    Carts,
    Payments,
}

impl Collection {
    /// Имя таблицы в PostgreSQL.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Menu => "menu",
            Collection::Reviews => "reviews",
            Collection::Carts => "carts",
            Collection::Payments => "payments",
        }
    }
}

/// Условие выборки документов.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Все документы коллекции.
    All,
    /// Поле верхнего уровня равно значению.
    Eq(String, Value),
    /// `_id` входит в список.
    IdIn(Vec<String>),
}

impl Filter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Filter::Eq(ID_FIELD.to_string(), Value::String(id.into()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::IdIn(ids) => document_id(doc)
                .map(|id| ids.iter().any(|candidate| candidate == id))
                .unwrap_or(false),
        }
    }
}

/// Возвращает `_id` документа, если он строковый.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Проставляет `_id`, если его нет. Нестроковый `_id` считается ошибкой.
pub fn assign_id(doc: &mut Document) -> Result<String, StoreError> {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = uuid::Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(StoreError::InvalidDocument(format!(
            "_id must be a string, got {}",
            other
        ))),
    }
}

// --- Результаты операций (форма как у драйвера документной БД) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
    pub upserted_count: u64,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_id: None,
            upserted_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self { acknowledged: true, deleted_count }
    }
}

/// Строка отчета `/order-states`: заказы по категории меню.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: Option<String>,
    pub count: u64,
    pub total: f64,
}

/// Округление суммы по категории до центов.
pub fn round_total(total: f64) -> f64 {
    (total * 100.0).round() / 100.0
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Контракт документного хранилища.
///
/// Все методы асинхронные и не держат состояние между запросами:
/// каждый обработчик получает хранилище через `AppState`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Документы по фильтру в порядке хранения.
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Всегда создает новый документ, схема не проверяется.
    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<InsertOneResult, StoreError>;

    /// Сливает поля `set` в первый подходящий документ.
    /// Если документ не найден, возвращает `matchedCount: 0`, а не ошибку.
    async fn update_one(&self, collection: Collection, filter: &Filter, set: Document) -> Result<UpdateResult, StoreError>;

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<DeleteResult, StoreError>;

    /// Приблизительное число документов (может отставать от точного).
    async fn estimated_count(&self, collection: Collection) -> Result<u64, StoreError>;

    /// Вставка в одну коллекцию и удаление из другой одной транзакцией.
    /// Либо применяются оба шага, либо ни одного.
    async fn insert_and_delete_many(
        &self,
        insert_into: Collection,
        doc: Document,
        delete_from: Collection,
        filter: &Filter,
    ) -> Result<(InsertOneResult, DeleteResult), StoreError>;

    /// Соединяет `payments.menuItems` с `menu._id` и группирует по категории.
    /// Каждое вхождение позиции в платеж считается отдельно.
    async fn order_states(&self) -> Result<Vec<CategoryStat>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn filter_eq_matches_top_level_field() {
        let d = doc(json!({"_id": "a", "email": "x@y.z"}));
        assert!(Filter::eq("email", "x@y.z").matches(&d));
        assert!(!Filter::eq("email", "other@y.z").matches(&d));
        assert!(!Filter::eq("missing", "x").matches(&d));
    }

    #[test]
    fn filter_id_in_requires_string_id() {
        let d = doc(json!({"_id": "a"}));
        let numeric = doc(json!({"_id": 1}));
        let filter = Filter::IdIn(vec!["a".into(), "b".into()]);
        assert!(filter.matches(&d));
        assert!(!filter.matches(&numeric));
        assert!(!Filter::IdIn(vec![]).matches(&d));
    }

    #[test]
    fn assign_id_keeps_client_id_and_generates_missing() {
        let mut with_id = doc(json!({"_id": "given"}));
        assert_eq!(assign_id(&mut with_id).unwrap(), "given");

        let mut without = doc(json!({"name": "Soup"}));
        let id = assign_id(&mut without).unwrap();
        assert_eq!(document_id(&without), Some(id.as_str()));
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let mut bad = doc(json!({"_id": {"oid": 1}}));
        assert!(matches!(assign_id(&mut bad), Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn result_shapes_use_driver_field_names() {
        let insert = serde_json::to_value(InsertOneResult {
            acknowledged: true,
            inserted_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(insert, json!({"acknowledged": true, "insertedId": "abc"}));

        let update = serde_json::to_value(UpdateResult::new(0, 0)).unwrap();
        assert_eq!(update["matchedCount"], 0);
        assert_eq!(update["upsertedId"], Value::Null);

        let delete = serde_json::to_value(DeleteResult::new(3)).unwrap();
        assert_eq!(delete, json!({"acknowledged": true, "deletedCount": 3}));
    }

    #[test]
    fn round_total_keeps_two_decimals() {
        assert_eq!(round_total(22.0), 22.0);
        assert_eq!(round_total(0.1 + 0.2), 0.3);
        assert_eq!(round_total(10.005_1), 10.01);
    }
}
