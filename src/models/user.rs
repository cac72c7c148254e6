use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{document_id, Collection, Document, DocumentStore, Filter, StoreError};

/// Роль, открывающая админские маршруты.
pub const ADMIN_ROLE: &str = "admin";

/// Типизированный взгляд на документ из коллекции `users`.
/// Остальные поля документа хранятся как есть и здесь не нужны.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl User {
    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| doc.get(field).and_then(Value::as_str).map(str::to_string);
        User {
            id: document_id(doc).map(str::to_string),
            email: text("email"),
            role: text("role"),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    // Найти пользователя по email
    pub async fn find_by_email(
        email: &str,
        store: &dyn DocumentStore,
    ) -> Result<Option<User>, StoreError> {
        let doc = store
            .find_one(Collection::Users, &Filter::eq("email", email))
            .await?;
        Ok(doc.as_ref().map(User::from_document))
    }

    /// Есть ли у владельца email роль admin. Нет записи - нет роли.
    pub async fn is_admin_email(email: &str, store: &dyn DocumentStore) -> Result<bool, StoreError> {
        Ok(Self::find_by_email(email, store)
            .await?
            .map(|user| user.is_admin())
            .unwrap_or(false))
    }
}
