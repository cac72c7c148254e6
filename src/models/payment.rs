use serde_json::Value;

use crate::store::{Document, Filter};

/// Поле платежа со списком оплаченных позиций корзины.
pub const CART_ITEM_IDS_FIELD: &str = "cartItemId";

/// Платеж, присланный клиентом после успешной оплаты.
///
/// Документ сохраняется как есть; из него нужен только список `cartItemId`,
/// чтобы убрать оплаченные позиции из корзины.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub document: Document,
    pub cart_item_ids: Vec<String>,
}

impl Checkout {
    /// `None`, если `cartItemId` отсутствует или это не массив строк.
    pub fn from_document(document: Document) -> Option<Self> {
        let ids = match document.get(CART_ITEM_IDS_FIELD) {
            Some(Value::Array(ids)) => ids
                .iter()
                .map(|id| id.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?,
            _ => return None,
        };
        Some(Checkout { document, cart_item_ids: ids })
    }

    /// Фильтр позиций корзины, закрытых этим платежом.
    pub fn cart_filter(&self) -> Filter {
        Filter::IdIn(self.cart_item_ids.clone())
    }
}

/// Сумма поля `price` по всем платежам. Нечисловые цены пропускаются.
pub fn revenue(payments: &[Document]) -> f64 {
    payments
        .iter()
        .filter_map(|payment| payment.get("price").and_then(Value::as_f64))
        .sum()
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
    fn checkout_requires_list_of_string_ids() {
        let ok = Checkout::from_document(doc(json!({"price": 12.5, "cartItemId": ["a", "b"]}))).unwrap();
        assert_eq!(ok.cart_item_ids, vec!["a", "b"]);
        assert_eq!(ok.cart_filter(), Filter::IdIn(vec!["a".into(), "b".into()]));

        assert!(Checkout::from_document(doc(json!({"price": 1}))).is_none());
        assert!(Checkout::from_document(doc(json!({"cartItemId": "a"}))).is_none());
        assert!(Checkout::from_document(doc(json!({"cartItemId": ["a", 1]}))).is_none());
    }

    #[test]
    fn empty_id_list_is_a_valid_checkout() {
        let checkout = Checkout::from_document(doc(json!({"cartItemId": []}))).unwrap();
        assert!(checkout.cart_item_ids.is_empty());
    }

    #[test]
    fn revenue_sums_numeric_prices() {
        let payments = vec![
            doc(json!({"price": 10.5})),
            doc(json!({"price": 4})),
            doc(json!({"price": "n/a"})),
            doc(json!({})),
        ];
        assert_eq!(revenue(&payments), 14.5);
        assert_eq!(revenue(&[]), 0.0);
    }
}
