//! Result types for query responses.

use serde::{Deserialize, Serialize};

use crate::query::SelectItem;
use crate::value::Value;

/// An untyped entity row: identity plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Entity identity.
    pub id: i64,
    /// Field values in catalog order, including `id`.
    pub fields: Vec<(String, Value)>,
}

impl EntityRow {
    /// Create a row with an `id` field.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: vec![("id".to_string(), Value::Int64(id))],
        }
    }

    /// Add or replace a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// One projected item of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Projected {
    /// A scalar or aggregate value.
    Value(Value),
    /// A whole entity.
    Entity(EntityRow),
}

impl Projected {
    /// The scalar value, if this is not an entity.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Projected::Value(v) => Some(v),
            Projected::Entity(_) => None,
        }
    }

    /// The entity row, if this is an entity.
    pub fn as_entity(&self) -> Option<&EntityRow> {
        match self {
            Projected::Entity(e) => Some(e),
            Projected::Value(_) => None,
        }
    }
}

/// A heterogeneous result row, addressable by the items used to select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    items: Vec<SelectItem>,
    values: Vec<Projected>,
}

impl Tuple {
    /// Create a tuple; `items` and `values` are parallel.
    pub fn new(items: Vec<SelectItem>, values: Vec<Projected>) -> Self {
        debug_assert_eq!(items.len(), values.len());
        Self { items, values }
    }

    /// Look up the value projected for `item`.
    pub fn get(&self, item: impl Into<SelectItem>) -> Option<&Value> {
        let item = item.into();
        self.position(&item)
            .and_then(|i| self.values.get(i))
            .and_then(Projected::as_value)
    }

    /// Look up the entity projected for `alias`.
    pub fn get_entity(&self, alias: &str) -> Option<&EntityRow> {
        self.position(&SelectItem::Entity(alias.to_string()))
            .and_then(|i| self.values.get(i))
            .and_then(Projected::as_entity)
    }

    /// Projected item at `index`.
    pub fn at(&self, index: usize) -> Option<&Projected> {
        self.values.get(index)
    }

    fn position(&self, item: &SelectItem) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// Items this tuple was selected with.
    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    /// Projected values, in selection order.
    pub fn values(&self) -> &[Projected] {
        &self.values
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the tuple has no items.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A bounded slice of results plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage<T> {
    /// Number of rows (or groups) before offset and limit.
    pub total: u64,
    /// Limit that produced this page.
    pub limit: Option<u64>,
    /// Offset that produced this page.
    pub offset: u64,
    /// Page contents, in result order.
    pub results: Vec<T>,
}

impl<T> ResultPage<T> {
    /// Create a page.
    pub fn new(total: u64, limit: Option<u64>, offset: u64, results: Vec<T>) -> Self {
        Self {
            total,
            limit,
            offset,
            results,
        }
    }

    /// Number of results on this page.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether this page is empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether rows remain after this page.
    pub fn has_more(&self) -> bool {
        self.offset + (self.results.len() as u64) < self.total
    }

    /// Convert every result, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ResultPage<U> {
        ResultPage {
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    /// Fallible version of [`ResultPage::map`].
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ResultPage<U>, E> {
        Ok(ResultPage {
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            results: self.results.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}
