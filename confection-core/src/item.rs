use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Store-assigned identifier of an item.
///
/// `ItemId::UNSET` (zero) marks an item that has not been persisted yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    pub const UNSET: ItemId = ItemId(0);

    pub const fn new(raw: u64) -> Self {
        ItemId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Availability of an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Available,
    OnOrder,
    OutOfStock,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Available, Status::OnOrder, Status::OutOfStock];

    /// Stable machine label, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::OnOrder => "on_order",
            Status::OutOfStock => "out_of_stock",
        }
    }

    /// Label shown to people.
    pub fn label(self) -> &'static str {
        match self {
            Status::Available => "Available",
            Status::OnOrder => "On order",
            Status::OutOfStock => "Out of stock",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Status::ALL
            .into_iter()
            .find(|status| {
                wanted.eq_ignore_ascii_case(status.as_str()) || wanted.eq_ignore_ascii_case(status.label())
            })
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

/// A catalog entry.
///
/// Every constructor and setter validates before committing, so an `Item`
/// value always satisfies the field invariants. A failed setter leaves the
/// previous value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    id: ItemId,
    name: String,
    category: String,
    price: f64,
    weight: i64,
    description: Option<String>,
    status: Status,
}

impl Item {
    /// Creates an unpersisted item with status `Available` and no description.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: f64,
        weight: i64,
    ) -> Result<Self, ValidationError> {
        let name = checked_name(name.into())?;
        let category = checked_category(category.into())?;
        Ok(Item {
            id: ItemId::UNSET,
            name,
            category,
            price: checked_price(price)?,
            weight: checked_weight(weight)?,
            description: None,
            status: Status::default(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Binds the item to a store identifier.
    ///
    /// Stores call this on insert; callers use it to target an existing
    /// record before an update.
    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = checked_name(name.into())?;
        Ok(())
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> Result<(), ValidationError> {
        self.category = checked_category(category.into())?;
        Ok(())
    }

    pub fn set_price(&mut self, price: f64) -> Result<(), ValidationError> {
        self.price = checked_price(price)?;
        Ok(())
    }

    pub fn set_weight(&mut self, weight: i64) -> Result<(), ValidationError> {
        self.weight = checked_weight(weight)?;
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Sets the status from a free-text label, e.g. a picker value.
    pub fn set_status_label(&mut self, label: &str) -> Result<(), ValidationError> {
        self.status = label.parse()?;
        Ok(())
    }
}

fn checked_name(name: String) -> Result<String, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name)
}

fn checked_category(category: String) -> Result<String, ValidationError> {
    if category.trim().is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    Ok(category)
}

fn checked_price(price: f64) -> Result<f64, ValidationError> {
    // NaN fails the comparison as well
    if !(price.is_finite() && price > 0.0) {
        return Err(ValidationError::NonPositivePrice(price));
    }
    Ok(price)
}

fn checked_weight(weight: i64) -> Result<i64, ValidationError> {
    if weight <= 0 {
        return Err(ValidationError::NonPositiveWeight(weight));
    }
    Ok(weight)
}

/// Unvalidated field set submitted by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub weight: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ItemDraft {
    /// Turns the draft into an unpersisted item, or reports the first
    /// violated invariant.
    pub fn validate(self) -> Result<Item, ValidationError> {
        let mut item = Item::new(self.name, self.category, self.price, self.weight)?;
        if let Some(label) = self.status.as_deref() {
            item.set_status_label(label)?;
        }
        item.set_description(self.description);
        Ok(item)
    }
}

impl From<&Item> for ItemDraft {
    fn from(item: &Item) -> Self {
        ItemDraft {
            name: item.name.clone(),
            category: item.category.clone(),
            price: item.price,
            weight: item.weight,
            description: item.description.clone(),
            status: Some(item.status.as_str().to_string()),
        }
    }
}

/// Persisted shape of an item. Decoding goes back through validation.
#[derive(Serialize, Deserialize)]
struct ItemRecord {
    id: ItemId,
    name: String,
    category: String,
    price: f64,
    weight: i64,
    description: Option<String>,
    status: Status,
}

impl TryFrom<ItemRecord> for Item {
    type Error = ValidationError;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let mut item = Item::new(record.name, record.category, record.price, record.weight)?
            .with_id(record.id)
            .with_status(record.status);
        item.set_description(record.description);
        Ok(item)
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        ItemRecord {
            id: item.id,
            name: item.name,
            category: item.category,
            price: item.price,
            weight: item.weight,
            description: item.description,
            status: item.status,
        }
    }
}
