//! Conversion of projected rows into caller-facing result types.

use ormq_proto::{EntityRow, Projected, SelectItem, Tuple, Value};

use crate::error::{Error, Result};
use crate::model::{Entity, Member, Team};

/// A type a projected row can be converted into.
pub trait FromProjection: Sized {
    /// Convert one row. `items` and `values` are parallel.
    fn from_projection(items: &[SelectItem], values: Vec<Projected>) -> Result<Self>;
}

fn single(values: Vec<Projected>) -> Result<Projected> {
    let len = values.len();
    let mut iter = values.into_iter();
    match (iter.next(), iter.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(Error::InvalidPlan(format!(
            "expected a single projected item, found {}",
            len
        ))),
    }
}

fn single_entity(values: Vec<Projected>) -> Result<EntityRow> {
    match single(values)? {
        Projected::Entity(row) => Ok(row),
        Projected::Value(v) => Err(Error::InvalidPlan(format!(
            "expected an entity, found {} value",
            v.type_name()
        ))),
    }
}

impl FromProjection for Value {
    fn from_projection(_items: &[SelectItem], values: Vec<Projected>) -> Result<Self> {
        match single(values)? {
            Projected::Value(v) => Ok(v),
            Projected::Entity(_) => Err(Error::InvalidPlan(
                "expected a value, found an entity".to_string(),
            )),
        }
    }
}

impl FromProjection for EntityRow {
    fn from_projection(_items: &[SelectItem], values: Vec<Projected>) -> Result<Self> {
        single_entity(values)
    }
}

impl FromProjection for Tuple {
    fn from_projection(items: &[SelectItem], values: Vec<Projected>) -> Result<Self> {
        if items.len() != values.len() {
            return Err(Error::InvalidPlan(format!(
                "{} projected values for {} items",
                values.len(),
                items.len()
            )));
        }
        Ok(Tuple::new(items.to_vec(), values))
    }
}

impl FromProjection for Member {
    fn from_projection(_items: &[SelectItem], values: Vec<Projected>) -> Result<Self> {
        Member::from_row(&single_entity(values)?)
    }
}

impl FromProjection for Team {
    fn from_projection(_items: &[SelectItem], values: Vec<Projected>) -> Result<Self> {
        Team::from_row(&single_entity(values)?)
    }
}
