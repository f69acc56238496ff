//! Runtime values and records.
//!
//! Records are laid out positionally per their model's property list; the
//! code generator resolves property names to indices once, at compile time.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// The "unset" value every property starts with.
    #[default]
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    /// Days since the Unix epoch.
    Date(i32),
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int(_) => Some(DataType::Int),
            Value::Long(_) => Some(DataType::Long),
            Value::Float(_) => Some(DataType::Float),
            Value::Double(_) => Some(DataType::Double),
            Value::Text(_) => Some(DataType::Text),
            Value::Date(_) => Some(DataType::Date),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i as i64),
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert a numeric value into its SUM accumulator type.
    pub fn widen(&self) -> Value {
        match self {
            Value::Int(i) => Value::Long(*i as i64),
            Value::Float(f) => Value::Double(*f as f64),
            other => other.clone(),
        }
    }

    /// Sum of two accumulators; unset on either side yields the other side.
    pub fn add(&self, other: &Value) -> Option<Value> {
        use Value::*;
        match (self, other) {
            (Null, v) | (v, Null) => Some(v.clone()),
            (Long(a), Long(b)) => Some(Long(a.wrapping_add(*b))),
            (Double(a), Double(b)) => Some(Double(a + b)),
            (Int(a), Int(b)) => Some(Long(*a as i64 + *b as i64)),
            (Float(a), Float(b)) => Some(Double(*a as f64 + *b as f64)),
            _ => None,
        }
    }

    /// Total order used by MAX/MIN and by sorting. Unset sorts first.
    pub fn compare(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Boolean(x), Boolean(y)) => x.cmp(y),
            (Int(x), Int(y)) => x.cmp(y),
            (Long(x), Long(y)) => x.cmp(y),
            (Float(x), Float(y)) => float_cmp(*x as f64, *y as f64),
            (Double(x), Double(y)) => float_cmp(*x, *y),
            (Text(x), Text(y)) => x.cmp(y),
            (Date(x), Date(y)) => x.cmp(y),
            // Mixed types: order by variant order
            _ => self.type_order().cmp(&other.type_order()),
        }
    }

    /// Numeric order of variants for mixed-type comparisons and hashing.
    pub fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) => 2,
            Value::Long(_) => 3,
            Value::Float(_) => 4,
            Value::Double(_) => 5,
            Value::Text(_) => 6,
            Value::Date(_) => 7,
        }
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(i) => write!(f, "{}L", i),
            Value::Float(x) => write!(f, "{}f", x),
            Value::Double(x) => write!(f, "{}d", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Date(d) => write!(f, "date({})", d),
        }
    }
}

/// One data-model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub model: String,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(model: &str, width: usize) -> Self {
        Self {
            model: model.to_string(),
            values: vec![Value::Null; width],
        }
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if index >= self.values.len() {
            self.values.resize(index + 1, Value::Null);
        }
        self.values[index] = value;
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Reset every property to unset, keeping the model.
    pub fn reset(&mut self) {
        for v in &mut self.values {
            *v = Value::Null;
        }
    }
}
