//! x2many write commands.
//!
//! Odoo writes one2many/many2many fields as a list of command triples,
//! e.g. `[[6, 0, [1, 2]], [0, 0, {"name": "Bin A"}]]`.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum X2ManyCommand {
    /// `[0, 0, values]`: create a related record and link it.
    Create(Map<String, Value>),
    /// `[1, id, values]`: update a linked record.
    Update(i64, Map<String, Value>),
    /// `[2, id, 0]`: unlink and delete.
    Delete(i64),
    /// `[3, id, 0]`: unlink only.
    Unlink(i64),
    /// `[4, id, 0]`: link an existing record.
    Link(i64),
    /// `[5, 0, 0]`: unlink everything.
    Clear,
    /// `[6, 0, ids]`: replace the whole set.
    Replace(Vec<i64>),
}

impl X2ManyCommand {
    /// Numeric opcode (first element of the triple).
    pub fn code(&self) -> u8 {
        match self {
            X2ManyCommand::Create(_) => 0,
            X2ManyCommand::Update(..) => 1,
            X2ManyCommand::Delete(_) => 2,
            X2ManyCommand::Unlink(_) => 3,
            X2ManyCommand::Link(_) => 4,
            X2ManyCommand::Clear => 5,
            X2ManyCommand::Replace(_) => 6,
        }
    }

    /// Second and third elements of the triple.
    fn operands(&self) -> (i64, Value) {
        match self {
            X2ManyCommand::Create(values) => (0, Value::Object(values.clone())),
            X2ManyCommand::Update(id, values) => (*id, Value::Object(values.clone())),
            X2ManyCommand::Delete(id) | X2ManyCommand::Unlink(id) | X2ManyCommand::Link(id) => {
                (*id, Value::from(0))
            }
            X2ManyCommand::Clear => (0, Value::from(0)),
            X2ManyCommand::Replace(ids) => (0, Value::from(ids.clone())),
        }
    }

    pub fn to_value(&self) -> Value {
        let (id, third) = self.operands();
        Value::Array(vec![Value::from(self.code()), Value::from(id), third])
    }

    /// Parse a command triple. Returns `None` for anything malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 3 {
            return None;
        }
        let code = items[0].as_u64()?;
        let id = items[1].as_i64()?;
        let third = &items[2];
        let cmd = match code {
            0 => X2ManyCommand::Create(third.as_object()?.clone()),
            1 => X2ManyCommand::Update(id, third.as_object()?.clone()),
            2 => X2ManyCommand::Delete(id),
            3 => X2ManyCommand::Unlink(id),
            4 => X2ManyCommand::Link(id),
            5 => X2ManyCommand::Clear,
            6 => X2ManyCommand::Replace(
                third
                    .as_array()?
                    .iter()
                    .map(Value::as_i64)
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        };
        Some(cmd)
    }

    /// Encode a command list as a field value.
    pub fn list_value(commands: &[X2ManyCommand]) -> Value {
        Value::Array(commands.iter().map(X2ManyCommand::to_value).collect())
    }
}

impl Serialize for X2ManyCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (id, third) = self.operands();
        (self.code(), id, third).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for X2ManyCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        X2ManyCommand::from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid x2many command: {value}")))
    }
}
