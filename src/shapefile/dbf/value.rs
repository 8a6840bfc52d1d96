use std::fmt;
use chrono::NaiveDate;

/// One decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum DbfValue {
    Null,
    Character(String),
    /// A Numeric ('N') field with decimals.
    Numeric(f64),
    /// A Numeric ('N') field without decimals.
    Integer(i64),
    /// A Float ('F') field.
    Float(f64),
    Logical(bool),
    Date(NaiveDate),
    /// Numeric text that would not parse, kept as written.
    Unparsed(String),
}

impl DbfValue {
    pub fn is_null(&self) -> bool {
        *self == DbfValue::Null
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DbfValue::Character(s) | DbfValue::Unparsed(s) => Some(s),
            _ => None,
        }
    }

    /// Any numeric variant as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DbfValue::Numeric(v) | DbfValue::Float(v) => Some(v),
            DbfValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            DbfValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            DbfValue::Logical(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match *self {
            DbfValue::Date(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for DbfValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DbfValue::Null => write!(f, "null"),
            DbfValue::Character(s) | DbfValue::Unparsed(s) => write!(f, "{}", s),
            DbfValue::Numeric(v) | DbfValue::Float(v) => write!(f, "{}", v),
            DbfValue::Integer(v) => write!(f, "{}", v),
            DbfValue::Logical(v) => write!(f, "{}", v),
            DbfValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for DbfValue {
    fn from(s: &str) -> DbfValue {
        DbfValue::Character(s.to_string())
    }
}

impl From<String> for DbfValue {
    fn from(s: String) -> DbfValue {
        DbfValue::Character(s)
    }
}

impl From<i64> for DbfValue {
    fn from(v: i64) -> DbfValue {
        DbfValue::Integer(v)
    }
}

impl From<f64> for DbfValue {
    fn from(v: f64) -> DbfValue {
        DbfValue::Numeric(v)
    }
}

impl From<bool> for DbfValue {
    fn from(v: bool) -> DbfValue {
        DbfValue::Logical(v)
    }
}

impl From<NaiveDate> for DbfValue {
    fn from(v: NaiveDate) -> DbfValue {
        DbfValue::Date(v)
    }
}

impl<T: Into<DbfValue>> From<Option<T>> for DbfValue {
    fn from(v: Option<T>) -> DbfValue {
        v.map(Into::into).unwrap_or(DbfValue::Null)
    }
}
