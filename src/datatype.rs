// used for decimal numbers
use bigdecimal::BigDecimal;

// used when parsing a label into a number
use std::str::FromStr;
// used to print out readable forms of a value
use std::fmt;
use std::ops;

use crate::error::{Result, invalid};

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";

/// The literal kinds a query constant may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    String,
    Boolean,
    Decimal,
    Double,
    Float,
    Integer,
    Int,
    Long,
    DateTime,
}

impl LiteralType {
    const ALL: [LiteralType; 9] = [
        LiteralType::String,
        LiteralType::Boolean,
        LiteralType::Decimal,
        LiteralType::Double,
        LiteralType::Float,
        LiteralType::Integer,
        LiteralType::Int,
        LiteralType::Long,
        LiteralType::DateTime,
    ];
    pub fn local_name(&self) -> &'static str {
        match self {
            LiteralType::String => "string",
            LiteralType::Boolean => "boolean",
            LiteralType::Decimal => "decimal",
            LiteralType::Double => "double",
            LiteralType::Float => "float",
            LiteralType::Integer => "integer",
            LiteralType::Int => "int",
            LiteralType::Long => "long",
            LiteralType::DateTime => "dateTime",
        }
    }
    pub fn iri(&self) -> String {
        format!("{}{}", XSD_NAMESPACE, self.local_name())
    }
    pub fn from_iri(iri: &str) -> Option<LiteralType> {
        let local = iri.strip_prefix(XSD_NAMESPACE)?;
        Self::ALL.iter().copied().find(|t| t.local_name() == local)
    }
}

/// An IRI, split the same way for every lookup: the namespace runs up to and
/// including the last `#`, or failing that the last `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    fn split_at(&self) -> usize {
        self.0
            .rfind('#')
            .or_else(|| self.0.rfind('/'))
            .map(|i| i + 1)
            .unwrap_or(0)
    }
    pub fn namespace(&self) -> &str {
        &self.0[..self.split_at()]
    }
    pub fn local_name(&self) -> &str {
        &self.0[self.split_at()..]
    }
}
impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    label: String,
    datatype: LiteralType,
}

impl Literal {
    pub fn new(label: impl Into<String>, datatype: LiteralType) -> Self {
        Self {
            label: label.into(),
            datatype,
        }
    }
    pub fn integer(value: i64) -> Self {
        Self::new(value.to_string(), LiteralType::Integer)
    }
    pub fn double(value: f64) -> Self {
        Self::new(value.to_string(), LiteralType::Double)
    }
    pub fn decimal(label: &str) -> Self {
        Self::new(label, LiteralType::Decimal)
    }
    pub fn string(label: &str) -> Self {
        Self::new(label, LiteralType::String)
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn datatype(&self) -> LiteralType {
        self.datatype
    }
    /// Reads the literal as a temporal duration. Only decimal, double, float
    /// and integer kinds are durations; the value is not range checked here.
    pub fn as_duration(&self) -> Result<f64> {
        let label = self.label.trim();
        let parsed = match self.datatype {
            LiteralType::Decimal => Decimal::from_str(label).map(|_| label.parse::<f64>().ok()),
            LiteralType::Double | LiteralType::Float => Some(label.parse::<f64>().ok()),
            LiteralType::Integer | LiteralType::Int => Some(label.parse::<i64>().ok().map(|i| i as f64)),
            other => {
                return invalid(format!(
                    "duration must be a decimal, double, float or integer literal, not {}",
                    other.local_name()
                ));
            }
        };
        match parsed.flatten() {
            Some(duration) => Ok(duration),
            None => invalid(format!(
                "'{}' is not a valid {} literal",
                self.label,
                self.datatype.local_name()
            )),
        }
    }
}
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"^^xsd:{}", self.label, self.datatype.local_name())
    }
}

/// A bound value: either a typed literal or an IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(Literal),
    Iri(Iri),
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Literal(literal) => write!(f, "{}", literal),
            Value::Iri(iri) => write!(f, "{}", iri),
        }
    }
}

#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s) {
            Ok(decimal) => Some(Decimal(decimal)),
            _ => None,
        }
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
