//! Predicate and aggregate trees produced by the query compiler.
//!
//! RULE: queries are data, never code. The compiler builds these trees,
//! the store renders the filter part into bound SQL parameters, and the
//! evaluator below interprets the rest against rows in memory.

use crate::types::Seat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Every column a predicate may reference.
/// Match rows and summary rows each expose the subset they carry;
/// on summary rows `Rating` reads the stored bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    // ── Match columns ──────────────────────────────
    MatchId,
    PlayerId(Seat),
    Civ(Seat),
    Flag { seat: Seat, bit: u8 },
    Victory(Seat),

    // ── Shared grouping columns ────────────────────
    MapId,
    LadderId,
    Patch,
    Rating,

    // ── Summary columns ────────────────────────────
    Civilization,
    Opening,
    /// Lower index of a stored matchup pair.
    Opening1,
    /// Higher index of a stored matchup pair.
    Opening2,
    Tech,
    Victories,
    Losses,
    Opening1Victories,
    Opening1Losses,
    Opening2Victories,
    Opening2Losses,
    ResearchCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(b) => Some(i64::from(*b)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    Field(Field),
}

/// Boolean expression over a single row.
/// `And([])` is true and `Or([])` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Equals { field: Field, value: Value },
    In { field: Field, values: Vec<Value> },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare { field: Field, op: CompareOp, rhs: Operand },
}

/// Anything a predicate can be evaluated against.
/// Returns `None` for columns the row does not carry; comparisons
/// against a missing column are false.
pub trait Row {
    fn get(&self, field: Field) -> Option<Value>;
}

impl Predicate {
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn equals(field: Field, value: impl Into<Value>) -> Self {
        Predicate::Equals { field, value: value.into() }
    }

    pub fn compare(field: Field, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare { field, op, rhs: Operand::Value(value.into()) }
    }

    pub fn compare_fields(field: Field, op: CompareOp, other: Field) -> Self {
        Predicate::Compare { field, op, rhs: Operand::Field(other) }
    }

    pub fn one_of(field: Field, values: &[i64]) -> Self {
        Predicate::In {
            field,
            values: values.iter().map(|v| Value::Int(*v)).collect(),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Conjunction that flattens nested `And`s and drops trivially true terms.
    pub fn all_of(terms: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or_else(Predicate::always)
        } else {
            Predicate::And(flat)
        }
    }

    pub fn any_of(terms: impl IntoIterator<Item = Predicate>) -> Self {
        let mut terms: Vec<Predicate> = terms.into_iter().collect();
        if terms.len() == 1 {
            terms.pop().unwrap_or_else(Predicate::always)
        } else {
            Predicate::Or(terms)
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::And(terms) if terms.is_empty())
    }

    pub fn evaluate<R: Row + ?Sized>(&self, row: &R) -> bool {
        match self {
            Predicate::Equals { field, value } => row
                .get(*field)
                .and_then(|v| v.compare(value))
                .is_some_and(|o| o == Ordering::Equal),
            Predicate::In { field, values } => match row.get(*field) {
                Some(v) => values
                    .iter()
                    .any(|candidate| v.compare(candidate) == Some(Ordering::Equal)),
                None => false,
            },
            Predicate::And(terms) => terms.iter().all(|t| t.evaluate(row)),
            Predicate::Or(terms) => terms.iter().any(|t| t.evaluate(row)),
            Predicate::Not(inner) => !inner.evaluate(row),
            Predicate::Compare { field, op, rhs } => {
                let Some(lhs) = row.get(*field) else { return false };
                let rhs = match rhs {
                    Operand::Value(v) => Some(*v),
                    Operand::Field(f) => row.get(*f),
                };
                rhs.and_then(|r| lhs.compare(&r)).is_some_and(|o| op.holds(o))
            }
        }
    }
}

// ── Aggregates ───────────────────────────────────────────────────────────────

/// What a matching case contributes to its counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tally {
    Zero,
    One,
    Sum(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub when: Predicate,
    pub then: Tally,
}

/// A named counter. The first case whose predicate holds decides the
/// row's contribution; rows matching no case contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub name: String,
    pub cases: Vec<Case>,
}

impl Aggregate {
    /// Counts rows for which `when` holds.
    pub fn count(name: impl Into<String>, when: Predicate) -> Self {
        Self {
            name: name.into(),
            cases: vec![Case { when, then: Tally::One }],
        }
    }

    pub fn sum(name: impl Into<String>, cases: Vec<(Predicate, Tally)>) -> Self {
        Self {
            name: name.into(),
            cases: cases.into_iter().map(|(when, then)| Case { when, then }).collect(),
        }
    }

    pub fn contribution<R: Row + ?Sized>(&self, row: &R) -> i64 {
        let Some(case) = self.cases.iter().find(|c| c.when.evaluate(row)) else {
            return 0;
        };
        match &case.then {
            Tally::Zero => 0,
            Tally::One => 1,
            Tally::Sum(fields) => fields
                .iter()
                .filter_map(|f| row.get(*f).and_then(|v| v.as_i64()))
                .sum(),
        }
    }
}

/// Counter name to value, ordered for stable serialization.
pub type CounterSet = BTreeMap<String, i64>;

/// Streaming accumulator for a list of aggregates.
#[derive(Debug)]
pub struct Tallies<'a> {
    aggregates: &'a [Aggregate],
    totals: Vec<i64>,
    rows_seen: u64,
}

impl<'a> Tallies<'a> {
    pub fn new(aggregates: &'a [Aggregate]) -> Self {
        Self {
            aggregates,
            totals: vec![0; aggregates.len()],
            rows_seen: 0,
        }
    }

    pub fn observe<R: Row + ?Sized>(&mut self, row: &R) {
        self.rows_seen += 1;
        for (total, agg) in self.totals.iter_mut().zip(self.aggregates) {
            *total += agg.contribution(row);
        }
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn finish(self) -> CounterSet {
        self.aggregates
            .iter()
            .zip(self.totals)
            .map(|(agg, total)| (agg.name.clone(), total))
            .collect()
    }
}
