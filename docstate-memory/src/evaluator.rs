//! Filter evaluation and sort ordering over raw BSON documents.

use bson::{Bson, Document, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docstate_core::{
    error::{StorageError, StorageResult},
    query::{Comparison, Expr, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Binary values (UUIDs included) compare by
/// subtype and bytes.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Binary(u8, &'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(u8::from(binary.subtype), &binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(a, x), Comparable::Binary(b, y)) => a == b && x == y,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates a filter expression against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StorageResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` if `document` matches `filter`; a missing filter matches everything.
    pub fn matches(document: &'a Document, filter: Option<&Expr>) -> StorageResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = StorageError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.document.contains_key(field) == present)
    }

    fn visit_compare(&mut self, field: &str, op: Comparison, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get(field) else {
            return Ok(false);
        };
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
            Comparison::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            Comparison::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
            Comparison::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            Comparison::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
            Comparison::In => match right {
                Comparable::Array(values) => values.contains(&left),
                _ => {
                    return Err(StorageError::InvalidArgument(format!(
                        "`{field}` can only be matched against a list of values"
                    )));
                }
            },
        })
    }
}

/// Orders two documents by `sort`, key by key. Missing fields sort as null.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = a.get(&key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = b.get(&key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.partial_cmp(&right),
            SortDirection::Desc => right.partial_cmp(&left),
        }
        .unwrap_or(Ordering::Equal);

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
