//! Queries over a domain object's property names.
//!
//! Callers always name fields the way the object names its properties. The storage
//! engine rewrites a query into storage names with [`Query::to_storage`] right before it
//! reaches a backend, so aliased fields never leak out of the object definition.
//!
//! ```ignore
//! use docstate::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("title", "Hello").and(Filter::gte("views", 10)))
//!     .sort("views", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key. Later keys break ties left by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// How a field value is compared against a query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// The field equals one element of an array value.
    In,
}

/// A predicate over one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`present == true`) or absent.
    Exists { field: String, present: bool },
    Compare {
        field: String,
        op: Comparison,
        value: Bson,
    },
}

impl Expr {
    /// Conjunction. Chained calls extend a single `And` instead of nesting.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut all) => {
                all.push(other);
                Expr::And(all)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Disjunction. Chained calls extend a single `Or` instead of nesting.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut any) => {
                any.push(other);
                Expr::Or(any)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Filter, sort and window for a find or remove.
///
/// An empty query matches every document of the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub sort: Vec<Sort>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Rewrites every filter and sort field from a property name to its storage name.
    ///
    /// `storage_name` receives the property name and returns the field used inside the
    /// store; names without an alias should come back unchanged.
    pub fn to_storage<F>(&self, storage_name: F) -> Query
    where
        F: Fn(&str) -> String,
    {
        let mut renamer = FieldRenamer { storage_name };

        let filter = self.filter.as_ref().map(|expr| match renamer.visit_expr(expr) {
            Ok(expr) => expr,
            Err(never) => match never {},
        });
        let sort = self
            .sort
            .iter()
            .map(|key| Sort {
                field: (renamer.storage_name)(&key.field),
                direction: key.direction,
            })
            .collect();

        Query {
            filter,
            sort,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// Shorthand constructors for [`Expr`].
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, Comparison::Lte, value)
    }

    /// Matches documents whose `field` equals any of `values`.
    pub fn is_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        let values = values.into_iter().map(Into::into).collect::<Vec<Bson>>();
        Self::compare(field, Comparison::In, Bson::Array(values))
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists {
            field: field.into(),
            present: true,
        }
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists {
            field: field.into(),
            present: false,
        }
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Bson>) -> Expr {
        Expr::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Adds a sort key after any already present.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Number of matching documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree. Backends implement this to evaluate or translate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StorageError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error>;
    fn visit_compare(&mut self, field: &str, op: Comparison, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(inner) => self.visit_not(inner),
            Expr::Exists { field, present } => self.visit_exists(field, *present),
            Expr::Compare { field, op, value } => self.visit_compare(field, *op, value),
        }
    }
}

struct FieldRenamer<F> {
    storage_name: F,
}

impl<F> FieldRenamer<F>
where
    F: Fn(&str) -> String,
{
    fn visit_all(&mut self, exprs: &[Expr]) -> Vec<Expr> {
        exprs
            .iter()
            .map(|expr| match self.visit_expr(expr) {
                Ok(expr) => expr,
                Err(never) => match never {},
            })
            .collect()
    }
}

impl<F> QueryVisitor for FieldRenamer<F>
where
    F: Fn(&str) -> String,
{
    type Output = Expr;
    type Error = std::convert::Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Expr, Self::Error> {
        Ok(Expr::And(self.visit_all(exprs)))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Expr, Self::Error> {
        Ok(Expr::Or(self.visit_all(exprs)))
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        Ok(self.visit_expr(expr)?.not())
    }

    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Expr, Self::Error> {
        Ok(Expr::Exists {
            field: (self.storage_name)(field),
            present,
        })
    }

    fn visit_compare(&mut self, field: &str, op: Comparison, value: &Bson) -> Result<Expr, Self::Error> {
        Ok(Expr::Compare {
            field: (self.storage_name)(field),
            op,
            value: value.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(field: &str) -> String {
        match field {
            "title" => "t".to_string(),
            "published" => "p".to_string(),
            other => other.to_string(),
        }
    }

    #[test]
    fn to_storage_renames_nested_fields_and_every_sort_key() {
        let query = Query::builder()
            .filter(Filter::eq("title", "Hello").and(Filter::or([Filter::exists("published"), Filter::gt("views", 3)]).not()))
            .sort("published", SortDirection::Desc)
            .sort("title", SortDirection::Asc)
            .offset(2)
            .limit(5)
            .build();

        let raw = query.to_storage(alias);

        assert_eq!(
            raw.filter,
            Some(Filter::eq("t", "Hello").and(Filter::or([Filter::exists("p"), Filter::gt("views", 3)]).not()))
        );
        assert_eq!(
            raw.sort,
            vec![
                Sort { field: "p".to_string(), direction: SortDirection::Desc },
                Sort { field: "t".to_string(), direction: SortDirection::Asc },
            ]
        );
        assert_eq!((raw.offset, raw.limit), (Some(2), Some(5)));
    }

    #[test]
    fn chained_conjunctions_stay_flat() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        assert!(matches!(expr, Expr::And(ref all) if all.len() == 3));
    }

    #[test]
    fn is_in_collects_values_into_an_array() {
        assert_eq!(
            Filter::is_in("_id", [1, 2, 3]),
            Expr::Compare {
                field: "_id".to_string(),
                op: Comparison::In,
                value: Bson::Array(vec![1.into(), 2.into(), 3.into()]),
            }
        );
    }
}
