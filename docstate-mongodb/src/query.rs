//! Query translation from the docstate query AST to MongoDB query syntax.
//!
//! Field names arrive already translated to storage names by the storage engine.

use bson::{Bson, Document, doc};

use docstate_core::{
    error::StorageError,
    query::{Comparison, Expr, Query, QueryVisitor, SortDirection},
};

/// Translates query expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Filter document for `query`; matches everything when the query has no filter.
    pub fn filter(query: &Query) -> Result<Document, StorageError> {
        match &query.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    /// Sort document with keys in query order, or `None` for natural order.
    pub fn sort(query: &Query) -> Option<Document> {
        if query.sort.is_empty() {
            return None;
        }

        Some(
            query
                .sort
                .iter()
                .map(|key| {
                    let direction = match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };
                    (key.field.clone(), Bson::Int32(direction))
                })
                .collect(),
        )
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = StorageError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` only applies to operator expressions; negate whole predicates with `$nor`.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": present },
        })
    }

    fn visit_compare(&mut self, field: &str, op: Comparison, value: &Bson) -> Result<Self::Output, Self::Error> {
        let operator = match op {
            Comparison::Eq => "$eq",
            Comparison::Ne => "$ne",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
            Comparison::In if matches!(value, Bson::Array(_)) => "$in",
            Comparison::In => {
                return Err(StorageError::InvalidArgument(format!(
                    "`{field}` can only be matched against a list of values"
                )));
            }
        };

        Ok(doc! {
            field: { operator: value.clone() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstate_core::query::Filter;

    #[test]
    fn membership_and_negation_translate_to_operators() {
        let query = Query::builder()
            .filter(Filter::and(vec![
                Filter::is_in("_id", vec![1, 2]),
                Filter::exists("t").not(),
            ]))
            .sort("t", SortDirection::Desc)
            .build();

        assert_eq!(
            MongoQueryTranslator::filter(&query).unwrap(),
            doc! {
                "$and": [
                    { "_id": { "$in": [1, 2] } },
                    { "$nor": [{ "t": { "$exists": true } }] },
                ]
            }
        );
        assert_eq!(MongoQueryTranslator::sort(&query), Some(doc! { "t": -1 }));
    }

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(&Query::new()).unwrap(), doc! {});
        assert_eq!(MongoQueryTranslator::sort(&Query::new()), None);
    }

    #[test]
    fn membership_rejects_single_values() {
        let query = Query::builder()
            .filter(Expr::Compare {
                field: "t".to_string(),
                op: Comparison::In,
                value: Bson::Int32(3),
            })
            .build();

        assert!(matches!(
            MongoQueryTranslator::filter(&query),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn sort_keys_keep_their_order() {
        let query = Query::builder()
            .sort("b", SortDirection::Asc)
            .sort("a", SortDirection::Desc)
            .build();

        let sort = MongoQueryTranslator::sort(&query).unwrap();

        assert_eq!(sort.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(sort, doc! { "b": 1, "a": -1 });
    }
}
