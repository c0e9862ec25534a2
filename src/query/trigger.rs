use std::sync::Arc;
use crate::query::ast::Query;
use crate::query::types::IndexQuery;

/// Rewrites the structured query before it runs; triggers apply in registration order.
pub trait IndexQueryTrigger: Send + Sync {
    fn process_query(&self, index: &str, query: Query, options: &IndexQuery) -> Query;
}

pub fn apply_triggers(triggers: &[Arc<dyn IndexQueryTrigger>], index: &str, query: Query, options: &IndexQuery) -> Query {
    triggers
        .iter()
        .fold(query, |current, trigger| trigger.process_query(index, current, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::BoolQuery;

    struct ExcludeDrafts;

    impl IndexQueryTrigger for ExcludeDrafts {
        fn process_query(&self, _index: &str, query: Query, _options: &IndexQuery) -> Query {
            Query::Bool(BoolQuery::new().with_must(query).with_must_not(Query::term("Status", "draft")))
        }
    }

    struct OnlyOnIndex(&'static str);

    impl IndexQueryTrigger for OnlyOnIndex {
        fn process_query(&self, index: &str, query: Query, _options: &IndexQuery) -> Query {
            if index == self.0 { Query::MatchAll } else { query }
        }
    }

    #[test]
    fn triggers_run_in_registration_order() {
        let triggers: Vec<Arc<dyn IndexQueryTrigger>> = vec![Arc::new(OnlyOnIndex("Posts")), Arc::new(ExcludeDrafts)];
        let query = apply_triggers(&triggers, "Posts", Query::term("Title", "rust"), &IndexQuery::default());
        assert_eq!(query.to_string(), "(+*:* -Status:draft)");
    }
}
