use crate::query::ast::{BoolQuery, Query, RangeBound, RangeQuery};
use crate::storage::segment::SegmentDoc;

/// Score of `doc` under `query`, `None` when it does not match.
///
/// Term-like clauses score `sqrt(tf)`; boolean clauses sum their matching children.
pub fn score(query: &Query, doc: &SegmentDoc) -> Option<f32> {
    match query {
        Query::MatchAll => Some(1.0),

        Query::Term(t) => {
            let tf = doc.terms(&t.field).iter().filter(|term| **term == t.value).count();
            term_score(tf)
        }

        Query::Prefix(p) => {
            let tf = doc.terms(&p.field).iter().filter(|term| term.starts_with(&p.prefix)).count();
            term_score(tf)
        }

        Query::Wildcard(w) => {
            let tf = doc.terms(&w.field).iter().filter(|term| w.is_match(term)).count();
            term_score(tf)
        }

        Query::Range(r) => {
            if matches_range(r, doc) {
                Some(1.0)
            } else {
                None
            }
        }

        Query::Bool(b) => score_bool(b, doc),

        Query::Custom(c) => c.score(doc),
    }
}

fn term_score(tf: usize) -> Option<f32> {
    if tf == 0 {
        None
    } else {
        Some((tf as f32).sqrt())
    }
}

fn score_bool(query: &BoolQuery, doc: &SegmentDoc) -> Option<f32> {
    if query.must_not.iter().any(|q| score(q, doc).is_some()) {
        return None;
    }

    let mut total = 0.0;
    for clause in &query.must {
        total += score(clause, doc)?;
    }

    let mut matched_should = false;
    for clause in &query.should {
        if let Some(s) = score(clause, doc) {
            total += s;
            matched_should = true;
        }
    }

    if query.must.is_empty() && !query.should.is_empty() && !matched_should {
        return None;
    }
    // a purely negative query matches everything not excluded
    if query.must.is_empty() && query.should.is_empty() {
        return if query.must_not.is_empty() { None } else { Some(1.0) };
    }
    Some(total)
}

fn matches_range(range: &RangeQuery, doc: &SegmentDoc) -> bool {
    if range.is_numeric() {
        let lower = numeric_bound(&range.lower);
        let upper = numeric_bound(&range.upper);
        return doc.numerics(&range.field).iter().any(|v| {
            within(v.partial_cmp(&lower.unwrap_or(f64::NEG_INFINITY)), range.include_lower || lower.is_none(), true)
                && within(v.partial_cmp(&upper.unwrap_or(f64::INFINITY)), range.include_upper || upper.is_none(), false)
        });
    }

    let lower = text_bound(&range.lower);
    let upper = text_bound(&range.upper);
    doc.terms(&range.field).iter().any(|term| {
        let above = match lower {
            None => true,
            Some(l) => within(Some(term.as_str().cmp(l)), range.include_lower, true),
        };
        let below = match upper {
            None => true,
            Some(u) => within(Some(term.as_str().cmp(u)), range.include_upper, false),
        };
        above && below
    })
}

fn within(ordering: Option<std::cmp::Ordering>, inclusive: bool, is_lower: bool) -> bool {
    use std::cmp::Ordering::*;
    match (ordering, is_lower) {
        (Some(Greater), true) | (Some(Less), false) => true,
        (Some(Equal), _) => inclusive,
        _ => false,
    }
}

fn numeric_bound(bound: &Option<RangeBound>) -> Option<f64> {
    match bound {
        Some(RangeBound::Number(n)) => Some(*n),
        Some(RangeBound::Text(s)) => s.parse().ok(),
        None => None,
    }
}

fn text_bound(bound: &Option<RangeBound>) -> Option<&str> {
    match bound {
        Some(RangeBound::Text(s)) => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{BoolQuery, PrefixQuery};

    fn doc() -> SegmentDoc {
        let mut doc = SegmentDoc::default();
        doc.terms.insert("Name".to_string(), vec!["oren".to_string(), "eini".to_string()]);
        doc.terms.insert("City".to_string(), vec!["hadera".to_string()]);
        doc.numerics.insert("Age_Range".to_string(), vec![35.0]);
        doc
    }

    fn range(field: &str, lower: Option<f64>, upper: Option<f64>, inclusive: bool) -> Query {
        Query::Range(RangeQuery {
            field: field.to_string(),
            lower: lower.map(RangeBound::Number),
            upper: upper.map(RangeBound::Number),
            include_lower: inclusive,
            include_upper: inclusive,
        })
    }

    #[test]
    fn term_and_prefix() {
        assert!(score(&Query::term("Name", "oren"), &doc()).is_some());
        assert!(score(&Query::term("Name", "ayende"), &doc()).is_none());
        let prefix = Query::Prefix(PrefixQuery { field: "City".to_string(), prefix: "had".to_string() });
        assert!(score(&prefix, &doc()).is_some());
    }

    #[test]
    fn numeric_ranges_respect_inclusiveness() {
        assert!(score(&range("Age_Range", Some(35.0), Some(40.0), true), &doc()).is_some());
        assert!(score(&range("Age_Range", Some(35.0), Some(40.0), false), &doc()).is_none());
        assert!(score(&range("Age_Range", None, Some(36.0), false), &doc()).is_some());
        assert!(score(&range("Age_Range", Some(36.0), None, true), &doc()).is_none());
    }

    #[test]
    fn boolean_combinations() {
        let must = Query::Bool(BoolQuery::new()
            .with_must(Query::term("Name", "oren"))
            .with_must(Query::term("City", "hadera")));
        assert_eq!(score(&must, &doc()), Some(2.0));

        let should = Query::Bool(BoolQuery::new()
            .with_should(Query::term("Name", "nobody"))
            .with_should(Query::term("City", "hadera")));
        assert!(score(&should, &doc()).is_some());

        let negative = Query::Bool(BoolQuery::new().with_must_not(Query::term("City", "hadera")));
        assert!(score(&negative, &doc()).is_none());
        let other = Query::Bool(BoolQuery::new().with_must_not(Query::term("City", "london")));
        assert!(score(&other, &doc()).is_some());
    }
}
