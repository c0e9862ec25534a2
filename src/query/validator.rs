use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{CATCH_ALL_FIELD, DISTANCE_FIELD_NAME, RANDOM_FIELD_NAME, RANGE_SUFFIX, TEMPORARY_SCORE_VALUE};
use crate::indexing::view_generator::ViewGenerator;
use crate::query::parser::QueryBuilder;
use crate::query::types::IndexQuery;

fn base_field(field: &str) -> &str {
    field.strip_suffix(RANGE_SUFFIX).unwrap_or(field)
}

fn not_indexed(field: &str, action: &str) -> Error {
    Error::new(
        ErrorKind::InvalidArgument,
        format!("The field '{}' is not indexed, cannot {} on fields that are not indexed", field, action),
    )
}

/// Rejects queries and sorts on fields the map function never emits.
pub fn assert_query_does_not_contain_fields_that_are_not_indexed(
    query: &IndexQuery,
    builder: &dyn QueryBuilder,
    generator: &dyn ViewGenerator,
) -> Result<()> {
    if query.query.trim().is_empty() {
        return Ok(());
    }
    let dynamic = generator.contains_field(CATCH_ALL_FIELD);

    for field in builder.fields(&query.query)? {
        let field = base_field(&field);
        if !generator.contains_field(field) && !dynamic {
            return Err(not_indexed(field, "query"));
        }
    }

    for sorted in &query.sorted_fields {
        let field = sorted.field.as_str();
        if field == TEMPORARY_SCORE_VALUE || field.starts_with(RANDOM_FIELD_NAME) {
            continue;
        }
        let field = base_field(field);
        if !generator.contains_field(field) && field != DISTANCE_FIELD_NAME && !dynamic {
            return Err(not_indexed(field, "sort"));
        }
    }
    Ok(())
}
