use std::fmt::Write as _;

use rusqlite::types::{ToSql, ToSqlOutput};

use crate::types::PostFilter;

/// A positional query parameter. Values are always bound, never spliced into
/// the query text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Int(v) => v.to_sql(),
            Self::Text(v) => v.to_sql(),
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, title, content, author, platform, source, score, num_comments, created_at, url";

/// A built query pair: the paginated select and its companion count form.
/// Both share the same predicate state, so totals and page data can never
/// disagree on which rows matched.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    /// Same predicates, `COUNT(*)` projection, no sort or pagination.
    pub count_sql: String,
    /// Parameters for `sql` (predicates followed by LIMIT/OFFSET).
    pub params: Vec<SqlValue>,
    /// Parameters for `count_sql` (predicates only).
    pub count_params: Vec<SqlValue>,
    /// Indexable columns this query touches. Diagnostics only.
    pub indexed_columns: Vec<&'static str>,
    cache_key: String,
}

impl BuiltQuery {
    /// Key for the result cache: the full normalized criteria, serialized in
    /// struct field order so logically identical queries always collide and
    /// logically different ones never do.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}

/// Builds parameterized filter/sort/pagination queries from a [`PostFilter`].
///
/// Output is deterministic: each optional field appends its predicate in a
/// fixed order regardless of which fields are set, so identical criteria
/// yield byte-identical (query text, parameter list) pairs.
#[derive(Debug)]
pub struct QueryBuilder {
    where_clause: String,
    params: Vec<SqlValue>,
    indexed_columns: Vec<&'static str>,
    filter: PostFilter,
    fts: bool,
}

impl QueryBuilder {
    /// Construct a builder from criteria. `fts` selects the indexed
    /// full-text search path; both paths match the same logical row set for
    /// a given term, modulo ranking.
    pub fn from_filter(filter: &PostFilter, fts: bool) -> Self {
        let filter = filter.normalized();
        let mut builder = Self {
            where_clause: String::from(" WHERE 1=1"),
            params: Vec::new(),
            indexed_columns: Vec::new(),
            filter: filter.clone(),
            fts,
        };
        builder.push_predicates(&filter);
        builder
    }

    // Fixed field order: platform, source, author, search, date range,
    // score range, comments range. Never reorder — cache keys and test
    // fixtures depend on the emitted text.
    fn push_predicates(&mut self, f: &PostFilter) {
        if let Some(platform) = &f.platform {
            self.push_eq("platform", SqlValue::Text(platform.clone()));
        }
        if let Some(source) = &f.source {
            self.push_eq("source", SqlValue::Text(source.clone()));
        }
        if let Some(author) = &f.author {
            self.push_eq("author", SqlValue::Text(author.clone()));
        }
        if let Some(term) = &f.search_term {
            self.push_search(term);
        }
        if let Some(from) = f.date_from {
            self.push_cmp("created_at", ">=", SqlValue::Int(from));
        }
        if let Some(to) = f.date_to {
            self.push_cmp("created_at", "<=", SqlValue::Int(to));
        }
        if let Some(min) = f.score_min {
            self.push_cmp("score", ">=", SqlValue::Int(min));
        }
        if let Some(max) = f.score_max {
            self.push_cmp("score", "<=", SqlValue::Int(max));
        }
        if let Some(min) = f.comments_min {
            self.push_cmp("num_comments", ">=", SqlValue::Int(i64::from(min)));
        }
        if let Some(max) = f.comments_max {
            self.push_cmp("num_comments", "<=", SqlValue::Int(i64::from(max)));
        }
    }

    fn push_eq(&mut self, column: &'static str, value: SqlValue) {
        self.params.push(value);
        let _ = write!(
            self.where_clause,
            " AND {column} = ?{}",
            self.params.len()
        );
        self.indexed_columns.push(column);
    }

    fn push_cmp(&mut self, column: &'static str, op: &str, value: SqlValue) {
        self.params.push(value);
        let _ = write!(
            self.where_clause,
            " AND {column} {op} ?{}",
            self.params.len()
        );
        if !self.indexed_columns.contains(&column) {
            self.indexed_columns.push(column);
        }
    }

    fn push_search(&mut self, term: &str) {
        if self.fts {
            // MATCH terms are quoted so user input cannot inject FTS syntax.
            let quoted = format!("\"{}\"", term.replace('"', ""));
            self.params.push(SqlValue::Text(quoted));
            let _ = write!(
                self.where_clause,
                " AND rowid IN (SELECT rowid FROM posts_search WHERE posts_search MATCH ?{})",
                self.params.len()
            );
        } else {
            let like = format!("%{term}%");
            self.params.push(SqlValue::Text(like.clone()));
            let title_idx = self.params.len();
            self.params.push(SqlValue::Text(like));
            let _ = write!(
                self.where_clause,
                " AND (title LIKE ?{title_idx} OR content LIKE ?{})",
                self.params.len()
            );
        }
    }

    /// Finish into the paginated select and its count companion.
    pub fn build(self) -> BuiltQuery {
        let f = &self.filter;
        let count_sql = format!("SELECT COUNT(*) FROM posts{}", self.where_clause);

        // Secondary sort on id keeps row order total even when the sort
        // column has duplicates.
        let limit_idx = self.params.len() + 1;
        let offset_idx = self.params.len() + 2;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM posts{} ORDER BY {} {}, id ASC LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            self.where_clause,
            f.sort_by.column(),
            f.sort_order.keyword(),
        );

        let count_params = self.params.clone();
        let mut params = self.params;
        let offset = i64::from(f.page - 1) * i64::from(f.page_size);
        params.push(SqlValue::Int(i64::from(f.page_size)));
        params.push(SqlValue::Int(offset));

        let cache_key = Self::cache_key_for(f);

        BuiltQuery {
            sql,
            count_sql,
            params,
            count_params,
            indexed_columns: self.indexed_columns,
            cache_key,
        }
    }

    /// Finish into an unpaginated select over the same predicates, ordered by
    /// `created_at` ascending. Used by the aggregation paths, which need the
    /// full matching row set.
    pub fn build_unpaginated(self) -> BuiltQuery {
        let count_sql = format!("SELECT COUNT(*) FROM posts{}", self.where_clause);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM posts{} ORDER BY created_at ASC, id ASC",
            self.where_clause
        );
        let cache_key = format!("all:{}", Self::cache_key_for(&self.filter));

        BuiltQuery {
            sql,
            count_sql,
            count_params: self.params.clone(),
            params: self.params,
            indexed_columns: self.indexed_columns,
            cache_key,
        }
    }

    fn cache_key_for(filter: &PostFilter) -> String {
        // serde_json emits struct fields in declaration order, so the key is
        // independent of how the caller populated the filter.
        serde_json::to_string(filter).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SortBy, SortOrder};
    use proptest::prelude::*;

    #[test]
    fn empty_filter_matches_all_in_default_order() {
        let q = QueryBuilder::from_filter(&PostFilter::default(), false).build();
        assert_eq!(
            q.sql,
            format!(
                "SELECT {SELECT_COLUMNS} FROM posts WHERE 1=1 ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2"
            )
        );
        assert_eq!(q.params, vec![SqlValue::Int(20), SqlValue::Int(0)]);
        assert_eq!(q.count_sql, "SELECT COUNT(*) FROM posts WHERE 1=1");
        assert!(q.count_params.is_empty());
        assert!(q.indexed_columns.is_empty());
    }

    #[test]
    fn each_set_field_appends_one_predicate() {
        let filter = PostFilter {
            platform: Some("reddit".into()),
            score_min: Some(10),
            score_max: Some(100),
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, false).build();
        assert!(q.sql.contains("platform = ?1"));
        assert!(q.sql.contains("score >= ?2"));
        assert!(q.sql.contains("score <= ?3"));
        assert_eq!(q.count_params.len(), 3);
        assert_eq!(q.indexed_columns, vec!["platform", "score"]);
    }

    #[test]
    fn predicate_order_is_fixed_regardless_of_population_order() {
        // Populate "backwards" relative to the emission order.
        let filter = PostFilter {
            comments_min: Some(5),
            platform: Some("hackernews".into()),
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, false).build();
        let platform_pos = q.sql.find("platform").unwrap();
        let comments_pos = q.sql.find("num_comments").unwrap();
        assert!(platform_pos < comments_pos);
    }

    #[test]
    fn identical_filters_build_identical_queries() {
        let filter = PostFilter {
            source: Some("rust".into()),
            search_term: Some("borrow checker".into()),
            date_from: Some(1_700_000_000),
            sort_by: SortBy::Score,
            sort_order: SortOrder::Asc,
            page: 3,
            page_size: 50,
            ..Default::default()
        };
        let a = QueryBuilder::from_filter(&filter, true).build();
        let b = QueryBuilder::from_filter(&filter, true).build();
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn distinct_filters_have_distinct_cache_keys() {
        let a = QueryBuilder::from_filter(
            &PostFilter {
                score_min: Some(1),
                ..Default::default()
            },
            false,
        )
        .build();
        let b = QueryBuilder::from_filter(
            &PostFilter {
                comments_min: Some(1),
                ..Default::default()
            },
            false,
        )
        .build();
        assert_ne!(a.cache_key(), b.cache_key());

        // Pagination is part of the key.
        let c = QueryBuilder::from_filter(
            &PostFilter {
                page: 2,
                ..Default::default()
            },
            false,
        )
        .build();
        let d = QueryBuilder::from_filter(&PostFilter::default(), false).build();
        assert_ne!(c.cache_key(), d.cache_key());
    }

    #[test]
    fn like_path_uses_two_params_for_one_term() {
        let filter = PostFilter {
            search_term: Some("async".into()),
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, false).build();
        assert!(q.sql.contains("title LIKE ?1 OR content LIKE ?2"));
        assert_eq!(q.count_params.len(), 2);
    }

    #[test]
    fn fts_path_quotes_the_term() {
        let filter = PostFilter {
            search_term: Some("drop \"table\"".into()),
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, true).build();
        assert!(q.sql.contains("posts_search MATCH ?1"));
        assert_eq!(
            q.count_params,
            vec![SqlValue::Text("\"drop table\"".into())]
        );
    }

    #[test]
    fn pagination_is_clamped() {
        let filter = PostFilter {
            page: 0,
            page_size: 9999,
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, false).build();
        let n = q.params.len();
        assert_eq!(q.params[n - 2], SqlValue::Int(1000));
        assert_eq!(q.params[n - 1], SqlValue::Int(0));
    }

    #[test]
    fn unpaginated_form_shares_predicates() {
        let filter = PostFilter {
            platform: Some("reddit".into()),
            ..Default::default()
        };
        let q = QueryBuilder::from_filter(&filter, false).build_unpaginated();
        assert!(q.sql.contains("platform = ?1"));
        assert!(!q.sql.contains("LIMIT"));
        assert_eq!(q.params, q.count_params);
    }

    proptest! {
        #[test]
        fn builder_is_deterministic(
            platform in proptest::option::of("[a-z]{1,8}"),
            term in proptest::option::of("[a-z ]{1,16}"),
            score_min in proptest::option::of(-1000i64..1000),
            page in 0u32..10,
            page_size in 0u32..2000,
        ) {
            let filter = PostFilter {
                platform,
                search_term: term,
                score_min,
                page,
                page_size,
                ..Default::default()
            };
            let a = QueryBuilder::from_filter(&filter, false).build();
            let b = QueryBuilder::from_filter(&filter, false).build();
            prop_assert_eq!(&a.sql, &b.sql);
            prop_assert_eq!(&a.params, &b.params);
            prop_assert_eq!(a.cache_key(), b.cache_key());

            // LIMIT never exceeds the hard page-size ceiling.
            let n = a.params.len();
            if let SqlValue::Int(limit) = &a.params[n - 2] {
                prop_assert!(*limit >= 1 && *limit <= 1000);
            } else {
                prop_assert!(false, "limit param must be an integer");
            }
        }
    }
}
