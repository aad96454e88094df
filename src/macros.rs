// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for building a sort-rule list.
///
/// Each entry is a direction (`asc` or `desc`) followed by a field accessor.
/// Rules apply in the order written.
///
/// ```rust
/// # use sectioned::{sort_rules, SortRule, ViewConfig};
/// struct Track {
///     id: u64,
///     rating: i64,
///     title: String,
/// }
///
/// let config = ViewConfig::builder(|t: &Track| t.id)
///     .sort(sort_rules![
///         desc |t: &Track| t.rating,
///         asc |t: &Track| t.title.clone(),
///     ])
///     .build()
///     .unwrap();
/// ```
#[macro_export]
macro_rules! sort_rules {
    ($($dir:ident $key:expr),* $(,)?) => {
        vec![ $( $crate::SortRule::$dir($key) ),* ]
    };
}

#[cfg(test)]
mod tests {
    use crate::{SortRule, ViewConfig};
    use std::cmp::Ordering;

    struct Row {
        id: u64,
        a: i64,
        b: i64,
    }

    #[test]
    fn sort_rules_macro_preserves_order_and_direction() {
        let rules: Vec<SortRule<Row>> = sort_rules![
            desc |r: &Row| r.a,
            asc |r: &Row| r.b,
        ];
        let config = ViewConfig::builder(|r: &Row| r.id)
            .sort(rules)
            .build()
            .unwrap();
        let x = Row { id: 1, a: 1, b: 9 };
        let y = Row { id: 2, a: 2, b: 0 };
        // first rule is descending on `a`, so the larger `a` sorts first
        assert_eq!(config.compare(&x, &y), Ordering::Greater);
    }
}
