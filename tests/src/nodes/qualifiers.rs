/// Tests for qualifier merging and qualified names
#[cfg(test)]
mod qualifier_tests {
    use proptest::prelude::*;
    use tdl_nodes::{MergeMode, Qualifier, Qualifiers, qualify_name};

    fn qualifier() -> impl Strategy<Value = Qualifier> {
        prop_oneof![
            "[a-z]{1,3}".prop_map(Qualifier::from),
            (0u32..20).prop_map(Qualifier::from),
        ]
    }

    fn qualifiers() -> impl Strategy<Value = Qualifiers> {
        (
            prop::collection::vec(qualifier(), 0..5),
            prop::collection::btree_map("[a-c]", prop::collection::vec(qualifier(), 1..3), 0..3),
        )
            .prop_map(|(positional, keyword)| {
                keyword
                    .into_iter()
                    .flat_map(|(key, values)| values.into_iter().map(move |v| (key.clone(), v)))
                    .fold(
                        Qualifiers {
                            positional,
                            ..Qualifiers::default()
                        },
                        |quals, (key, value)| quals.with_kw(key, value),
                    )
            })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(base in qualifiers(), other in qualifiers()) {
            let once = base.merged(&other, MergeMode::Merge);
            let twice = once.merged(&other, MergeMode::Merge);
            prop_assert_eq!(qualify_name("s", &once), qualify_name("s", &twice));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn append_keeps_every_positional(base in qualifiers(), other in qualifiers()) {
            let once = base.merged(&other, MergeMode::Append);
            let twice = once.merged(&other, MergeMode::Append);
            prop_assert_eq!(
                twice.positional.len(),
                base.positional.len() + 2 * other.positional.len()
            );
        }

        #[test]
        fn keywords_merge_the_same_in_both_modes(base in qualifiers(), other in qualifiers()) {
            let appended = base.merged(&other, MergeMode::Append);
            let merged = base.merged(&other, MergeMode::Merge);
            prop_assert_eq!(appended.keyword, merged.keyword);
        }
    }

    #[test]
    fn test_append_is_not_idempotent() {
        let base = Qualifiers::new().with("a");
        let other = Qualifiers::new().with(1);
        let once = base.merged(&other, MergeMode::Append);
        let twice = once.merged(&other, MergeMode::Append);
        assert_eq!(qualify_name("s", &once), "s:a:1");
        assert_eq!(qualify_name("s", &twice), "s:a:1:1");
    }

    #[test]
    fn test_merge_skips_values_already_present() {
        let base = Qualifiers::new().with("a").with(1);
        let other = Qualifiers::new().with(1).with("b");
        assert_eq!(
            qualify_name("s", &base.merged(&other, MergeMode::Merge)),
            "s:a:1:b"
        );
    }

    #[test]
    fn test_keyword_values_are_joined() {
        let base = Qualifiers::new().with_kw("freq", 1);
        let other = Qualifiers::new().with_kw("freq", 2).with_kw("ant", "x");
        let merged = base.merged(&other, MergeMode::Append);
        assert_eq!(qualify_name("s", &merged), "s:ant=x:freq=1,2");
    }

    #[test]
    fn test_empty_qualifiers_leave_name_alone() {
        assert_eq!(qualify_name("s", &Qualifiers::new()), "s");
    }

    #[test]
    fn test_float_qualifier_keeps_decimal_point() {
        assert_eq!(Qualifier::from(2.0).as_str(), "2.0");
    }
}
