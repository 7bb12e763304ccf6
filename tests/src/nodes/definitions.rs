/// Tests for node definitions built without a repository
#[cfg(test)]
mod definition_tests {
    use crate::utils::parm;
    use tdl_nodes::{
        BuildError, ChildList, ChildRef, Constant, DEFAULT_RESOLVE_DEPTH, InitRecord, Value, meq,
        ops,
    };

    fn class_of(child: &ChildRef) -> Option<String> {
        match child {
            ChildRef::Pending(def) => Some(def.class_name()),
            _ => None,
        }
    }

    #[test]
    fn test_tags_string_is_split_on_whitespace() {
        let def = meq("Parm").with().tags("solvable  phase").build().unwrap();
        assert_eq!(def.init_record().tags(), vec!["solvable", "phase"]);
    }

    #[test]
    fn test_tags_list_is_kept() {
        let def = meq("Parm").with().tags(vec!["a", "b c"]).build().unwrap();
        assert_eq!(def.init_record().tags(), vec!["a", "b c"]);
    }

    #[test]
    fn test_tags_of_wrong_type_are_rejected() {
        let err = meq("Parm").with().tags(3).build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidTags { ref class, .. } if class == "MeqParm"));
        assert!(err.to_string().contains("found 3"), "got: {err}");
    }

    #[test]
    fn test_single_node_group_becomes_list() {
        let def = meq("Parm").with().node_groups("Parm").build().unwrap();
        assert_eq!(
            def.init_record().get(InitRecord::NODE_GROUPS),
            Some(&Value::from(vec!["Parm"]))
        );
    }

    #[test]
    fn test_tags_given_as_field_are_checked() {
        let def = meq("Parm").with().field("tags", "a b").build().unwrap();
        assert_eq!(def.init_record().tags(), vec!["a", "b"]);
        let err = meq("Parm").with().field("tags", 1.5).build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidTags { .. }));
    }

    #[test]
    fn test_reserved_field_is_rejected() {
        let err = meq("Parm").with().field("nodeindex", 3).build().unwrap_err();
        assert!(
            matches!(err, BuildError::ReservedField { ref field, .. } if field == "nodeindex")
        );
    }

    #[test]
    fn test_children_from_two_sources_conflict() {
        let err = meq("Add")
            .with()
            .child(1.0)
            .node_field("lhs", 2.0)
            .build()
            .unwrap_err();
        match err {
            BuildError::ConflictingChildren { sources, .. } => {
                assert_eq!(sources, "arguments and keyword children");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_all_three_child_sources_conflict() {
        let err = meq("Add")
            .with()
            .child(1.0)
            .children(ChildList::positional([ChildRef::from(2.0)]))
            .node_field("lhs", 3.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ConflictingChildren { ref sources, .. }
                if sources == "arguments and 'children' and keyword children"
        ));
    }

    #[test]
    fn test_keyed_children_make_a_dict() {
        let def = meq("Solver")
            .with()
            .node_field("lhs", "x")
            .node_field("rhs", "y")
            .build()
            .unwrap();
        assert!(def.children().is_dict());
        let labels = def
            .children()
            .iter()
            .map(|(label, _)| label.to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["lhs", "rhs"]);
    }

    #[test]
    fn test_keyed_stepchildren_are_rejected() {
        let err = meq("Add")
            .with()
            .stepchildren(ChildList::keyed([("a", ChildRef::from("x"))]))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::KeyedStepchildren { .. }));
    }

    #[test]
    fn test_failed_nested_definition_poisons_parent() {
        let nested = meq("Parm").with().tags(false).build();
        let err = meq("Negate").with().child(nested).build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidTags { .. }));
    }

    #[test]
    fn test_class_field_is_set() {
        let def = parm(1.0);
        assert_eq!(def.class_name(), "MeqParm");
        assert_eq!(def.init_record().class_name(), Some("MeqParm"));
        assert_eq!(
            def.init_record().get("default").and_then(Value::as_float),
            Some(1.0)
        );
    }

    #[test]
    fn test_arithmetic_sugar() {
        assert_eq!((parm(1.0) + 2.0).class_name(), "MeqAdd");
        assert_eq!((parm(1.0) - 2.0).class_name(), "MeqSubtract");
        assert_eq!((parm(1.0) * 2.0).class_name(), "MeqMultiply");
        assert_eq!((parm(1.0) / 2.0).class_name(), "MeqDivide");
        assert_eq!((parm(1.0) % 2.0).class_name(), "MeqFMod");
        assert_eq!((-parm(1.0)).class_name(), "MeqNegate");
        assert_eq!(parm(1.0).pow(2).class_name(), "MeqPow");
        assert_eq!(parm(1.0).abs().class_name(), "MeqAbs");
    }

    #[test]
    fn test_reflected_operand_comes_first() {
        let def = 2.0 - parm(1.0);
        let children = def.children().entries();
        assert_eq!(children[0].1, ChildRef::Const(Constant::Real(2.0)));
        assert_eq!(class_of(&children[1].1).as_deref(), Some("MeqParm"));
    }

    #[test]
    fn test_named_ops_match_operators() {
        assert_eq!(ops::add(parm(1.0), "x"), parm(1.0) + "x");
        assert_eq!(ops::fmod(parm(1.0), 2.0), parm(1.0) % 2.0);
    }

    #[test]
    fn test_integers_and_bools_become_real_constants() {
        assert_eq!(ChildRef::from(3), ChildRef::Const(Constant::Real(3.0)));
        assert_eq!(ChildRef::from(true), ChildRef::Const(Constant::Real(1.0)));
        assert_eq!(ChildRef::from(0.0), ChildRef::from(-0.0));
    }

    #[test]
    fn test_constant_resolves_to_constant_definition() {
        let def = ChildRef::from(2.5).resolve_value(DEFAULT_RESOLVE_DEPTH).unwrap();
        assert_eq!(def.class_name(), "MeqConstant");
        assert_eq!(def.init_record().get("value"), Some(&Value::Float(2.5)));
    }

    fn nested_factory(levels: u32) -> ChildRef {
        if levels == 0 {
            meq("Freq").def().into()
        } else {
            ChildRef::factory(move || nested_factory(levels - 1))
        }
    }

    #[test]
    fn test_factory_depth_is_bounded() {
        assert!(nested_factory(DEFAULT_RESOLVE_DEPTH)
            .resolve_value(DEFAULT_RESOLVE_DEPTH)
            .is_some());
        assert!(nested_factory(DEFAULT_RESOLVE_DEPTH + 1)
            .resolve_value(DEFAULT_RESOLVE_DEPTH)
            .is_none());
    }

    #[test]
    fn test_factory_expansion_is_bounded() {
        let expanded = nested_factory(DEFAULT_RESOLVE_DEPTH).expand_factories();
        assert_eq!(expanded, ChildRef::from(meq("Freq").def()));
        let too_deep = nested_factory(DEFAULT_RESOLVE_DEPTH + 1).expand_factories();
        assert_eq!(too_deep.kind(), "factory");
    }

    #[test]
    fn test_names_and_nodes_are_not_definitions() {
        assert!(ChildRef::from("x").resolve_value(DEFAULT_RESOLVE_DEPTH).is_none());
        assert!(ChildRef::Empty.resolve_value(DEFAULT_RESOLVE_DEPTH).is_none());
    }

    #[test]
    fn test_value_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn test_record_equality_ignores_order() {
        let a = InitRecord::from_iter([("x", 1), ("y", 2)]);
        let b = InitRecord::from_iter([("y", 2), ("x", 1)]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "{x: 1, y: 2}");
    }
}
