/// Tests for the resolve pass
///
/// These tests verify root detection, the orphan sweep, index assignment,
/// the sink and spigot mux and the resolved forest.
#[cfg(test)]
mod resolve_tests {
    use crate::utils::{collecting_scope, init_logging, parm, testing_scope};
    use tdl_nodes::{Value, meq};
    use tdl_repository::{ChildIndices, NodeScope, NoHook, RepositoryOptions, TdlError};

    fn constant(value: f64) -> tdl_nodes::NodeDef {
        meq("Constant").with().field("value", value).build().unwrap()
    }

    #[test]
    fn test_sum_of_constants() {
        let ns = collecting_scope();
        let a = ns.define("a", constant(1.0)).unwrap();
        let b = ns.define("b", constant(2.0)).unwrap();
        let c = ns.define("c", &a + &b).unwrap();
        ns.resolve().unwrap();

        assert!(ns.errors().is_empty());
        assert_eq!(ns.len(), 3);
        let forest = ns.forest().unwrap();
        assert_eq!(forest.roots, vec!["c".to_string()]);
        let resolved = forest.get("c").unwrap();
        assert_eq!(resolved.class, "MeqAdd");
        assert_eq!(
            resolved.children,
            ChildIndices::List(vec![
                i64::from(a.nodeindex().unwrap()),
                i64::from(b.nodeindex().unwrap())
            ])
        );
        assert_eq!(c.nodeindex(), Some(3));
        assert_eq!(ns.root_nodes().unwrap(), vec![c]);
    }

    #[test]
    fn test_indices_are_dense_after_sweep() {
        let ns = collecting_scope();
        let a = ns.define("a", parm(1.0)).unwrap();
        ns.define("orphan", parm(2.0)).unwrap();
        let b = ns.define("b", parm(3.0)).unwrap();
        let _sum = ns.define("sum", &a + &b).unwrap();
        ns.resolve().unwrap();

        assert!(!ns.contains("orphan"));
        let forest = ns.forest().unwrap();
        let indices = forest.nodes.iter().map(|node| node.nodeindex).collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(forest.get("sum").unwrap().children.indices(), vec![1, 2]);
    }

    #[test]
    fn test_orphan_without_handle_is_removed() {
        let ns = collecting_scope();
        ns.define("dropped", parm(1.0)).unwrap();
        let kept = ns.define("kept", parm(2.0)).unwrap();
        ns.resolve().unwrap();

        assert!(!ns.contains("dropped"));
        assert_eq!(ns.root_nodes().unwrap(), vec![kept]);
    }

    #[test]
    fn test_orphan_sweep_cascades_to_children() {
        let ns = collecting_scope();
        let p = ns.define("p", parm(1.0)).unwrap();
        ns.define("q", &p + 1.0).unwrap();
        drop(p);
        ns.resolve().unwrap();

        assert!(ns.is_empty());
        assert!(ns.forest().unwrap().roots.is_empty());
    }

    #[test]
    fn test_long_chain_is_swept_completely() {
        let ns = collecting_scope();
        let mut last = ns.define("base", parm(1.0)).unwrap();
        for step in 0..500 {
            last = ns.define(&format!("step{step}"), &last + 1.0).unwrap();
        }
        drop(last);
        ns.resolve().unwrap();

        assert!(ns.is_empty());
        assert!(ns.get("c1.0").is_none());
        assert!(ns.forest().unwrap().roots.is_empty());
    }

    #[test]
    fn test_sweep_keeps_constants_still_in_use() {
        let ns = collecting_scope();
        let kept = ns.define("kept", parm(1.0) + 2.0).unwrap();
        let dropped = ns.define("dropped", parm(3.0) * 2.0).unwrap();
        drop(dropped);
        ns.resolve().unwrap();

        assert!(!ns.contains("dropped"));
        assert!(ns.contains("c2.0"));
        assert_eq!(ns.root_nodes().unwrap(), vec![kept]);
    }

    #[test]
    fn test_shared_child_survives_partial_sweep() {
        let ns = collecting_scope();
        let p = ns.define("p", parm(1.0)).unwrap();
        ns.define("dropped", -&p).unwrap();
        let kept = ns.define("kept", p.abs()).unwrap();
        drop(p);
        ns.resolve().unwrap();

        assert!(!ns.contains("dropped"));
        assert!(ns.contains("p"));
        assert_eq!(ns.root_nodes().unwrap(), vec![kept]);
    }

    #[test]
    fn test_orphans_are_roots_keeps_everything() {
        init_logging();
        let ns = NodeScope::new(RepositoryOptions {
            orphans_are_roots: true,
            ..RepositoryOptions::default()
        });
        ns.define("x", parm(1.0)).unwrap();
        ns.define("y", parm(2.0)).unwrap();
        ns.resolve().unwrap();
        assert_eq!(
            ns.forest().unwrap().roots,
            vec!["x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn test_root_group_keeps_node() {
        let ns = collecting_scope();
        let x = ns.define("x", parm(1.0)).unwrap();
        ns.add_root(&x);
        drop(x);
        ns.resolve().unwrap();
        assert!(ns.contains("x"));
        assert!(ns.root_group().contains("x"));
        assert_eq!(ns.forest().unwrap().roots, vec!["x".to_string()]);
    }

    #[test]
    fn test_unbound_nodes_are_removed() {
        let ns = collecting_scope();
        let ghost = ns.node("ghost");
        let _x = ns.define("x", parm(1.0)).unwrap();
        ns.resolve().unwrap();
        assert!(!ns.contains("ghost"));
        assert_eq!(ghost.nodeindex(), None);
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_uninitialized_child_blocks_resolve() {
        let ns = collecting_scope();
        let x = ns.node("x");
        let p = ns.define("p", -&x).unwrap();
        let err = ns.resolve().unwrap_err();
        assert!(matches!(err, TdlError::Cumulative(_)));
        assert_eq!(p.nodeindex(), None);
        assert_eq!(ns.forest().unwrap_err(), TdlError::NotResolved);
    }

    #[test]
    fn test_second_resolve_is_a_no_op() {
        let ns = testing_scope();
        let x = ns.define("x", parm(1.0)).unwrap();
        ns.resolve().unwrap();
        ns.resolve().unwrap();
        assert_eq!(x.nodeindex(), Some(1));
    }

    #[test]
    fn test_roots_need_resolve() {
        let ns = testing_scope();
        let _x = ns.define("x", parm(1.0)).unwrap();
        assert_eq!(ns.root_nodes().unwrap_err(), TdlError::NotResolved);
        assert!(!ns.is_resolved());
    }

    #[test]
    fn test_init_record_is_stamped() {
        let ns = testing_scope();
        let a = ns.define("a", parm(1.0)).unwrap();
        let line = line!() + 1;
        let c = ns.define("c", &a * 2.0).unwrap();
        ns.resolve().unwrap();

        let record = c.init_record().unwrap();
        assert_eq!(record.get("nodeindex"), Some(&Value::Int(2)));
        assert_eq!(record.get("name"), Some(&Value::Str("c".to_string())));
        assert_eq!(
            record.get("node_description").and_then(Value::as_str),
            Some(format!("c:MeqMultiply:resolve.rs:{line}").as_str())
        );
        assert_eq!(record.get("children"), Some(&Value::from(vec![1i64, 3])));
        assert!(!a.init_record().unwrap().contains_key("children"));
    }

    #[test]
    fn test_mux_adopts_sinks_and_spigots() {
        let ns = collecting_scope();
        ns.define("x", parm(1.0)).unwrap();
        ns.define("sink", meq("Sink").with().child("x").build()).unwrap();
        ns.define("spigot", meq("Spigot").with().build()).unwrap();
        ns.resolve().unwrap();

        let forest = ns.forest().unwrap();
        assert_eq!(forest.roots, vec!["VisDataMux".to_string()]);
        let mux = forest.get("VisDataMux").unwrap();
        assert_eq!(mux.class, "MeqVisDataMux");
        let sink = forest.get("sink").unwrap().nodeindex;
        let spigot = forest.get("spigot").unwrap().nodeindex;
        assert_eq!(mux.children.indices(), vec![-1, -1, -1, i64::from(sink)]);
        assert_eq!(mux.step_children, vec![i64::from(spigot)]);
        let children = mux.init_record.get("children").and_then(Value::as_record).unwrap();
        assert_eq!(children.get("pre"), Some(&Value::Int(-1)));
    }

    #[test]
    fn test_bound_mux_without_sinks_is_swept() {
        let ns = collecting_scope();
        ns.define("mux", meq("VisDataMux").with().build()).unwrap();
        let _x = ns.define("x", parm(1.0)).unwrap();
        ns.resolve().unwrap();
        assert!(!ns.contains("mux"));
    }

    #[test]
    fn test_resolve_without_hook_leaves_sinks_alone() {
        let ns = collecting_scope();
        let sink = ns.define("sink", meq("Sink").with().build()).unwrap();
        ns.resolve_with(&mut NoHook).unwrap();
        assert!(!ns.contains("VisDataMux"));
        assert_eq!(ns.root_nodes().unwrap(), vec![sink]);
    }

    #[test]
    fn test_forest_serializes_to_json() {
        let ns = testing_scope();
        let a = ns.define("a", parm(1.0)).unwrap();
        let b = ns.define("b", parm(2.0)).unwrap();
        let _c = ns.define("c", &a + &b).unwrap();
        ns.resolve().unwrap();

        let json = ns.forest().unwrap().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["roots"][0], "c");
        assert_eq!(parsed["nodes"][2]["name"], "c");
        assert_eq!(parsed["nodes"][2]["children"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_print_tree_lists_children() {
        let ns = testing_scope();
        let a = ns.define("a", parm(1.0)).unwrap();
        let b = ns.define("b", parm(2.0)).unwrap();
        let c = ns.define("c", &a + &b).unwrap();
        let tree = ns.print_tree(&c);
        let lines = tree.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("c(MeqAdd): "), "got: {}", lines[0]);
        assert!(lines[1].starts_with("  0: a(MeqParm): "), "got: {}", lines[1]);
        assert!(lines[2].starts_with("  1: b(MeqParm): "), "got: {}", lines[2]);
    }
}
