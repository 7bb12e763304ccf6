/// Tests for generated names, qualifiers and scopes
#[cfg(test)]
mod naming_tests {
    use crate::utils::{parm, testing_scope};
    use tdl_nodes::{Qualifiers, meq};

    #[test]
    fn test_anonymous_binds_with_same_children_collapse() {
        let ns = testing_scope();
        let a = ns.define("a", parm(1.0)).unwrap();
        let b = ns.define("b", parm(2.0)).unwrap();
        let first = ns.bind(&a + &b).unwrap();
        let second = ns.bind(&a + &b).unwrap();
        assert_eq!(first.name(), "add(a,b)");
        assert_eq!(first, second);
        assert_eq!(ns.len(), 3);
    }

    #[test]
    fn test_generated_name_carries_merged_child_qualifiers() {
        let ns = testing_scope();
        let q1 = Qualifiers::new().with(1);
        let a = ns.node("a").qualify(&q1).bind(parm(1.0)).unwrap();
        let b = ns
            .node("b")
            .qualify(&q1.clone().with_kw("st", 3))
            .bind(parm(2.0))
            .unwrap();
        assert_eq!(a.name(), "a:1");
        assert_eq!(b.name(), "b:1:st=3");
        let sum = ns.bind(&a * &b).unwrap();
        assert_eq!(sum.basename(), "multiply(a,b)");
        assert_eq!(sum.name(), "multiply(a,b):1:st=3");
    }

    #[test]
    fn test_nested_expression_names() {
        let ns = testing_scope();
        let x = ns.define("x", parm(1.0)).unwrap();
        let y = ns.define("y", (&x + 2.0).abs()).unwrap();
        let inner = y.children().stub_ids().next().unwrap();
        let inner_name = ns.with_repository(|repo| repo.name_of(inner).map(ToString::to_string));
        assert_eq!(inner_name.as_deref(), Some("add(x,c2.0)"));
    }

    #[test]
    fn test_childless_definitions_get_unique_names() {
        let ns = testing_scope();
        let first = ns.bind(meq("Freq").def()).unwrap();
        let second = ns.bind(meq("Freq").def()).unwrap();
        assert_eq!(first.name(), "(freq)");
        assert_eq!(second.name(), "(freq)1");
        assert_eq!(ns.make_unique_name("freq"), "(freq)2");
        assert_eq!(ns.make_unique_name("time"), "(time)");
    }

    #[test]
    fn test_resolved_children_are_not_resolved_again() {
        let ns = testing_scope();
        let y = ns.define("y", -meq("Freq").def()).unwrap();
        let children = y.children();
        assert!(children.is_resolved());

        let z = ns
            .define("z", meq("Negate").with().children(children.clone()).build())
            .unwrap();
        assert_eq!(z.children(), children);
        assert!(!ns.contains("(freq)1"));
        assert_eq!(ns.len(), 3);
        assert_eq!(ns.make_unique_name("freq"), "(freq)1");
    }

    #[test]
    fn test_anonymous_bind_of_handle_returns_it() {
        let ns = testing_scope();
        let x = ns.define("x", parm(1.0)).unwrap();
        assert_eq!(ns.bind(&x).unwrap(), x);
    }

    #[test]
    fn test_qualify_returns_same_node_for_same_name() {
        let ns = testing_scope();
        let s = ns.node("s");
        let q = Qualifiers::new().with("a").with("b");
        let first = s.qualify(&q);
        let second = s.qualify(&q);
        assert_eq!(first, second);
        assert_eq!(first.name(), "s:a:b");
        assert_eq!(first.basename(), "s");
        assert_eq!(first.qualify(&Qualifiers::new().with("c")).name(), "s:a:b:c");
    }

    #[test]
    fn test_qadd_appends_and_qmerge_is_idempotent() {
        let ns = testing_scope();
        let s = ns.node("s");
        let x = ns.node("x").qualify(&Qualifiers::new().with(1));

        let added = s.qadd(&[&x]);
        assert_eq!(added.name(), "s:1");
        assert_eq!(added.qadd(&[&x]).name(), "s:1:1");

        let merged = s.qmerge(&[&x]);
        assert_eq!(merged.qmerge(&[&x]), merged);
        assert_eq!(merged.name(), "s:1");
    }

    #[test]
    fn test_qmerge_of_several_nodes() {
        let ns = testing_scope();
        let x = ns.node("x").qualify(&Qualifiers::new().with(1).with_kw("f", 2));
        let y = ns.node("y").qualify(&Qualifiers::new().with(1).with(3));
        assert_eq!(ns.node("s").qmerge(&[&x, &y]).name(), "s:1:3:f=2");
    }

    #[test]
    fn test_subscope_prefixes_names() {
        let ns = testing_scope();
        let sub = ns.subscope("sub", &Qualifiers::new().with(1));
        assert_eq!(sub.name().as_deref(), Some("sub:1"));
        assert_eq!(sub.node("x").name(), "sub:1::x");
        let inner = sub.subscope("inner", &Qualifiers::new());
        assert_eq!(inner.node("y").name(), "sub:1::inner::y");
        assert_eq!(ns.name(), None);
    }

    #[test]
    fn test_subscope_shares_repository() {
        let ns = testing_scope();
        let sub = ns.subscope("sub", &Qualifiers::new());
        let x = sub.define("x", parm(1.0)).unwrap();
        assert_eq!(ns.get("sub::x"), Some(x));
        let y = ns
            .define("y", meq("Negate").with().child("sub::x").build())
            .unwrap();
        assert!(y.initialized());
    }

    #[test]
    fn test_generated_names_live_in_the_scope() {
        let ns = testing_scope();
        let sub = ns.subscope("sub", &Qualifiers::new());
        let x = sub.define("x", parm(1.0)).unwrap();
        assert_eq!(sub.bind(-&x).unwrap().name(), "sub::negate(sub::x)");
        assert_eq!(sub.bind(meq("Freq").def()).unwrap().name(), "sub::(freq)");
    }
}
