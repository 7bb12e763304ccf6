/// Tests for defining and resolving whole trees through `tdl::define`
#[cfg(test)]
mod define_tests {
    use crate::utils::{init_logging, parm};
    use anyhow::anyhow;
    use tdl::{Settings, TdlError, define, resolve_scope};
    use tdl_nodes::meq;
    use tdl_repository::{NodeError, NodeScope, RepositoryOptions};

    #[test]
    fn test_define_resolves_kept_roots() {
        init_logging();
        let forest = define(&Settings::default(), |ns| {
            let a = ns.define("a", parm(1.0))?;
            let b = ns.define("b", parm(2.0))?;
            let sum = ns.define("sum", &a + &b)?;
            ns.define("scratch", parm(0.0))?;
            ns.add_root(&sum);
            Ok(())
        })
        .unwrap();
        assert_eq!(forest.roots, vec!["sum".to_string()]);
        assert_eq!(forest.len(), 3);
        assert!(forest.get("scratch").is_none());
    }

    #[test]
    fn test_failing_tree_carries_cumulative_error() {
        init_logging();
        let err = define(&Settings::default(), |ns| {
            ns.define("p", meq("Negate").with().child("missing").build())?;
            ns.define("q", meq("Negate").with().child("absent").build())?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("Failed to resolve tree"));
        let Some(TdlError::Cumulative(cumulative)) = err.downcast_ref::<TdlError>() else {
            panic!("expected a cumulative error, got {err:?}");
        };
        assert_eq!(cumulative.primary().count(), 2);
    }

    #[test]
    fn test_testing_settings_fail_in_definition() {
        init_logging();
        let settings = Settings {
            repository: RepositoryOptions::testing(),
            ..Settings::default()
        };
        let err = define(&settings, |ns| {
            ns.define("p", meq("Negate").with().child("missing").build())?;
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("Tree definition failed"));
        assert!(matches!(
            err.downcast_ref::<TdlError>(),
            Some(TdlError::Node(NodeError::ChildNotFound { .. }))
        ));
    }

    #[test]
    fn test_definition_error_is_wrapped() {
        init_logging();
        let err = define(&Settings::default(), |_| Err(anyhow!("no sources"))).unwrap_err();
        assert_eq!(err.to_string(), "Tree definition failed");
        assert_eq!(err.root_cause().to_string(), "no sources");
    }

    #[test]
    fn test_resolve_scope_with_subscopes() {
        init_logging();
        let ns = NodeScope::default();
        let station = ns.subscope("station", &tdl_nodes::Qualifiers::new().with(1));
        let gain = station.define("gain", parm(1.0)).unwrap();
        let total = ns.define("total", gain.abs()).unwrap();
        let forest = resolve_scope(&ns).unwrap();
        assert_eq!(forest.roots, vec![total.name().to_string()]);
        assert!(forest.get("station:1::gain").is_some());
    }

    #[test]
    fn test_settings_file_drives_definition() {
        init_logging();
        let path = std::env::temp_dir().join(format!("tdl-settings-{}.toml", std::process::id()));
        std::fs::write(&path, "[repository]\norphans_are_roots = true\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let forest = define(&settings, |ns| {
            ns.define("x", parm(1.0))?;
            ns.define("y", parm(2.0))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(forest.roots, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_missing_settings_file() {
        let path = std::env::temp_dir().join("tdl-settings-does-not-exist.toml");
        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read settings"));
    }
}
