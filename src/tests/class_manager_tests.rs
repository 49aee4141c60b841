#[cfg(test)]
mod tests {
    use crate::class_manager::{ClassManager, LocalClass, PlatformTypeSource};
    use crate::error::UnknownAncestors;

    const OBJECT: &str = "Ljava/lang/Object;";

    fn chain() -> ClassManager {
        let mut classes = ClassManager::new();
        classes.add_local_class(LocalClass::new("Lcom/example/A;", Some(OBJECT), &[]));
        classes.add_local_class(LocalClass::new("Lcom/example/B;", Some("Lcom/example/A;"), &[]));
        classes.add_local_class(LocalClass::new("Lcom/example/C;", Some("Lcom/example/B;"), &["Ljava/lang/Runnable;"]));
        classes
    }

    #[test]
    fn every_type_is_an_instance_of_itself() {
        let mut classes = ClassManager::new();
        assert_eq!(classes.is_instance("Lcom/example/Unknown;", "Lcom/example/Unknown;"), Ok(true));
        assert_eq!(classes.is_instance("I", "I"), Ok(true));
    }

    #[test]
    fn everything_is_an_object() {
        let mut classes = ClassManager::new();
        assert_eq!(classes.is_instance("Lcom/example/Unknown;", OBJECT), Ok(true));
        assert_eq!(classes.is_instance("[J", OBJECT), Ok(true));
    }

    #[test]
    fn local_chain_is_walked() {
        let mut classes = chain();
        assert_eq!(classes.is_instance("Lcom/example/C;", "Lcom/example/A;"), Ok(true));
        assert_eq!(classes.is_instance("Lcom/example/C;", "Ljava/lang/Runnable;"), Ok(true));
        assert_eq!(classes.is_instance("Lcom/example/A;", "Lcom/example/C;"), Ok(false));
        assert_eq!(classes.is_instance("Lcom/example/B;", "Ljava/lang/Runnable;"), Ok(false));
    }

    #[test]
    fn ancestors_cover_local_and_platform_types() {
        let mut classes = chain();
        let ancestors = classes.ancestors("Lcom/example/C;").unwrap();
        for expected in ["Lcom/example/B;", "Lcom/example/A;", OBJECT, "Ljava/lang/Runnable;"] {
            assert!(ancestors.contains(expected), "{expected}");
        }
        assert!(!ancestors.contains("Lcom/example/C;"));
        assert_eq!(
            classes.ancestors("Lcom/example/Missing;"),
            Err(UnknownAncestors::new("Lcom/example/Missing;"))
        );
    }

    #[test]
    fn interface_cycle_terminates() {
        let mut classes = ClassManager::new();
        classes.add_local_class(LocalClass::new("Lcom/example/Left;", Some(OBJECT), &["Lcom/example/Right;"]));
        classes.add_local_class(LocalClass::new("Lcom/example/Right;", Some(OBJECT), &["Lcom/example/Left;"]));

        assert_eq!(classes.is_instance("Lcom/example/Left;", "Lcom/example/Right;"), Ok(true));
        assert_eq!(classes.is_instance("Lcom/example/Left;", "Ljava/util/List;"), Ok(false));
    }

    #[test]
    fn unresolved_ancestry_is_an_error() {
        let mut classes = ClassManager::new();
        let e = classes
            .is_instance("Lcom/example/Missing;", "Ljava/util/List;")
            .unwrap_err();
        assert_eq!(e.class_name, "Lcom/example/Missing;");

        // A path that does resolve to the target still wins.
        classes.add_local_class(LocalClass::new(
            "Lcom/example/Task;",
            Some("Lcom/example/Missing;"),
            &["Ljava/lang/Runnable;"],
        ));
        assert_eq!(classes.is_instance("Lcom/example/Task;", "Ljava/lang/Runnable;"), Ok(true));
        assert!(classes.is_instance("Lcom/example/Task;", "Ljava/util/List;").is_err());
    }

    #[test]
    fn local_classes_extend_platform_types() {
        let mut classes = ClassManager::new();
        classes.add_local_class(LocalClass::new("Lcom/example/Names;", Some("Ljava/util/ArrayList;"), &[]));
        assert_eq!(classes.is_instance("Lcom/example/Names;", "Ljava/util/Collection;"), Ok(true));
        assert_eq!(classes.is_instance("Lcom/example/Names;", "Ljava/lang/Iterable;"), Ok(true));
        assert_eq!(classes.is_instance("Lcom/example/Names;", "Ljava/util/Map;"), Ok(false));
    }

    #[test]
    fn primitives_box_and_arrays_reduce() {
        let mut classes = ClassManager::new();
        assert_eq!(classes.is_instance("I", "Ljava/lang/Integer;"), Ok(true));
        assert_eq!(classes.is_instance("I", "Ljava/lang/Number;"), Ok(true));
        assert_eq!(classes.is_instance("Z", "Ljava/lang/Number;"), Ok(false));
        assert_eq!(classes.is_instance("[I", "I"), Ok(true));
        assert_eq!(classes.is_instance("[[Ljava/lang/String;", "Ljava/lang/CharSequence;"), Ok(true));
    }

    struct AndroidTypes;

    impl PlatformTypeSource for AndroidTypes {
        fn direct_parents(&self, class_name: &str) -> Option<Vec<String>> {
            match class_name {
                "Landroid/app/Activity;" => Some(vec!["Landroid/content/Context;".to_string()]),
                "Landroid/content/Context;" => Some(vec![OBJECT.to_string()]),
                OBJECT => Some(vec![]),
                _ => None,
            }
        }
    }

    #[test]
    fn custom_platform_source() {
        let mut classes = ClassManager::with_platform_source(Box::new(AndroidTypes));
        classes.add_local_class(LocalClass::new("Lcom/example/Main;", Some("Landroid/app/Activity;"), &[]));

        assert_eq!(classes.is_instance("Lcom/example/Main;", "Landroid/content/Context;"), Ok(true));
        assert!(classes.is_local("Lcom/example/Main;"));
        assert!(!classes.is_local("Landroid/app/Activity;"));
        assert!(classes.platform_cache().cached_types() >= 1);
        // The replacement source knows nothing about java.util.
        assert!(classes.is_instance("Ljava/util/ArrayList;", "Ljava/util/List;").is_err());
    }
}
