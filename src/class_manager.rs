//! Type ancestry of local and platform classes.

use crate::error::UnknownAncestors;
use crate::types::TypeSignature;
use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

const OBJECT: &str = "Ljava/lang/Object;";

/// Header of a class defined by the code being analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalClass {
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
}

impl LocalClass {
    pub fn new(name: &str, super_class: Option<&str>, interfaces: &[&str]) -> Self {
        LocalClass {
            name: name.to_string(),
            super_class: super_class.map(|s| s.to_string()),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Superclass first, then the declared interfaces.
    pub fn direct_parents(&self) -> Vec<String> {
        self.super_class.iter().chain(self.interfaces.iter()).cloned().collect()
    }
}

/// Where ancestry of types outside the analysed code comes from.
pub trait PlatformTypeSource {
    /// Direct parents of `class_name`, `None` when the type is not known at all.
    fn direct_parents(&self, class_name: &str) -> Option<Vec<String>>;
}

static BUILTIN_TYPES: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let number = vec!["Ljava/lang/Number;", "Ljava/lang/Comparable;"];
    HashMap::from([
        (OBJECT, vec![]),
        ("Ljava/io/Serializable;", vec![]),
        ("Ljava/lang/Comparable;", vec![]),
        ("Ljava/lang/CharSequence;", vec![]),
        ("Ljava/lang/Appendable;", vec![]),
        ("Ljava/lang/Cloneable;", vec![]),
        ("Ljava/lang/Runnable;", vec![]),
        ("Ljava/lang/Iterable;", vec![]),
        ("Ljava/util/RandomAccess;", vec![]),
        ("Ljava/util/Map;", vec![]),
        ("Ljava/util/Collection;", vec!["Ljava/lang/Iterable;"]),
        ("Ljava/util/List;", vec!["Ljava/util/Collection;"]),
        ("Ljava/util/Set;", vec!["Ljava/util/Collection;"]),
        (
            "Ljava/lang/String;",
            vec![OBJECT, "Ljava/io/Serializable;", "Ljava/lang/Comparable;", "Ljava/lang/CharSequence;"],
        ),
        (
            "Ljava/lang/StringBuilder;",
            vec![OBJECT, "Ljava/io/Serializable;", "Ljava/lang/CharSequence;", "Ljava/lang/Appendable;"],
        ),
        ("Ljava/lang/Class;", vec![OBJECT, "Ljava/io/Serializable;"]),
        ("Ljava/lang/Math;", vec![OBJECT]),
        ("Ljava/lang/Number;", vec![OBJECT, "Ljava/io/Serializable;"]),
        ("Ljava/lang/Boolean;", vec![OBJECT, "Ljava/io/Serializable;", "Ljava/lang/Comparable;"]),
        ("Ljava/lang/Character;", vec![OBJECT, "Ljava/io/Serializable;", "Ljava/lang/Comparable;"]),
        ("Ljava/lang/Byte;", number.clone()),
        ("Ljava/lang/Short;", number.clone()),
        ("Ljava/lang/Integer;", number.clone()),
        ("Ljava/lang/Long;", number.clone()),
        ("Ljava/lang/Float;", number.clone()),
        ("Ljava/lang/Double;", number),
        ("Ljava/lang/Void;", vec![OBJECT]),
        ("Ljava/lang/Throwable;", vec![OBJECT, "Ljava/io/Serializable;"]),
        ("Ljava/lang/Exception;", vec!["Ljava/lang/Throwable;"]),
        ("Ljava/lang/Error;", vec!["Ljava/lang/Throwable;"]),
        ("Ljava/lang/RuntimeException;", vec!["Ljava/lang/Exception;"]),
        ("Ljava/lang/IllegalArgumentException;", vec!["Ljava/lang/RuntimeException;"]),
        ("Ljava/lang/IllegalStateException;", vec!["Ljava/lang/RuntimeException;"]),
        ("Ljava/lang/NullPointerException;", vec!["Ljava/lang/RuntimeException;"]),
        ("Ljava/lang/ClassCastException;", vec!["Ljava/lang/RuntimeException;"]),
        ("Ljava/lang/ArithmeticException;", vec!["Ljava/lang/RuntimeException;"]),
        ("Ljava/io/IOException;", vec!["Ljava/lang/Exception;"]),
        ("Ljava/util/AbstractCollection;", vec![OBJECT, "Ljava/util/Collection;"]),
        ("Ljava/util/AbstractList;", vec!["Ljava/util/AbstractCollection;", "Ljava/util/List;"]),
        ("Ljava/util/AbstractSet;", vec!["Ljava/util/AbstractCollection;", "Ljava/util/Set;"]),
        ("Ljava/util/AbstractMap;", vec![OBJECT, "Ljava/util/Map;"]),
        (
            "Ljava/util/ArrayList;",
            vec![
                "Ljava/util/AbstractList;",
                "Ljava/util/List;",
                "Ljava/util/RandomAccess;",
                "Ljava/lang/Cloneable;",
                "Ljava/io/Serializable;",
            ],
        ),
        (
            "Ljava/util/HashSet;",
            vec!["Ljava/util/AbstractSet;", "Ljava/util/Set;", "Ljava/lang/Cloneable;", "Ljava/io/Serializable;"],
        ),
        (
            "Ljava/util/HashMap;",
            vec!["Ljava/util/AbstractMap;", "Ljava/util/Map;", "Ljava/lang/Cloneable;", "Ljava/io/Serializable;"],
        ),
    ])
});

/// Ancestry of common `java.lang`, `java.util` and `java.io` types.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPlatformTypes;

impl PlatformTypeSource for BuiltinPlatformTypes {
    fn direct_parents(&self, class_name: &str) -> Option<Vec<String>> {
        BUILTIN_TYPES
            .get(class_name)
            .map(|parents| parents.iter().map(|p| p.to_string()).collect())
    }
}

/// Memoises lookups against a [`PlatformTypeSource`], including misses.
pub struct PlatformTypeCache {
    source: Box<dyn PlatformTypeSource>,
    cache: HashMap<String, Option<Vec<String>>>,
}

impl PlatformTypeCache {
    pub fn new(source: Box<dyn PlatformTypeSource>) -> Self {
        PlatformTypeCache {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn direct_parents(&mut self, class_name: &str) -> Option<Vec<String>> {
        if let Some(cached) = self.cache.get(class_name) {
            return cached.clone();
        }
        let parents = self.source.direct_parents(class_name);
        self.cache.insert(class_name.to_string(), parents.clone());
        parents
    }

    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }
}

impl Default for PlatformTypeCache {
    fn default() -> Self {
        PlatformTypeCache::new(Box::new(BuiltinPlatformTypes))
    }
}

/// Local class table plus platform type information.
#[derive(Default)]
pub struct ClassManager {
    local_classes: HashMap<String, LocalClass>,
    platform: PlatformTypeCache,
}

impl ClassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform_source(source: Box<dyn PlatformTypeSource>) -> Self {
        ClassManager {
            local_classes: HashMap::new(),
            platform: PlatformTypeCache::new(source),
        }
    }

    pub fn add_local_class(&mut self, class: LocalClass) {
        debug!("adding local class {}", class.name);
        self.local_classes.insert(class.name.clone(), class);
    }

    pub fn is_local(&self, class_name: &str) -> bool {
        self.local_classes.contains_key(class_name)
    }

    pub fn local_class(&self, class_name: &str) -> Option<&LocalClass> {
        self.local_classes.get(class_name)
    }

    pub fn platform_cache(&self) -> &PlatformTypeCache {
        &self.platform
    }

    fn direct_parents(&mut self, class_name: &str) -> Result<Vec<String>, UnknownAncestors> {
        if let Some(local) = self.local_classes.get(class_name) {
            return Ok(local.direct_parents());
        }
        self.platform
            .direct_parents(class_name)
            .ok_or_else(|| UnknownAncestors::new(class_name))
    }

    /// Every type `class_name` descends from, itself excluded.
    ///
    /// Unresolvable types on the way are skipped, the first one is reported when nothing else
    /// could be resolved either.
    pub fn ancestors(&mut self, class_name: &str) -> Result<BTreeSet<String>, UnknownAncestors> {
        let (ancestors, unresolved) = self.walk_ancestors(class_name, None);
        match unresolved {
            Some(e) if ancestors.is_empty() => Err(e),
            _ => Ok(ancestors),
        }
    }

    // Walks the parent closure until `target` shows up. Returns what was found plus the first
    // type whose ancestry could not be resolved.
    fn walk_ancestors(
        &mut self,
        class_name: &str,
        target: Option<&str>,
    ) -> (BTreeSet<String>, Option<UnknownAncestors>) {
        let mut found = BTreeSet::new();
        let mut unresolved = None;
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![class_name.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            match self.direct_parents(&current) {
                Ok(parents) => {
                    for parent in parents {
                        if target == Some(parent.as_str()) {
                            found.insert(parent);
                            return (found, None);
                        }
                        if !visited.contains(&parent) {
                            found.insert(parent.clone());
                            stack.push(parent);
                        }
                    }
                }
                Err(e) => {
                    if unresolved.is_none() {
                        unresolved = Some(e);
                    }
                }
            }
        }
        (found, unresolved)
    }

    /// Whether a value of type `child` can be used where `target` is expected.
    ///
    /// Array types are compared by their element type and primitives through their wrapper
    /// classes. `Err` means some ancestry on the way could not be resolved and `target` was
    /// not found elsewhere, which is not the same as `Ok(false)`.
    pub fn is_instance(&mut self, child: &str, target: &str) -> Result<bool, UnknownAncestors> {
        let child = reduce_type(child);
        let target = reduce_type(target);

        if child == target || target == OBJECT {
            return Ok(true);
        }

        match self.walk_ancestors(&child, Some(&target)) {
            (found, _) if found.contains(&target) => Ok(true),
            (_, Some(e)) => {
                warn!("{e} while checking {child} against {target}");
                Err(e)
            }
            (_, None) => Ok(false),
        }
    }
}

// Base element type, boxed when primitive.
fn reduce_type(descriptor: &str) -> String {
    match TypeSignature::from_jni(descriptor) {
        Ok(t) => t.base_type().boxed_jni(),
        Err(_) => descriptor.to_string(),
    }
}
