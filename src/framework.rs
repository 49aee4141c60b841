//! Knowledge about platform classes used when classifying side effects.

use once_cell::sync::Lazy;
use std::collections::HashSet;

// Classes whose allocation and static initialisation have no observable effect.
static SAFE_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Ljava/lang/Object;",
        "Ljava/lang/String;",
        "Ljava/lang/StringBuilder;",
        "Ljava/lang/StringBuffer;",
        "Ljava/lang/Boolean;",
        "Ljava/lang/Byte;",
        "Ljava/lang/Character;",
        "Ljava/lang/Short;",
        "Ljava/lang/Integer;",
        "Ljava/lang/Long;",
        "Ljava/lang/Float;",
        "Ljava/lang/Double;",
        "Ljava/lang/Math;",
        "Ljava/lang/StrictMath;",
        "Ljava/lang/Exception;",
        "Ljava/lang/RuntimeException;",
        "Ljava/lang/IllegalArgumentException;",
        "Ljava/lang/IllegalStateException;",
        "Ljava/lang/NullPointerException;",
        "Ljava/math/BigInteger;",
        "Ljava/math/BigDecimal;",
        "Ljava/util/ArrayList;",
        "Ljava/util/HashMap;",
        "Ljava/util/HashSet;",
        "Ljava/util/LinkedList;",
    ])
});

// Classes whose methods neither mutate their arguments nor touch global state.
static IMMUTABLE_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Ljava/lang/String;",
        "Ljava/lang/Boolean;",
        "Ljava/lang/Byte;",
        "Ljava/lang/Character;",
        "Ljava/lang/Short;",
        "Ljava/lang/Integer;",
        "Ljava/lang/Long;",
        "Ljava/lang/Float;",
        "Ljava/lang/Double;",
        "Ljava/lang/Math;",
        "Ljava/lang/StrictMath;",
        "Ljava/math/BigInteger;",
        "Ljava/math/BigDecimal;",
    ])
});

/// True when instantiating the class, or reading its static fields, cannot be observed.
pub fn is_safe_class(class: &str) -> bool {
    SAFE_CLASSES.contains(class)
}

/// True when every method of the class is free of side effects.
pub fn is_immutable_class(class: &str) -> bool {
    IMMUTABLE_CLASSES.contains(class)
}
