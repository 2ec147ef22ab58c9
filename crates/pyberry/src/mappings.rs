//! Class and method name tables.
//!
//! Two lookups drive call rewriting: the Python container type to its Berry
//! class, and (Berry class, Python method) to the Berry method. Both fall
//! back to the input name, so a miss is never an error.

use std::collections::HashMap;
use std::sync::LazyLock;

const CLASSES: &[(&str, &str)] = &[
    ("dict", "map"),
    ("list", "list"),
    ("bytes", "bytes"),
    ("bytearray", "bytes"),
];

const LIST_METHODS: &[(&str, &str)] = &[
    ("append", "push"),
    ("extend", "concat"),
    ("pop", "pop"),
    ("clear", "clear"),
    ("insert", "insert"),
    ("remove", "remove"),
    ("index", "index"),
    ("count", "count"),
    ("sort", "sort"),
    ("reverse", "reverse"),
    ("copy", "copy"),
    ("len", "size"),
    ("tostring", "tostring"),
    ("resize", "resize"),
    ("find", "find"),
    ("concat", "concat"),
    ("item", "item"),
    ("setitem", "setitem"),
];

const MAP_METHODS: &[(&str, &str)] = &[
    ("keys", "keys"),
    ("values", "values"),
    ("items", "items"),
    ("get", "item"),
    ("pop", "remove"),
    ("clear", "clear"),
    ("update", "update"),
    ("setdefault", "insert"),
    ("copy", "copy"),
    ("len", "size"),
    ("contains", "contains"),
    ("find", "find"),
    ("insert", "insert"),
    ("tostring", "tostring"),
];

const BYTES_METHODS: &[(&str, &str)] = &[
    ("tostring", "tostring"),
    ("fromhex", "fromhex"),
    ("resize", "resize"),
    ("concat", "concat"),
    ("len", "size"),
    ("clear", "clear"),
    ("copy", "copy"),
    ("get", "get"),
    ("set", "set"),
    ("add", "add"),
    ("asstring", "asstring"),
    ("fromstring", "fromstring"),
    ("getbits", "getbits"),
    ("setbits", "setbits"),
    ("tob64", "tob64"),
    ("fromb64", "fromb64"),
    ("getfloat", "getfloat"),
    ("setfloat", "setfloat"),
];

/// Python special methods with a Berry counterpart.
const SPECIAL_METHODS: &[(&str, &str)] = &[
    ("__init__", "init"),
    ("__str__", "tostring"),
    ("__getitem__", "item"),
    ("__setitem__", "setitem"),
];

static BUILTIN: LazyLock<MappingTable> = LazyLock::new(MappingTable::from_static);

fn owned(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// Read-only name tables shared by every translation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    classes: HashMap<String, String>,
    methods: HashMap<String, HashMap<String, String>>,
    special: HashMap<String, String>,
}

impl MappingTable {
    /// The builtin tables, built once on first use.
    pub fn builtin() -> &'static MappingTable {
        &BUILTIN
    }

    fn from_static() -> Self {
        let methods = [
            ("list", LIST_METHODS),
            ("map", MAP_METHODS),
            ("bytes", BYTES_METHODS),
        ]
        .into_iter()
        .map(|(class, table)| (class.to_string(), owned(table)))
        .collect();

        Self {
            classes: owned(CLASSES),
            methods,
            special: owned(SPECIAL_METHODS),
        }
    }

    /// Add class and method entries on top of the current tables.
    ///
    /// Method entries are keyed by the Berry class name. Later entries
    /// replace earlier ones.
    pub fn extend(
        &mut self,
        classes: impl IntoIterator<Item = (String, String)>,
        methods: impl IntoIterator<Item = (String, HashMap<String, String>)>,
    ) {
        self.classes.extend(classes);
        for (class, entries) in methods {
            self.methods.entry(class).or_default().extend(entries);
        }
    }

    pub fn resolve_class_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.classes.get(source).map_or(source, String::as_str)
    }

    pub fn resolve_method_name<'a>(&'a self, target_class: &str, method: &'a str) -> &'a str {
        self.methods
            .get(target_class)
            .and_then(|table| table.get(method))
            .map_or(method, String::as_str)
    }

    /// Whether `name` is a Python container type this table knows.
    pub fn is_container_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Berry name for a function defined in a class body.
    pub fn resolve_special_method<'a>(&'a self, name: &'a str) -> &'a str {
        self.special.get(name).map_or(name, String::as_str)
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
