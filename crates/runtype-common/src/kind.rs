//! Nominal runtime kinds.
//!
//! Every `Value` carries a `Kind`: a named runtime tag with zero or more
//! parent kinds. The subkind relation is the reflexive-transitive closure of
//! the parent links, which makes it the nominal subtype relation that leaf
//! type expressions are compared with.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};

static NEXT_KIND_ID: AtomicU32 = AtomicU32::new(0);

/// A nominal runtime kind such as `int`, `list` or a user record class.
///
/// Kinds are identified by a process-unique id, never by name: two kinds
/// created separately under the same name are distinct. Cloning is cheap.
#[derive(Clone)]
pub struct Kind(Arc<KindData>);

struct KindData {
    id: u32,
    name: String,
    parents: Vec<Kind>,
}

impl Kind {
    /// Create a new nominal kind below `parents`.
    ///
    /// An empty parent list places the kind directly under `object`.
    pub fn new(name: impl Into<String>, parents: Vec<Kind>) -> Kind {
        let parents = if parents.is_empty() {
            vec![Kind::object()]
        } else {
            parents
        };
        Kind::with_parents(name, parents)
    }

    fn with_parents(name: impl Into<String>, parents: Vec<Kind>) -> Kind {
        Kind(Arc::new(KindData {
            id: NEXT_KIND_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            parents,
        }))
    }

    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Direct parents of this kind.
    pub fn parents(&self) -> &[Kind] {
        &self.0.parents
    }

    /// Whether `self` is `other` or a (transitive) descendant of it.
    pub fn is_subkind_of(&self, other: &Kind) -> bool {
        if self == other {
            return true;
        }
        // Diamonds are possible, so track what has been walked.
        let mut seen = FxHashSet::default();
        let mut stack: Vec<&Kind> = self.parents().iter().collect();
        while let Some(kind) = stack.pop() {
            if kind == other {
                return true;
            }
            if seen.insert(kind.id()) {
                stack.extend(kind.parents());
            }
        }
        false
    }

    /// The root of the built-in hierarchy.
    pub fn object() -> Kind {
        builtins().object.clone()
    }

    pub fn null() -> Kind {
        builtins().null.clone()
    }

    pub fn bool() -> Kind {
        builtins().bool.clone()
    }

    /// Abstract parent of `int` and `float`.
    pub fn number() -> Kind {
        builtins().number.clone()
    }

    pub fn int() -> Kind {
        builtins().int.clone()
    }

    pub fn float() -> Kind {
        builtins().float.clone()
    }

    pub fn str() -> Kind {
        builtins().str.clone()
    }

    pub fn bytes() -> Kind {
        builtins().bytes.clone()
    }

    pub fn callable() -> Kind {
        builtins().callable.clone()
    }

    pub fn iterable() -> Kind {
        builtins().iterable.clone()
    }

    pub fn sequence() -> Kind {
        builtins().sequence.clone()
    }

    pub fn list() -> Kind {
        builtins().list.clone()
    }

    pub fn tuple() -> Kind {
        builtins().tuple.clone()
    }

    pub fn set() -> Kind {
        builtins().set.clone()
    }

    pub fn mapping() -> Kind {
        builtins().mapping.clone()
    }

    pub fn dict() -> Kind {
        builtins().dict.clone()
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Kind {}

impl std::hash::Hash for Kind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({}#{})", self.0.name, self.0.id)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.name)
    }
}

// ---------------------------------------------------------------------------
// Built-in hierarchy
// ---------------------------------------------------------------------------

struct Builtins {
    object: Kind,
    null: Kind,
    bool: Kind,
    number: Kind,
    int: Kind,
    float: Kind,
    str: Kind,
    bytes: Kind,
    callable: Kind,
    iterable: Kind,
    sequence: Kind,
    list: Kind,
    tuple: Kind,
    set: Kind,
    mapping: Kind,
    dict: Kind,
}

static BUILTINS: OnceLock<Builtins> = OnceLock::new();

fn builtins() -> &'static Builtins {
    BUILTINS.get_or_init(|| {
        let object = Kind::with_parents("object", Vec::new());
        let under = |name: &str, parent: &Kind| Kind::with_parents(name, vec![parent.clone()]);

        let number = under("number", &object);
        let iterable = under("iterable", &object);
        let sequence = under("sequence", &iterable);
        let mapping = under("mapping", &iterable);

        Builtins {
            null: under("null", &object),
            bool: under("bool", &object),
            int: under("int", &number),
            float: under("float", &number),
            str: under("str", &object),
            bytes: under("bytes", &object),
            callable: under("callable", &object),
            list: under("list", &sequence),
            tuple: under("tuple", &sequence),
            set: under("set", &iterable),
            dict: under("dict", &mapping),
            number,
            iterable,
            sequence,
            mapping,
            object,
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────────────
