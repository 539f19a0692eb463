//! Quantity recipes and the registry that maps canonical names to them.
//!
//! A canonical quantity is either a [`Direct`](QuantityRecipe::Direct) alias
//! of one native column, or [`Derived`](QuantityRecipe::Derived) from one or
//! more native columns through a pure [`Transform`]. Any recipe that changes
//! values, even with a single source, is `Derived`: that is how the
//! introspector knows the native units no longer apply.

use std::collections::BTreeMap;
use std::fmt;

use crate::column::Column;
use crate::error::{CatalogError, Result};

pub type UnaryFn = fn(&Column) -> Result<Column>;
pub type BinaryFn = fn(&Column, &Column) -> Result<Column>;

#[derive(Clone, Copy)]
enum TransformFn {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

/// A named, pure function of a fixed number of native columns.
///
/// Two transforms compare equal when their names and arities match.
#[derive(Clone, Copy)]
pub struct Transform {
    name: &'static str,
    func: TransformFn,
}

impl Transform {
    pub const fn unary(name: &'static str, func: UnaryFn) -> Self {
        Self {
            name,
            func: TransformFn::Unary(func),
        }
    }

    pub const fn binary(name: &'static str, func: BinaryFn) -> Self {
        Self {
            name,
            func: TransformFn::Binary(func),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of source columns the function takes.
    pub fn arity(&self) -> usize {
        match self.func {
            TransformFn::Unary(_) => 1,
            TransformFn::Binary(_) => 2,
        }
    }

    /// Applies the function to `args` positionally.
    pub fn apply(&self, args: &[Column]) -> Result<Column> {
        match (self.func, args) {
            (TransformFn::Unary(f), [a]) => f(a),
            (TransformFn::Binary(f), [a, b]) => f(a, b),
            _ => Err(CatalogError::ArityMismatch {
                transform: self.name,
                expected: self.arity(),
                got: args.len(),
            }),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity())
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity() == other.arity()
    }
}

/// Native sources plus the transform that combines them.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecipe {
    transform: Transform,
    sources: Vec<String>,
}

impl DerivedRecipe {
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuantityRecipe {
    /// Passthrough of a single native column path.
    Direct(String),
    Derived(DerivedRecipe),
}

impl QuantityRecipe {
    pub fn direct(path: impl Into<String>) -> Self {
        QuantityRecipe::Direct(path.into())
    }

    /// Builds a derived recipe, checking that `sources` matches the
    /// transform's arity.
    pub fn derived(transform: Transform, sources: &[&str]) -> Result<Self> {
        if sources.len() != transform.arity() {
            return Err(CatalogError::ArityMismatch {
                transform: transform.name(),
                expected: transform.arity(),
                got: sources.len(),
            });
        }
        Ok(QuantityRecipe::Derived(DerivedRecipe {
            transform,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }))
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, QuantityRecipe::Derived(_))
    }

    /// Zero-length column of the type this recipe yields.
    ///
    /// Derived recipes run their transform over empty float sources. Direct
    /// recipes yield floats, since the stored type is unknown without data.
    pub fn empty_column(&self) -> Result<Column> {
        match self {
            QuantityRecipe::Direct(_) => Ok(Column::Float(Vec::new())),
            QuantityRecipe::Derived(d) => {
                let args = vec![Column::Float(Vec::new()); d.transform.arity()];
                d.transform.apply(&args)
            }
        }
    }

    /// Native column paths this recipe reads, in argument order.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            QuantityRecipe::Direct(path) => vec![path.as_str()],
            QuantityRecipe::Derived(d) => d.sources.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for QuantityRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityRecipe::Direct(path) => write!(f, "{}", path),
            QuantityRecipe::Derived(d) => {
                write!(f, "{}({})", d.transform.name(), d.sources.join(", "))
            }
        }
    }
}

/// Canonical name to recipe mapping. Keys are unique.
///
/// A registry is assembled with [`with`](Registry::with) and is read-only
/// afterwards; version-specific edits produce a new registry through
/// [`resolve_recipes`](crate::version::resolve_recipes).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    recipes: BTreeMap<String, QuantityRecipe>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, recipe: QuantityRecipe) -> Self {
        self.recipes.insert(name.into(), recipe);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&QuantityRecipe> {
        self.recipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuantityRecipe)> {
        self.recipes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: String, recipe: QuantityRecipe) {
        self.recipes.insert(name, recipe);
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.recipes.remove(name);
    }
}

impl FromIterator<(String, QuantityRecipe)> for Registry {
    fn from_iter<I: IntoIterator<Item = (String, QuantityRecipe)>>(iter: I) -> Self {
        Self {
            recipes: iter.into_iter().collect(),
        }
    }
}
