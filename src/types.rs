//! Type identities and dynamically typed values
//!
//! Contracts, implementation types and parameter types are all identified by a
//! [`TypeKey`]. Values crossing the registry boundary are type-erased: bare
//! component instances travel as [`Object`], arguments and return values as
//! [`Value`].

use crate::{IocError, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A bare component instance: the concrete implementation behind an `Arc`.
pub type Object = Arc<dyn Any + Send + Sync>;

/// A dynamically typed argument or return value.
///
/// Component typed values carry `Arc<C>` where `C` is the requested contract.
pub type Value = Box<dyn Any + Send>;

/// Identity of a type, usable for sized types and `dyn Trait` contracts alike.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of type `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name as reported by the compiler
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path, e.g. `Car` for `my_app::cars::Car`
    pub fn simple_name(&self) -> &'static str {
        let name = self.name.trim_start_matches("dyn ");
        let base = name.split('<').next().unwrap_or(name);
        match base.rfind("::") {
            Some(pos) => &base[pos + 2..],
            None => base,
        }
    }

    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Box a value for the dynamic call path
#[inline]
pub fn value<T: Any + Send>(v: T) -> Value {
    Box::new(v)
}

/// Unbox a dynamic value into `T`
pub fn take_value<T: Any>(value: Value, context: &str) -> Result<T> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            IocError::invocation(
                context,
                format!("value is not a {}", std::any::type_name::<T>()),
            )
        })
}

/// Ordered argument list handed to constructors and method handlers.
///
/// Slots are taken out by index; a slot can be taken at most once.
pub struct Args {
    slots: Vec<Option<Value>>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            slots: values.into_iter().map(Some).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Take the argument at `index` as a `T`.
    pub fn take<T: Any>(&mut self, index: usize) -> Result<T> {
        let slot = self
            .slots
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| IocError::invocation("argument", format!("missing argument #{index}")))?;
        take_value(slot, "argument")
    }

    /// Take a component argument injected as `Arc<C>`.
    #[inline]
    pub fn component<C: ?Sized + Send + Sync + 'static>(&mut self, index: usize) -> Result<Arc<C>> {
        self.take::<Arc<C>>(index)
    }

    /// Take an optional component argument; soft nulls arrive as `None`.
    #[inline]
    pub fn optional<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        index: usize,
    ) -> Result<Option<Arc<C>>> {
        self.take::<Option<Arc<C>>>(index)
    }

    /// Borrow the argument at `index` without taking it
    pub fn peek<T: Any>(&self, index: usize) -> Option<&T> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|v| v.downcast_ref::<T>())
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.slots.len()).finish()
    }
}

/// Build a `Vec<Value>` from a list of expressions
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::value($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Engine: Send + Sync {}

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>(), TypeKey::of::<u32>());
        assert!(TypeKey::of::<dyn Engine>().is::<dyn Engine>());
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(TypeKey::of::<String>().simple_name(), "String");
        assert_eq!(TypeKey::of::<dyn Engine>().simple_name(), "Engine");
        assert_eq!(TypeKey::of::<Vec<u8>>().simple_name(), "Vec");
    }

    #[test]
    fn test_args_take_once() {
        let mut args = Args::new(args![7u32, String::from("x")]);
        assert_eq!(args.len(), 2);
        assert_eq!(args.peek::<u32>(0), Some(&7));
        assert_eq!(args.take::<u32>(0).unwrap(), 7);
        assert!(args.take::<u32>(0).is_err());
        assert!(args.take::<u32>(1).is_err());
    }
}
