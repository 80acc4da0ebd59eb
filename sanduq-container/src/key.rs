//! Dependency identification keys.
//!
//! [`Key`] identifies a dependency within a container. Any value with
//! stable equality and hashing can serve as a key: strings, numbers,
//! tuples, user types or type tokens built with [`Key::of`].

use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sanduq_support::rendering::short_type_name;

/// Object-safe view of a hashable key value.
trait KeyValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_key(&self, other: &dyn KeyValue) -> bool;
    fn hash_key(&self, state: &mut dyn Hasher);
    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> KeyValue for T
where
    T: Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_key(&self, other: &dyn KeyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A key standing for a Rust type.
#[derive(Clone, Copy)]
struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", short_type_name(self.name))
    }
}

/// Identifies a dependency in a container.
///
/// Keys are cheap to clone. Two keys are equal when they wrap values of
/// the same type that compare equal; string keys compare by content no
/// matter whether they were built from `&'static str` or `String`.
///
/// # Examples
/// ```
/// use sanduq_container::key::Key;
///
/// assert_eq!(Key::from("db"), Key::from(String::from("db")));
/// assert_ne!(Key::from(1_i32), Key::from(1_i64));
///
/// struct Database;
/// assert_eq!(Key::of::<Database>(), Key::of::<Database>());
/// assert_eq!(Key::from("db").as_str(), Some("db"));
/// ```
#[derive(Clone)]
pub struct Key(Arc<dyn KeyValue>);

impl Key {
    /// Wraps any hashable value as a key.
    ///
    /// String values (`&'static str`, `String`) are normalized so that they
    /// equal the keys produced by `Key::from`.
    pub fn new<T>(value: T) -> Self
    where
        T: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        let any: &dyn Any = &value;
        if let Some(s) = any.downcast_ref::<&'static str>() {
            return Self::text(Cow::Borrowed(*s));
        }
        if let Some(s) = any.downcast_ref::<String>() {
            return Self::text(Cow::Owned(s.clone()));
        }
        Key(Arc::new(value))
    }

    /// Creates a type token key for `T`.
    ///
    /// ```
    /// use sanduq_container::key::Key;
    ///
    /// trait Clock {}
    /// let key = Key::of::<dyn Clock>();
    /// assert_eq!(key.to_string(), "<dyn Clock>");
    /// ```
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key(Arc::new(TypeToken {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }))
    }

    fn text(text: Cow<'static, str>) -> Self {
        Key(Arc::new(text))
    }

    /// Returns the key as a string slice if it is a string key.
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .as_any()
            .downcast_ref::<Cow<'static, str>>()
            .map(|s| s.as_ref())
    }

    /// Returns the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_key(&*other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_key(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        self.0.fmt_key(f)?;
        write!(f, ")")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_key(f)
    }
}

impl From<&'static str> for Key {
    fn from(value: &'static str) -> Self {
        Key::text(Cow::Borrowed(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::text(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for Key {
    fn from(value: Cow<'static, str>) -> Self {
        Key::text(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

macro_rules! key_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Key(Arc::new(value))
                }
            }
        )*
    };
}

key_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, ());

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Token(u8);

    #[test]
    fn string_keys_compare_by_content() {
        assert_eq!(Key::from("a"), Key::from(String::from("a")));
        assert_eq!(Key::new("a"), Key::from("a"));
        assert_eq!(Key::new(String::from("a")), Key::from("a"));
        assert_ne!(Key::from("a"), Key::from("b"));
    }

    #[test]
    fn different_types_never_equal() {
        assert_ne!(Key::from(1_u8), Key::from(1_u16));
        assert_ne!(Key::from("1"), Key::from(1_i32));
    }

    #[test]
    fn custom_and_tuple_keys() {
        assert_eq!(Key::new(Token(1)), Key::new(Token(1)));
        assert_ne!(Key::new(Token(1)), Key::new(Token(2)));
        assert_eq!(Key::new((1, "x", true)), Key::new((1, "x", true)));
        assert_eq!(Key::from(()), Key::new(()));
    }

    #[test]
    fn type_tokens() {
        struct A;
        struct B;
        assert_eq!(Key::of::<A>(), Key::of::<A>());
        assert_ne!(Key::of::<A>(), Key::of::<B>());
        assert!(Key::of::<A>().to_string().contains('A'));
    }

    #[test]
    fn key_in_hashmap() {
        let mut map = HashMap::new();
        map.insert(Key::from("string"), 1);
        map.insert(Key::from(42_i32), 2);
        map.insert(Key::of::<String>(), 3);
        assert_eq!(map.get(&Key::from(String::from("string"))), Some(&1));
        assert_eq!(map.get(&Key::from(42_i32)), Some(&2));
        assert_eq!(map.get(&Key::of::<String>()), Some(&3));
        assert_eq!(map.get(&Key::from(42_i64)), None);
    }

    #[test]
    fn as_str_only_for_strings() {
        assert_eq!(Key::from("magic").as_str(), Some("magic"));
        assert_eq!(Key::from(7_u32).as_str(), None);
        assert_eq!(Key::new(Token(3)).downcast_ref::<Token>(), Some(&Token(3)));
    }

    #[test]
    fn display_and_debug() {
        assert_eq!(Key::from("magic").to_string(), "\"magic\"");
        assert_eq!(format!("{:?}", Key::from(3_u8)), "Key(3)");
    }
}
