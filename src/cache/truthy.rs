//! Default validation for cached values.

use std::collections::HashMap;
use std::sync::Arc;

// == Truthy ==
/// Values that can say whether they are worth caching.
///
/// Used as the default validator of a `TtlCell`: empty collections, empty
/// strings, `None`, `false` and zero are rejected.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V, S> Truthy for HashMap<K, V, S> {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

impl<T: Truthy + ?Sized> Truthy for Arc<T> {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

macro_rules! impl_truthy_for_numbers {
    ($($ty:ty),*) => {
        $(
            impl Truthy for $ty {
                fn is_truthy(&self) -> bool {
                    *self != 0
                }
            }
        )*
    };
}

impl_truthy_for_numbers!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings() {
        assert!("x".to_string().is_truthy());
        assert!(!String::new().is_truthy());
        assert!(!"".is_truthy());
    }

    #[test]
    fn test_options_and_collections() {
        assert!(!None::<String>.is_truthy());
        assert!(!Some(String::new()).is_truthy());
        assert!(Some(vec![1]).is_truthy());
        assert!(!Vec::<u8>::new().is_truthy());
        assert!(!HashMap::<String, String>::new().is_truthy());
    }

    #[test]
    fn test_numbers_and_bools() {
        assert!(!0u32.is_truthy());
        assert!((-3i64).is_truthy());
        assert!(true.is_truthy());
        assert!(!false.is_truthy());
        assert!(Arc::new(7usize).is_truthy());
    }
}
