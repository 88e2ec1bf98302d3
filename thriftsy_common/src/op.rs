/// Derives operator impls for single-field integer newtypes such as [`crate::Paisa`].
///
/// * `binary`: `T op T -> T`
/// * `inplace`: `T op= T`
/// * `unary`: `op T -> T`
/// * `scale`: `T op <scalar> -> T`, e.g. a unit price times a quantity
/// * `sum`: `impl Sum for T`, starting from `T::default()`
#[macro_export]
macro_rules! op {
    (binary $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl $op_trait for $newtype {
            type Output = Self;

            fn $op_fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$op_fn(rhs.0))
            }
        }
    };

    (inplace $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl $op_trait for $newtype {
            fn $op_fn(&mut self, rhs: Self) {
                self.0.$op_fn(rhs.0)
            }
        }
    };

    (unary $newtype:ident, $op_trait:ident, $op_fn:ident) => {
        impl $op_trait for $newtype {
            type Output = Self;

            fn $op_fn(self) -> Self::Output {
                Self(self.0.$op_fn())
            }
        }
    };

    (scale $newtype:ident, $scalar:ty, $op_trait:ident, $op_fn:ident) => {
        impl $op_trait<$scalar> for $newtype {
            type Output = Self;

            fn $op_fn(self, rhs: $scalar) -> Self::Output {
                Self(self.0.$op_fn(rhs))
            }
        }
    };

    (sum $newtype:ident) => {
        impl ::std::iter::Sum for $newtype {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), |acc, v| Self(acc.0 + v.0))
            }
        }
    };
}
