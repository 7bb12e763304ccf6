//! Node Arithmetic
//!
//! `a + b` on definitions (and on node handles, see `tdl-repository`) is
//! shorthand for an `Add` definition with children `a` and `b`. The functions
//! here are the named forms; [`impl_node_arithmetic!`](crate::impl_node_arithmetic)
//! implements the `std::ops` traits on top of them.

use crate::{
    child::{ChildList, ChildRef},
    def::{NodeDef, meq},
    value::InitRecord,
};

fn apply(class: &str, children: Vec<ChildRef>) -> NodeDef {
    NodeDef::from_parts(
        meq(class),
        ChildList::positional(children),
        ChildList::new(),
        InitRecord::new(),
    )
}

#[must_use]
pub fn add(lhs: impl Into<ChildRef>, rhs: impl Into<ChildRef>) -> NodeDef {
    apply("Add", vec![lhs.into(), rhs.into()])
}

#[must_use]
pub fn subtract(lhs: impl Into<ChildRef>, rhs: impl Into<ChildRef>) -> NodeDef {
    apply("Subtract", vec![lhs.into(), rhs.into()])
}

#[must_use]
pub fn multiply(lhs: impl Into<ChildRef>, rhs: impl Into<ChildRef>) -> NodeDef {
    apply("Multiply", vec![lhs.into(), rhs.into()])
}

#[must_use]
pub fn divide(lhs: impl Into<ChildRef>, rhs: impl Into<ChildRef>) -> NodeDef {
    apply("Divide", vec![lhs.into(), rhs.into()])
}

#[must_use]
pub fn fmod(lhs: impl Into<ChildRef>, rhs: impl Into<ChildRef>) -> NodeDef {
    apply("FMod", vec![lhs.into(), rhs.into()])
}

#[must_use]
pub fn pow(base: impl Into<ChildRef>, exponent: impl Into<ChildRef>) -> NodeDef {
    apply("Pow", vec![base.into(), exponent.into()])
}

#[must_use]
pub fn negate(operand: impl Into<ChildRef>) -> NodeDef {
    apply("Negate", vec![operand.into()])
}

#[must_use]
pub fn abs(operand: impl Into<ChildRef>) -> NodeDef {
    apply("Abs", vec![operand.into()])
}

/// Implements `+ - * / %` (with any `Into<ChildRef>` right-hand side), unary
/// `-`, and the reflected `f64` forms for a type convertible into a child.
///
/// ```ignore
/// impl_node_arithmetic!(NodeDef);
/// impl_node_arithmetic!(<'a> &'a NodeStub);
/// ```
#[macro_export]
macro_rules! impl_node_arithmetic {
    (@binary [$($lt:lifetime)?] $t:ty, $trait:ident, $method:ident, $func:ident) => {
        impl<$($lt,)? R: ::core::convert::Into<$crate::ChildRef>> ::core::ops::$trait<R> for $t {
            type Output = $crate::NodeDef;

            fn $method(self, rhs: R) -> $crate::NodeDef {
                $crate::ops::$func(self, rhs)
            }
        }

        impl<$($lt)?> ::core::ops::$trait<$t> for f64 {
            type Output = $crate::NodeDef;

            fn $method(self, rhs: $t) -> $crate::NodeDef {
                $crate::ops::$func(self, rhs)
            }
        }
    };
    (@all [$($lt:lifetime)?] $t:ty) => {
        $crate::impl_node_arithmetic!(@binary [$($lt)?] $t, Add, add, add);
        $crate::impl_node_arithmetic!(@binary [$($lt)?] $t, Sub, sub, subtract);
        $crate::impl_node_arithmetic!(@binary [$($lt)?] $t, Mul, mul, multiply);
        $crate::impl_node_arithmetic!(@binary [$($lt)?] $t, Div, div, divide);
        $crate::impl_node_arithmetic!(@binary [$($lt)?] $t, Rem, rem, fmod);

        impl<$($lt)?> ::core::ops::Neg for $t {
            type Output = $crate::NodeDef;

            fn neg(self) -> $crate::NodeDef {
                $crate::ops::negate(self)
            }
        }
    };
    (<$lt:lifetime> $t:ty) => {
        $crate::impl_node_arithmetic!(@all [$lt] $t);
    };
    ($t:ty) => {
        $crate::impl_node_arithmetic!(@all [] $t);
    };
}
