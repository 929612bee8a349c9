//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two amounts of
/// `10.00` are the same amount, whereas two lots holding ten units each are
/// distinct entities. To "modify" a value object, create a new one.
///
/// ```ignore
/// let a = Money::new(dec!(10.00));
/// let b = Money::new(dec!(10.004));
/// assert_eq!(a, b); // both round to 10.00
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
