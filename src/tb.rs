//! Contains the [`Bool`] trait and its two implementations [`True`] and
//! [`False`], used as type parameters to track which required fields an
//! [`InvoiceBuilder`](crate::InvoiceBuilder) has already been given.

/// Type-level boolean
pub trait Bool {}

/// Type-level `true`
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct True {}

/// Type-level `false`
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct False {}

impl Bool for True {}
impl Bool for False {}
