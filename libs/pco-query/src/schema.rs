//! Schema types for type-safe query building.
//!
//! - `Schema` trait: maps a resource's field enum to wire names and names the
//!   list endpoint
//! - `FieldRef`: typed field reference producing predicates
//! - `RelationRef`: typed relationship name for includes and relationship filters
//! - `AsFieldName`: accepts typed refs and plain strings wherever a field name
//!   is expected

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::ast::{CompareOp, IntoValue, Predicate};

/// Schema trait defining field enums and their string mappings.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Copy, Clone, Debug, Eq, PartialEq)]
/// enum PersonField {
///     Status,
///     CreatedAt,
/// }
///
/// struct PersonSchema;
///
/// impl Schema for PersonSchema {
///     type Field = PersonField;
///     const ENDPOINT: &'static str = "/people/v2/people";
///
///     fn field_name(field: Self::Field) -> &'static str {
///         match field {
///             PersonField::Status => "status",
///             PersonField::CreatedAt => "created_at",
///         }
///     }
/// }
/// ```
pub trait Schema {
    type Field: Copy + Eq + Debug;

    /// Path of the list endpoint, relative to the API base URL.
    const ENDPOINT: &'static str;

    fn field_name(field: Self::Field) -> &'static str;
}

/// Typed field reference.
///
/// `T` is a phantom describing the field's Rust type; it is not part of the
/// field identity.
pub struct FieldRef<S: Schema, T> {
    field: S::Field,
    _phantom: PhantomData<fn() -> (S, T)>,
}

impl<S: Schema, T> FieldRef<S, T> {
    /// ```rust,ignore
    /// pub const STATUS: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::Status);
    /// ```
    #[must_use]
    pub const fn new(field: S::Field) -> Self {
        Self {
            field,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        S::field_name(self.field)
    }

    #[must_use]
    pub fn key(&self) -> S::Field {
        self.field
    }

    fn compare<V: IntoValue>(self, op: CompareOp, value: V) -> Predicate {
        Predicate::Compare {
            field: self.name().to_owned(),
            op,
            value: value.into_value(),
        }
    }

    /// `field eq value`
    #[must_use]
    pub fn eq<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    /// `field ne value`
    #[must_use]
    pub fn ne<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    #[must_use]
    pub fn gt<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn ge<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    #[must_use]
    pub fn lt<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn le<V: IntoValue>(self, value: V) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    #[must_use]
    pub fn is_null(self) -> Predicate {
        Predicate::IsNull {
            field: self.name().to_owned(),
            negated: false,
        }
    }

    #[must_use]
    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNull {
            field: self.name().to_owned(),
            negated: true,
        }
    }

    /// `field in (values...)`
    ///
    /// ```rust,ignore
    /// let filter = STATUS.is_in(["active", "pending"]);
    /// ```
    #[must_use]
    pub fn is_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        Predicate::In {
            field: self.name().to_owned(),
            values: values.into_iter().map(IntoValue::into_value).collect(),
            negated: false,
        }
    }

    #[must_use]
    pub fn not_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        Predicate::In {
            field: self.name().to_owned(),
            values: values.into_iter().map(IntoValue::into_value).collect(),
            negated: true,
        }
    }
}

impl<S: Schema, T> Clone for FieldRef<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema, T> Copy for FieldRef<S, T> {}

impl<S: Schema, T> Debug for FieldRef<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRef")
            .field("field", &self.name())
            .finish()
    }
}

impl<S: Schema, T> PartialEq for FieldRef<S, T> {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl<S: Schema, T> Eq for FieldRef<S, T> {}

/// Typed relationship reference (`emails`, `households`, ...).
pub struct RelationRef<S: Schema> {
    name: &'static str,
    _phantom: PhantomData<fn() -> S>,
}

impl<S: Schema> RelationRef<S> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S: Schema> Clone for RelationRef<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for RelationRef<S> {}

impl<S: Schema> Debug for RelationRef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RelationRef").field(&self.name).finish()
    }
}

/// Anything usable as a field or relationship name.
#[doc(hidden)]
pub trait AsFieldName {
    fn as_field_name(&self) -> &str;
}

impl AsFieldName for str {
    fn as_field_name(&self) -> &str {
        self
    }
}

impl AsFieldName for String {
    fn as_field_name(&self) -> &str {
        self
    }
}

impl<S: Schema, T> AsFieldName for FieldRef<S, T> {
    fn as_field_name(&self) -> &str {
        self.name()
    }
}

impl<S: Schema> AsFieldName for RelationRef<S> {
    fn as_field_name(&self) -> &str {
        self.name
    }
}

impl<T: AsFieldName + ?Sized> AsFieldName for &T {
    fn as_field_name(&self) -> &str {
        (*self).as_field_name()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ast::Value;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum TestField {
        Name,
        Age,
    }

    struct TestSchema;

    impl Schema for TestSchema {
        type Field = TestField;
        const ENDPOINT: &'static str = "/test/v2/things";

        fn field_name(field: Self::Field) -> &'static str {
            match field {
                TestField::Name => "name",
                TestField::Age => "age",
            }
        }
    }

    const NAME: FieldRef<TestSchema, String> = FieldRef::new(TestField::Name);
    const AGE: FieldRef<TestSchema, i64> = FieldRef::new(TestField::Age);
    const EMAILS: RelationRef<TestSchema> = RelationRef::new("emails");

    #[test]
    fn test_field_ref_builds_predicates() {
        assert_eq!(
            NAME.eq("x"),
            Predicate::Compare {
                field: "name".to_owned(),
                op: CompareOp::Eq,
                value: Value::String("x".to_owned()),
            }
        );
        assert_eq!(
            AGE.is_in([1_i64, 2]),
            Predicate::In {
                field: "age".to_owned(),
                values: vec![Value::Int(1), Value::Int(2)],
                negated: false,
            }
        );
        assert_eq!(
            AGE.is_not_null(),
            Predicate::IsNull {
                field: "age".to_owned(),
                negated: true,
            }
        );
    }

    #[test]
    fn test_field_identity_ignores_phantom() {
        assert_eq!(NAME, FieldRef::<TestSchema, String>::new(TestField::Name));
        assert_eq!(NAME.key(), TestField::Name);
        assert_eq!(format!("{NAME:?}"), "FieldRef { field: \"name\" }");
    }

    #[test]
    fn test_as_field_name() {
        fn name_of(n: impl AsFieldName) -> String {
            n.as_field_name().to_owned()
        }
        assert_eq!(name_of("status"), "status");
        assert_eq!(name_of(String::from("status")), "status");
        assert_eq!(name_of(AGE), "age");
        assert_eq!(name_of(EMAILS), "emails");
        assert_eq!(name_of(&NAME), "name");
    }
}
