//! Field datatypes for the structure model

/// Type name reported by the primitive a [`Varies`] holds by default.
pub const GENERIC_PRIMITIVE: &str = "GenericPrimitive";

/// Type name of a composite created on demand to hold extra components.
pub const GENERIC_COMPOSITE: &str = "GenericComposite";

/// Type name reported by [`Varies`].
pub const VARIES: &str = "Varies";

/// A field value holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Single string value
    Primitive(Primitive),

    /// Ordered sequence of component types
    Composite(Composite),

    /// Wrapper around a type chosen at runtime
    Varies(Varies),
}

/// Components appended at runtime beyond the declared ones.
///
/// Extra components are always [`Varies`] instances and are indexed from zero,
/// starting immediately after the last standard component of the owning type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraComponents {
    components: Vec<Type>,
}

/// A primitive value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    type_name: String,
    value: Option<String>,
    generic: bool,
    extra: ExtraComponents,
}

/// A composite value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    type_name: String,
    components: Vec<Type>,
    generic: bool,
    extra: ExtraComponents,
}

/// A value whose concrete type is decided at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varies {
    data: Box<Type>,
    extra: ExtraComponents,
}

impl Type {
    /// Name of the datatype (e.g. `ST`, `CE`, `Varies`)
    pub fn type_name(&self) -> &str {
        match self {
            Type::Primitive(p) => &p.type_name,
            Type::Composite(c) => &c.type_name,
            Type::Varies(_) => VARIES,
        }
    }

    /// Extra components appended to this type
    pub fn extra_components(&self) -> &ExtraComponents {
        match self {
            Type::Primitive(p) => &p.extra,
            Type::Composite(c) => &c.extra,
            Type::Varies(v) => &v.extra,
        }
    }

    /// Mutable access to the extra components of this type
    pub fn extra_components_mut(&mut self) -> &mut ExtraComponents {
        match self {
            Type::Primitive(p) => &mut p.extra,
            Type::Composite(c) => &mut c.extra,
            Type::Varies(v) => &mut v.extra,
        }
    }

    /// Check if this is a primitive
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    /// Check if this is the generic primitive a [`Varies`] starts out with
    pub fn is_generic_primitive(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.generic)
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Type::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Type::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_varies(&self) -> Option<&Varies> {
        match self {
            Type::Varies(v) => Some(v),
            _ => None,
        }
    }
}

impl ExtraComponents {
    /// Number of extra components created so far
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if no extra component was ever created
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get an existing extra component (0-based)
    pub fn get(&self, index: usize) -> Option<&Type> {
        self.components.get(index)
    }

    /// Get an extra component, creating it and any missing predecessors
    pub fn component_mut(&mut self, index: usize) -> &mut Type {
        while self.components.len() <= index {
            self.components.push(Type::Varies(Varies::new()));
        }
        &mut self.components[index]
    }
}

impl Primitive {
    /// Create an empty primitive of the given datatype
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: None,
            generic: false,
            extra: ExtraComponents::default(),
        }
    }

    /// Create the untyped primitive used as the default [`Varies`] payload
    pub fn generic() -> Self {
        Self {
            generic: true,
            ..Self::new(GENERIC_PRIMITIVE)
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Current value, `None` when never set
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }
}

impl Composite {
    /// Create a composite from its standard components
    pub fn new(type_name: impl Into<String>, components: Vec<Type>) -> Self {
        Self {
            type_name: type_name.into(),
            components,
            generic: false,
            extra: ExtraComponents::default(),
        }
    }

    /// Create an empty composite that grows its components on demand
    pub fn generic() -> Self {
        Self {
            generic: true,
            ..Self::new(GENERIC_COMPOSITE, Vec::new())
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }

    /// Standard components (for a generic composite: those created so far)
    pub fn components(&self) -> &[Type] {
        &self.components
    }

    /// Get a standard component (0-based)
    pub fn component(&self, index: usize) -> Option<&Type> {
        self.components.get(index)
    }

    /// Mutable access to a standard component (0-based).
    ///
    /// A generic composite creates missing components as [`Varies`]; a
    /// declared composite returns `None` past its last component.
    pub fn component_mut(&mut self, index: usize) -> Option<&mut Type> {
        if self.generic {
            while self.components.len() <= index {
                self.components.push(Type::Varies(Varies::new()));
            }
        }
        self.components.get_mut(index)
    }
}

impl Varies {
    /// Create a varies holding a generic primitive
    pub fn new() -> Self {
        Self::with_data(Type::Primitive(Primitive::generic()))
    }

    pub fn with_data(data: Type) -> Self {
        Self {
            data: Box::new(data),
            extra: ExtraComponents::default(),
        }
    }

    /// The wrapped type
    pub fn data(&self) -> &Type {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Type {
        &mut self.data
    }

    /// Replace the wrapped type
    pub fn set_data(&mut self, data: Type) {
        self.data = Box::new(data);
    }
}

impl Default for Varies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varies_defaults_to_generic_primitive() {
        let v = Varies::new();
        assert!(v.data().is_generic_primitive());
        assert_eq!(Type::Varies(v).type_name(), VARIES);
    }

    #[test]
    fn test_extra_components_grow_on_demand() {
        let mut extra = ExtraComponents::default();
        assert!(extra.is_empty());

        let third = extra.component_mut(2);
        assert!(matches!(third, Type::Varies(_)));
        assert_eq!(extra.len(), 3);
        assert!(extra.get(1).is_some());
        assert!(extra.get(3).is_none());
    }

    #[test]
    fn test_declared_composite_does_not_grow() {
        let mut composite = Composite::new(
            "CE",
            vec![
                Type::Primitive(Primitive::new("ST")),
                Type::Primitive(Primitive::new("ST")),
            ],
        );

        assert!(composite.component_mut(1).is_some());
        assert!(composite.component_mut(2).is_none());
        assert_eq!(composite.components().len(), 2);
    }

    #[test]
    fn test_generic_composite_grows() {
        let mut composite = Composite::generic();
        assert!(composite.component_mut(3).is_some());
        assert_eq!(composite.components().len(), 4);
        assert_eq!(composite.type_name(), GENERIC_COMPOSITE);
    }

    #[test]
    fn test_primitive_value() {
        let mut p = Primitive::new("ST");
        assert_eq!(p.value(), None);

        p.set_value(Some("Smith".to_string()));
        assert_eq!(p.value(), Some("Smith"));
        assert!(!p.is_generic());
    }
}
