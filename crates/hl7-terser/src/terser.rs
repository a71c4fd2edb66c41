//! Path-based access to primitive values
//!
//! A [`Terser`] resolves a [`TerserPath`] with a [`SegmentFinder`] and then
//! drills field, repetition, component and subcomponent down to a primitive.
//! The associated functions on types implement the component rules shared
//! with [`deep_copy`](crate::deep_copy).

use crate::config::NavigationConfig;
use crate::path::{FieldLocation, PathElement, SegmentPath, TerserPath};
use crate::segment_finder::SegmentFinder;
use crate::{Error, Result};
use hl7_model::{Composite, Message, Primitive, StructureId, Type};
use tracing::{debug, trace};

/// Get and set message values by terse path.
///
/// Absolute paths (leading `/`) start from the message root. Relative paths
/// continue from wherever the previous lookup left the terser's finder.
pub struct Terser<'m> {
    finder: SegmentFinder<'m>,
}

impl<'m> Terser<'m> {
    pub fn new(message: &'m mut Message) -> Self {
        Self::with_config(message, NavigationConfig::default())
    }

    pub fn with_config(message: &'m mut Message, config: NavigationConfig) -> Self {
        Self {
            finder: SegmentFinder::with_config(message, config),
        }
    }

    /// The finder used for the first element of every path
    pub fn finder(&self) -> &SegmentFinder<'m> {
        &self.finder
    }

    pub fn finder_mut(&mut self) -> &mut SegmentFinder<'m> {
        &mut self.finder
    }

    pub fn message(&self) -> &Message {
        self.finder.message()
    }

    /// Value at `path`, `None` when the primitive has never been set.
    ///
    /// Segments and groups on the path are created as needed; the field
    /// itself is only read.
    pub fn get(&mut self, path: &str) -> Result<Option<String>> {
        let parsed: TerserPath = path.parse()?;
        let segment = self.resolve(&parsed.segment)?;
        let value = Self::get_value(self.finder.message(), segment, &parsed.location)?;
        trace!(path, ?value, "get");
        Ok(value)
    }

    /// Set the value at `path`, creating everything on the way
    pub fn set(&mut self, path: &str, value: impl Into<String>) -> Result<()> {
        let parsed: TerserPath = path.parse()?;
        let segment = self.resolve(&parsed.segment)?;
        let value = value.into();
        trace!(path, value = %value, "set");
        Self::set_value(self.finder.message_mut(), segment, &parsed.location, Some(value))
    }

    /// Segment addressed by a segment path such as `/.ORDER*/OBR(1)`
    pub fn segment(&mut self, path: &str) -> Result<StructureId> {
        let parsed: SegmentPath = path.parse()?;
        self.resolve(&parsed)
    }

    /// Resolve a parsed segment path.
    ///
    /// Each group element becomes the root of a fresh finder used for the
    /// next element, so the terser's own finder only moves for the first one.
    pub fn resolve(&mut self, path: &SegmentPath) -> Result<StructureId> {
        let (segment, groups) = path
            .split()
            .ok_or_else(|| Error::malformed_path("", "segment path has no elements"))?;
        if path.absolute {
            self.finder.reset();
        }

        let Some((first, rest)) = groups.split_first() else {
            return locate_segment(&mut self.finder, segment);
        };

        let config = self.finder.navigator().config().clone();
        let mut group = locate_group(&mut self.finder, first)?;
        for element in rest {
            let mut scoped = SegmentFinder::rooted(self.finder.message_mut(), group, config.clone())?;
            group = locate_group(&mut scoped, element)?;
        }
        let mut scoped = SegmentFinder::rooted(self.finder.message_mut(), group, config)?;
        let found = locate_segment(&mut scoped, segment)?;
        debug!(segment = %segment.pattern, groups = groups.len(), "resolved segment path");
        Ok(found)
    }

    /// Read a primitive of a segment without creating anything
    pub fn get_value(message: &Message, segment: StructureId, location: &FieldLocation) -> Result<Option<String>> {
        let value = message
            .try_field(segment, location.field, location.rep)?
            .and_then(|field| Self::primitive(field, location.component, location.subcomponent))
            .and_then(Primitive::value)
            .map(str::to_string);
        Ok(value)
    }

    /// Write a primitive of a segment, creating the field repetition and
    /// components as needed
    pub fn set_value(
        message: &mut Message,
        segment: StructureId,
        location: &FieldLocation,
        value: Option<String>,
    ) -> Result<()> {
        let field = message.field_mut(segment, location.field, location.rep)?;
        Self::primitive_mut(field, location.component, location.subcomponent)?.set_value(value);
        Ok(())
    }

    /// Primitive at `component`/`subcomponent` of a type, created if needed
    pub fn primitive_mut(ty: &mut Type, component: usize, subcomponent: usize) -> Result<&mut Primitive> {
        let comp = Self::component_mut(ty, component)?;
        let sub = Self::component_mut(comp, subcomponent)?;
        leaf_primitive_mut(sub)
    }

    /// Existing primitive at `component`/`subcomponent` of a type
    pub fn primitive(ty: &Type, component: usize, subcomponent: usize) -> Option<&Primitive> {
        let comp = Self::component(ty, component)?;
        let sub = Self::component(comp, subcomponent)?;
        leaf_primitive(sub)
    }

    /// Component `component` (1-based) of a type, created if needed.
    ///
    /// Components past the declared ones live in the type's extra
    /// components. A varies holding an untyped primitive is promoted to an
    /// untyped composite when a component past the first is requested.
    pub fn component_mut(ty: &mut Type, component: usize) -> Result<&mut Type> {
        if component == 0 {
            return Err(Error::structural("component numbers start at 1"));
        }
        let standard = Self::num_standard_components(ty);
        let extra = match &*ty {
            Type::Varies(_) => false,
            Type::Primitive(_) => component > 1,
            Type::Composite(composite) => !composite.is_generic() && component > standard,
        };
        if extra {
            return Ok(ty.extra_components_mut().component_mut(component - standard - 1));
        }

        match ty {
            Type::Varies(varies) => {
                if component > 1 && varies.data().is_generic_primitive() {
                    varies.set_data(Type::Composite(Composite::generic()));
                }
                Self::component_mut(varies.data_mut(), component)
            }
            Type::Primitive(_) => Ok(ty),
            Type::Composite(composite) => composite
                .component_mut(component - 1)
                .ok_or_else(|| Error::structural(format!("component {component} is out of range"))),
        }
    }

    /// Existing component `component` (1-based) of a type
    pub fn component(ty: &Type, component: usize) -> Option<&Type> {
        if component == 0 {
            return None;
        }
        let standard = Self::num_standard_components(ty);
        match ty {
            // a later component of an untyped primitive only exists after promotion
            Type::Varies(varies) if component > 1 && varies.data().is_generic_primitive() => None,
            Type::Varies(varies) => Self::component(varies.data(), component),
            Type::Primitive(_) if component == 1 => Some(ty),
            Type::Composite(composite) if composite.is_generic() || component <= standard => {
                composite.component(component - 1)
            }
            other => other.extra_components().get(component - standard - 1),
        }
    }

    /// Declared components: 1 for a primitive, the component count for a composite
    pub fn num_standard_components(ty: &Type) -> usize {
        match ty {
            Type::Varies(varies) => Self::num_standard_components(varies.data()),
            Type::Composite(composite) => composite.components().len(),
            Type::Primitive(_) => 1,
        }
    }

    /// Declared plus extra components
    pub fn num_components(ty: &Type) -> usize {
        match ty {
            Type::Varies(varies) => Self::num_components(varies.data()),
            other => Self::num_standard_components(other) + other.extra_components().len(),
        }
    }

    /// Subcomponents of component `component`; a component that does not
    /// exist yet counts as one
    pub fn num_sub_components(ty: &Type, component: usize) -> usize {
        if component == 1 && ty.is_primitive() {
            return 1;
        }
        Self::component(ty, component).map_or(1, Self::num_components)
    }
}

fn locate_segment(finder: &mut SegmentFinder<'_>, element: &PathElement) -> Result<StructureId> {
    if element.find {
        finder.find_segment(&element.pattern, element.rep)
    } else {
        finder.get_segment(&element.pattern, element.rep)
    }
}

fn locate_group(finder: &mut SegmentFinder<'_>, element: &PathElement) -> Result<StructureId> {
    if element.find {
        finder.find_group(&element.pattern, element.rep)
    } else {
        finder.get_group(&element.pattern, element.rep)
    }
}

/// Follow first components down to a primitive, creating them if needed
fn leaf_primitive_mut(ty: &mut Type) -> Result<&mut Primitive> {
    match ty {
        Type::Primitive(primitive) => Ok(primitive),
        Type::Varies(varies) => leaf_primitive_mut(varies.data_mut()),
        Type::Composite(composite) => {
            if !composite.is_generic() && composite.components().is_empty() {
                return Err(Error::structural(format!(
                    "composite {} has no components",
                    composite.type_name()
                )));
            }
            match composite.component_mut(0) {
                Some(first) => leaf_primitive_mut(first),
                None => Err(Error::structural("composite has no components")),
            }
        }
    }
}

fn leaf_primitive(ty: &Type) -> Option<&Primitive> {
    match ty {
        Type::Primitive(primitive) => Some(primitive),
        Type::Varies(varies) => leaf_primitive(varies.data()),
        Type::Composite(composite) => composite.component(0).and_then(leaf_primitive),
    }
}
