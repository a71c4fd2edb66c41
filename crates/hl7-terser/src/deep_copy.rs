//! Primitive-by-primitive copying of types and segments
//!
//! Copies walk the components and subcomponents the *source* has and write
//! each primitive value to the same position in the target, creating
//! positions there as needed. A smaller target is extended through its extra
//! components; a larger one keeps the values past the source's shape.

use crate::config::SegmentCopyPolicy;
use crate::terser::Terser;
use crate::{Error, Result};
use hl7_model::{Message, Primitive, StructureId, Type};
use tracing::debug;

/// Copy every primitive value of `from` into `to`.
///
/// Unset source values are copied too, clearing the target position.
pub fn copy_type(from: &Type, to: &mut Type) -> Result<()> {
    for component in 1..=Terser::num_components(from) {
        for subcomponent in 1..=Terser::num_sub_components(from, component) {
            let value = Terser::primitive(from, component, subcomponent)
                .and_then(Primitive::value)
                .map(str::to_string);
            Terser::primitive_mut(to, component, subcomponent)?.set_value(value);
        }
    }
    Ok(())
}

/// Copy every existing field repetition of segment `from` into segment `to`
/// of another message
pub fn copy_segment(
    from_message: &Message,
    from: StructureId,
    to_message: &mut Message,
    to: StructureId,
    policy: SegmentCopyPolicy,
) -> Result<()> {
    let source = SegmentSnapshot::take(from_message, from)?;
    source.apply(to_message, to, policy)
}

/// [`copy_segment`] for two segments of the same message
pub fn copy_segment_within(
    message: &mut Message,
    from: StructureId,
    to: StructureId,
    policy: SegmentCopyPolicy,
) -> Result<()> {
    let source = SegmentSnapshot::take(message, from)?;
    source.apply(message, to, policy)
}

/// Existing field repetitions of a segment, detached from its message
struct SegmentSnapshot {
    name: String,
    fields: Vec<Vec<Type>>,
}

impl SegmentSnapshot {
    fn take(message: &Message, segment: StructureId) -> Result<Self> {
        let mut fields = Vec::new();
        for field in 1..=message.num_fields(segment)? {
            let mut reps = Vec::new();
            for rep in 0..message.field_repetitions(segment, field)? {
                if let Some(ty) = message.try_field(segment, field, rep)? {
                    reps.push(ty.clone());
                }
            }
            fields.push(reps);
        }
        Ok(Self {
            name: message.name(segment)?.to_string(),
            fields,
        })
    }

    fn apply(&self, message: &mut Message, to: StructureId, policy: SegmentCopyPolicy) -> Result<()> {
        let target_name = message.name(to)?.to_string();
        let target_fields = message.num_fields(to)?;
        let target_generic = message.is_generic_segment(to)?;

        let limit = match policy {
            SegmentCopyPolicy::RequireMatchingSchema => {
                let same_shape = target_generic || target_fields == self.fields.len();
                if self.name != target_name || !same_shape {
                    return Err(Error::SchemaMismatch(format!(
                        "can't copy {} ({} fields) into {} ({} fields)",
                        self.name,
                        self.fields.len(),
                        target_name,
                        target_fields
                    )));
                }
                self.fields.len()
            }
            SegmentCopyPolicy::OverlappingFields if !target_generic => {
                target_fields.min(self.fields.len())
            }
            SegmentCopyPolicy::OverlappingFields | SegmentCopyPolicy::Strict => self.fields.len(),
        };

        if limit < self.fields.len() {
            debug!(
                from = %self.name,
                to = %target_name,
                skipped = self.fields.len() - limit,
                "skipping fields the target does not declare"
            );
        }

        for (index, reps) in self.fields.iter().take(limit).enumerate() {
            for (rep, ty) in reps.iter().enumerate() {
                let target = message.field_mut(to, index + 1, rep)?;
                copy_type(ty, target)?;
            }
        }
        Ok(())
    }
}
