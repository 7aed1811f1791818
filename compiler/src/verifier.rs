use std::collections::HashSet;
use crate::{
    types::{EnumObj, Registry, StructObj, Type, Value},
    utils::{quote, verifier_error},
    error::StructgenError,
};

/// Returns `Ok(())` if the closed objects are consistent, or
/// `Err(StructgenError::VerifierError { .. })` naming the offending line otherwise.
pub fn verify_registry(registry: &Registry) -> Result<(), StructgenError> {
    for obj in &registry.structs {
        verify_struct(registry, obj)?;
    }
    for obj in &registry.enums {
        verify_enum(obj)?;
    }
    Ok(())
}

fn verify_struct(registry: &Registry, obj: &StructObj) -> Result<(), StructgenError> {
    // 1) Structs must have at least one member
    if obj.items.is_empty() {
        return Err(verifier_error(
            format!("The struct {} has no members", quote(&obj.name)),
            obj.line,
        ));
    }

    let mut names = HashSet::new();
    let mut offset = 0;
    for item in &obj.items {
        // 2) Member names are unique
        if !names.insert(item.snake_name()) {
            return Err(verifier_error(
                format!("The field {} is defined twice in {}", quote(&item.name), quote(&obj.name)),
                item.line,
            ));
        }

        // 3) Offsets are exactly cumulative
        if item.offset != offset {
            return Err(verifier_error(
                format!(
                    "The field {} is at offset 0x{:x}, expected 0x{:x}",
                    quote(&item.name),
                    item.offset,
                    offset
                ),
                item.line,
            ));
        }
        offset += item.size();

        // 4) A constant is also the default
        if item.constant.is_some() && item.constant != item.default {
            return Err(verifier_error(
                format!("The constant {} does not match its default", quote(&item.name)),
                item.line,
            ));
        }

        // 5) Every integer value is resolved and fits
        for value in [&item.default, &item.constant].into_iter().flatten() {
            match (value, item.type_) {
                (Value::StructSize, _) => {
                    return Err(verifier_error(
                        format!("The size placeholder of {} was not resolved", quote(&item.name)),
                        item.line,
                    ));
                }
                (Value::Int(v), Type::Int(int_type)) if !int_type.contains(*v) => {
                    return Err(verifier_error(
                        format!(
                            "The value {} of {} does not fit in {}",
                            value,
                            quote(&item.name),
                            int_type.name()
                        ),
                        item.line,
                    ));
                }
                (Value::EnumItem(name), Type::Enum { id, .. }) => {
                    if registry.enum_obj(id).item(name).is_none() {
                        return Err(verifier_error(
                            format!(
                                "The value {} of {} is not a member of {}",
                                quote(name),
                                quote(&item.name),
                                quote(&registry.enum_obj(id).name)
                            ),
                            item.line,
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn verify_enum(obj: &EnumObj) -> Result<(), StructgenError> {
    let mut names = HashSet::new();
    for item in &obj.items {
        // 1) Item names are unique
        if !names.insert(item.name.as_str()) {
            return Err(verifier_error(
                format!("The enum value {} is defined twice in {}", quote(&item.name), quote(&obj.name)),
                item.line,
            ));
        }

        // 2) Values fit the representation
        if let Some(repr) = obj.repr {
            if !repr.contains(item.value) {
                return Err(verifier_error(
                    format!(
                        "The enum value {} of 0x{:x} does not fit in {}",
                        quote(&item.name),
                        item.value,
                        repr.name()
                    ),
                    item.line,
                ));
            }
        }
    }
    Ok(())
}
