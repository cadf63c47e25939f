use std::sync::atomic::{AtomicBool, Ordering};

use anvil_types::{DataType, ObjectInfo, StatusCode, StatusSeverity, WaitMask};

use super::{write_value, Object, ObjectContext};
use crate::param::Parameters;

/// Scene object whose behavior is entirely parameter-driven: camera,
/// renderer, world, instance, group, surface, geometry, material, sampler,
/// spatial field, volume and light.
pub(crate) struct GenericObject {
    kind: DataType,
    subtype: Option<String>,
    params: Parameters,
    required: Vec<(String, DataType)>,
    valid: AtomicBool,
}

impl GenericObject {
    /// `info` is the registry entry for `kind`/`subtype`, when there is one.
    pub(crate) fn new(kind: DataType, subtype: Option<&str>, info: Option<&ObjectInfo>) -> Self {
        let required: Vec<_> = info
            .map(|info| {
                info.parameters
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| (p.name.clone(), p.ty))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            kind,
            subtype: subtype.map(str::to_owned),
            params: Parameters::new(),
            valid: AtomicBool::new(required.is_empty()),
            required,
        }
    }

    /// Type tags this variant is used for.
    pub(crate) fn handles_kind(kind: DataType) -> bool {
        kind.is_object()
            && !kind.is_array()
            && !matches!(kind, DataType::Object | DataType::Device | DataType::Frame)
    }
}

impl Object for GenericObject {
    fn kind(&self) -> DataType {
        self.kind
    }

    fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn commit(&self, ctx: &ObjectContext<'_>) {
        self.params.commit(ctx);

        let committed = self.params.committed();
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|(name, ty)| {
                committed.get(name).is_none_or(|p| {
                    // Object-typed parameters accept any object tag of the right family.
                    !(p.ty() == *ty || (ty.is_array() && p.ty().is_array()))
                })
            })
            .map(|(name, _)| name.as_str())
            .collect();

        if !missing.is_empty() {
            ctx.report_status(
                StatusSeverity::Warning,
                StatusCode::InvalidArgument,
                format_args!(
                    "{} {} is missing required parameter(s): {}",
                    self.kind,
                    self.subtype.as_deref().unwrap_or("-"),
                    missing.join(", ")
                ),
            );
        }
        self.valid.store(missing.is_empty(), Ordering::Release);
    }

    fn get_property(&self, name: &str, ty: DataType, out: &mut [u8], _mask: WaitMask) -> bool {
        match (name, ty) {
            ("valid", DataType::Bool) => write_value(out, u32::from(self.valid.load(Ordering::Acquire))),
            _ => false,
        }
    }
}
