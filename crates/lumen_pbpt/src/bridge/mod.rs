//! Mapper dispatch between PBPT records and scene objects.
//!
//! Each direction and record kind is a [`MapperDomain`]. A domain owns an
//! ordered, static list of [`Mapper`]s; [`dispatch`] hands an item to the
//! first mapper whose `matches` returns `true`. Errors raised inside a mapper
//! are tagged with the mapper name and the failing stage.

pub mod export;
pub mod import;

use lumen_core::errors::{LumenError, Result};

pub use export::{ExportContext, MeshRendererPbptMeshExportMapper, ShapeExport};
pub use import::{
    CameraImport, ImportContext, ImportOptions, ImportPackage, ImportResult, IntegratorImport,
    ObjLambertianShapeImportMapper, PathIntegratorImportMapper, ShapeImport, ThinLensPerspectiveImportMapper,
};

/// One mapping direction and record kind.
pub trait MapperDomain: 'static {
    /// Short name used in error contexts, e.g. `shape`.
    const NAME: &'static str;

    type Item: ?Sized;
    type Context<'a>;
    type Package;
}

/// A rule that recognizes some items of domain `D` and maps them.
pub trait Mapper<D: MapperDomain>: Sync {
    fn name(&self) -> &'static str;

    /// Must not have side effects.
    fn matches(&self, item: &D::Item, ctx: &D::Context<'_>, package: &D::Package) -> Result<bool>;

    fn map(&self, item: &D::Item, ctx: &mut D::Context<'_>, package: &mut D::Package) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub matched: bool,
    pub mapper_name: Option<&'static str>,
}

/// Runs the first matching mapper. Later mappers are not consulted once one
/// matches, even if it fails.
pub fn dispatch<D: MapperDomain>(
    mappers: &[&dyn Mapper<D>],
    item: &D::Item,
    ctx: &mut D::Context<'_>,
    package: &mut D::Package,
) -> Result<DispatchResult> {
    for mapper in mappers {
        let matched = mapper.matches(item, ctx, package).map_err(|source| LumenError::Mapper {
            mapper: mapper.name(),
            stage: "matches",
            source: Box::new(source),
        })?;
        if !matched {
            continue;
        }
        mapper.map(item, ctx, package).map_err(|source| LumenError::Mapper {
            mapper: mapper.name(),
            stage: "map",
            source: Box::new(source),
        })?;
        return Ok(DispatchResult {
            matched: true,
            mapper_name: Some(mapper.name()),
        });
    }
    Ok(DispatchResult::default())
}

// ============================================================================
// Registry
// ============================================================================

pub static SHAPE_IMPORT_MAPPERS: &[&dyn Mapper<ShapeImport>] = &[&ObjLambertianShapeImportMapper];
pub static CAMERA_IMPORT_MAPPERS: &[&dyn Mapper<CameraImport>] = &[&ThinLensPerspectiveImportMapper];
pub static INTEGRATOR_IMPORT_MAPPERS: &[&dyn Mapper<IntegratorImport>] = &[&PathIntegratorImportMapper];
pub static SHAPE_EXPORT_MAPPERS: &[&dyn Mapper<ShapeExport>] = &[&MeshRendererPbptMeshExportMapper];

#[cfg(test)]
mod tests {
    use super::*;

    struct Numbers;

    impl MapperDomain for Numbers {
        const NAME: &'static str = "number";
        type Item = i32;
        type Context<'a> = Vec<&'static str>;
        type Package = i32;
    }

    struct Even;
    struct Any;
    struct Broken;

    impl Mapper<Numbers> for Even {
        fn name(&self) -> &'static str {
            "Even"
        }

        fn matches(&self, item: &i32, _: &Vec<&'static str>, _: &i32) -> Result<bool> {
            Ok(item % 2 == 0)
        }

        fn map(&self, item: &i32, log: &mut Vec<&'static str>, sum: &mut i32) -> Result<()> {
            log.push("Even");
            *sum += item;
            Ok(())
        }
    }

    impl Mapper<Numbers> for Any {
        fn name(&self) -> &'static str {
            "Any"
        }

        fn matches(&self, _: &i32, _: &Vec<&'static str>, _: &i32) -> Result<bool> {
            Ok(true)
        }

        fn map(&self, _: &i32, log: &mut Vec<&'static str>, _: &mut i32) -> Result<()> {
            log.push("Any");
            Ok(())
        }
    }

    impl Mapper<Numbers> for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        fn matches(&self, _: &i32, _: &Vec<&'static str>, _: &i32) -> Result<bool> {
            Err(LumenError::invalid_argument("boom"))
        }

        fn map(&self, _: &i32, _: &mut Vec<&'static str>, _: &mut i32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn first_match_wins() {
        let mappers: &[&dyn Mapper<Numbers>] = &[&Even, &Any];
        let mut log = Vec::new();
        let mut sum = 0;

        let result = dispatch(mappers, &4, &mut log, &mut sum).unwrap();
        assert_eq!(result.mapper_name, Some("Even"));
        let result = dispatch(mappers, &3, &mut log, &mut sum).unwrap();
        assert_eq!(result.mapper_name, Some("Any"));

        assert_eq!(log, ["Even", "Any"]);
        assert_eq!(sum, 4);
    }

    #[test]
    fn no_match_is_not_an_error() {
        let mappers: &[&dyn Mapper<Numbers>] = &[&Even];
        let mut log = Vec::new();
        let result = dispatch(mappers, &3, &mut log, &mut 0).unwrap();
        assert!(!result.matched);
        assert!(log.is_empty());
    }

    #[test]
    fn errors_name_the_mapper_and_stage() {
        let mappers: &[&dyn Mapper<Numbers>] = &[&Broken, &Any];
        let mut log = Vec::new();
        let err = dispatch(mappers, &1, &mut log, &mut 0).unwrap_err();
        assert_eq!(err.to_string(), "[mapper=Broken] matches failed: Invalid argument: boom");
        assert!(log.is_empty());
    }
}
