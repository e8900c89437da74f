use crate::core::node::ModuleId;
use crate::error::Result;

/// Resolves module ids to the dependency ids declared in their manifests.
pub trait ManifestSource: Send + Sync {
    fn id(&self) -> &'static str;

    /// Dependencies of a support module, in declaration order.
    fn fetch_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>>;

    /// Dependencies of a deployable application. Applications are kept
    /// apart from support modules by both backends.
    fn fetch_application_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.fetch_dependencies(module)
    }

    /// Root the support modules are fetched from. The batch builder lists
    /// this root so every catalog entry resolves through
    /// [`ManifestSource::fetch_dependencies`].
    fn catalog_root(&self) -> String;

    fn list_families(&self, catalog_root: &str) -> Result<Vec<String>>;

    fn list_versions(&self, catalog_root: &str, family: &str) -> Result<Vec<String>>;
}
