// ---------------------------------------------------------------------------
// Model output methods on every emission provider
// ---------------------------------------------------------------------------

use emission::{CmaqConfig, EmissionProvider, GridGeometry, RunConfig};

use crate::cmaq::cmaq_files;
use crate::error::GridFileError;
use crate::griddesc::{GridDesc, GridDescription};
use crate::output::NamedGridFile;
use crate::wrfchemi::wrfchemi_files;

/// Extension trait adding WRF-Chem and CMAQ output to area sources, point
/// sources and source groups alike.
///
/// # Example
///
/// ```ignore
/// use gridfile::ModelOutputExt;
///
/// let files = group.to_wrfchemi(&geometry, &config)?;
/// ```
pub trait ModelOutputExt: EmissionProvider {
    fn to_wrfchemi(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
    ) -> Result<Vec<NamedGridFile>, GridFileError>;

    /// Reads `cmaq.griddesc_path` and writes against grid `cmaq.grid_name`.
    fn to_cmaq(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
        cmaq: &CmaqConfig,
    ) -> Result<Vec<NamedGridFile>, GridFileError>;

    fn to_cmaq_with(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
        grid: &GridDescription,
        btrim: usize,
    ) -> Result<Vec<NamedGridFile>, GridFileError>;
}

impl<T: EmissionProvider + ?Sized> ModelOutputExt for T {
    fn to_wrfchemi(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
    ) -> Result<Vec<NamedGridFile>, GridFileError> {
        wrfchemi_files(self, geometry, config)
    }

    fn to_cmaq(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
        cmaq: &CmaqConfig,
    ) -> Result<Vec<NamedGridFile>, GridFileError> {
        // Shape problems surface before the GRIDDESC is even opened.
        geometry.ensure_shape(self.grid())?;
        let grid = GridDesc::read(&cmaq.griddesc_path)?.grid(&cmaq.grid_name)?;
        cmaq_files(self, geometry, config, &grid, cmaq.btrim)
    }

    fn to_cmaq_with(
        &self,
        geometry: &GridGeometry,
        config: &RunConfig,
        grid: &GridDescription,
        btrim: usize,
    ) -> Result<Vec<NamedGridFile>, GridFileError> {
        cmaq_files(self, geometry, config, grid, btrim)
    }
}
