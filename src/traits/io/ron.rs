//! RON I/O
use crate::types::DomainResult;
use std::fs;

pub trait RONExport {
    //! Export for RON

    /// Generate the RON string
    fn to_ron_string(&self) -> DomainResult<String>;

    /// Export as RON
    fn export_as_ron(&self, filename: &str) -> DomainResult<()> {
        let ron_s = self.to_ron_string()?;
        fs::write(filename, ron_s)?;
        Ok(())
    }
}

pub trait RONImport: Sized {
    //! Import for RON

    /// Parse a RON string
    fn from_ron_string(s: &str) -> DomainResult<Self>;

    /// Import from a RON file
    fn import_from_ron(filename: &str) -> DomainResult<Self> {
        let content = fs::read_to_string(filename)?;
        Self::from_ron_string(&content)
    }
}
