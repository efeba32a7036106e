use crate::output::traits::{ItemWriter, OutputResult};
use crate::state::Item;
use std::path::{Path, PathBuf};

/// Writes items as a CSV table with CRLF line endings
///
/// The header row is the item field names, in declaration order.
pub struct CsvWriter {
    path: PathBuf,
}

impl CsvWriter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ItemWriter for CsvWriter {
    fn name(&self) -> &str {
        "CSV"
    }

    fn write_items(&self, items: &[Item]) -> OutputResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_path(&self.path)?;

        for item in items {
            writer.serialize(item)?;
        }
        writer.flush()?;
        Ok(())
    }
}
