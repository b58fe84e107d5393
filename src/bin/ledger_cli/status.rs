//! `bulk-import-status`: show a status file.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use super::{output, status_store};

#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Import id printed when the import started
    pub import_id: String,

    /// Directory for status files
    #[arg(long)]
    pub status_dir: Option<PathBuf>,
}

impl StatusCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let status = status_store(self.status_dir.as_ref()).require(&self.import_id)?;
        output::print_status(&status, json_output)
    }
}
