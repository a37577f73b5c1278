//! Command-line interface for exporting and importing bulk update workbooks
//!
//! Records, code tables and top containers are read from a JSON dataset
//! file (see [`Dataset`]); a successful import writes the dataset back.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sheetsync_core::config::BulkUpdateConfig;
use sheetsync_core::error::SheetError;
use sheetsync_core::types::RecordId;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::Dataset;
use crate::columns::{ColumnSelection, STANDARD_CATALOG};
use crate::export::ExportOptions;
use crate::import::WorkbookRows;
use crate::service::BulkUpdateService;

/// `sheetsync` command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "sheetsync",
    version,
    about = "Spreadsheet bulk updates for hierarchical archival records"
)]
pub struct SheetsyncCli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: SheetsyncCommand,
}

/// `sheetsync` subcommands
#[derive(Subcommand, Debug)]
pub enum SheetsyncCommand {
    /// Export records of a resource to a workbook
    Export {
        /// Dataset file
        #[arg(short, long)]
        data: PathBuf,
        /// Resource the records belong to
        #[arg(short, long)]
        resource: RecordId,
        /// Record ids to export, comma separated
        #[arg(long, value_delimiter = ',', required_unless_present = "all", conflicts_with = "all")]
        ids: Vec<RecordId>,
        /// Export every record of the resource
        #[arg(long)]
        all: bool,
        /// Output file; defaults to the generated download filename
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Column groups to include, comma separated (see `columns`)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Import an edited workbook into the dataset
    Import {
        /// Dataset file
        #[arg(short, long)]
        data: PathBuf,
        /// Edited workbook
        file: PathBuf,
        /// Let emptied groups delete subrecords, notes and instances
        #[arg(long)]
        apply_deletes: bool,
        /// Create top containers that are not registered yet
        #[arg(long)]
        create_missing_containers: bool,
        /// Write collected errors to this file as JSON when the import fails
        #[arg(long)]
        errors_json: Option<PathBuf>,
        /// Run the import without saving the dataset
        #[arg(long)]
        dry_run: bool,
    },

    /// List the column groups an export can select
    Columns,
}

/// `sheetsync` application
pub struct SheetsyncApp {
    cli: SheetsyncCli,
}

impl SheetsyncApp {
    /// Application from process arguments
    #[must_use]
    pub fn from_args() -> Self {
        Self::new(SheetsyncCli::parse())
    }

    /// Application from parsed arguments
    #[must_use]
    pub fn new(cli: SheetsyncCli) -> Self {
        Self { cli }
    }

    /// Run the selected command
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails
    pub async fn run(self) -> anyhow::Result<()> {
        self.init_logging();
        match self.execute().await {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("Command failed: {err:#}");
                Err(err)
            }
        }
    }

    fn init_logging(&self) {
        let level = if self.cli.quiet {
            "error"
        } else if self.cli.verbose {
            "debug"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    fn load_config(&self) -> anyhow::Result<BulkUpdateConfig> {
        match &self.cli.config {
            Some(path) => BulkUpdateConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display())),
            None => {
                let mut config = BulkUpdateConfig::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    async fn execute(&self) -> anyhow::Result<()> {
        match &self.cli.command {
            SheetsyncCommand::Export {
                data,
                resource,
                ids,
                all,
                output,
                columns,
            } => {
                self.export_command(data, *resource, ids, *all, output.as_deref(), columns)
                    .await
            }
            SheetsyncCommand::Import {
                data,
                file,
                apply_deletes,
                create_missing_containers,
                errors_json,
                dry_run,
            } => {
                let mut config = self.load_config()?;
                config.import.apply_deletes |= *apply_deletes;
                config.import.create_missing_containers |= *create_missing_containers;
                config.validate()?;
                self.import_command(config, data, file, errors_json.as_deref(), *dry_run)
                    .await
            }
            SheetsyncCommand::Columns => {
                for key in STANDARD_CATALOG.group_keys() {
                    println!("{key}");
                }
                Ok(())
            }
        }
    }

    async fn export_command(
        &self,
        data: &Path,
        resource: RecordId,
        ids: &[RecordId],
        all: bool,
        output: Option<&Path>,
        columns: &[String],
    ) -> anyhow::Result<()> {
        let config = self.load_config()?;
        let adapters = load_dataset(data)?.into_adapters();

        let record_ids: Vec<RecordId> = if all {
            adapters
                .store
                .records()
                .iter()
                .filter(|record| record.resource_id == resource)
                .map(|record| record.id)
                .collect()
        } else {
            ids.to_vec()
        };
        let selection = if columns.is_empty() {
            ColumnSelection::All
        } else {
            ColumnSelection::only(columns.iter().cloned())
        };

        let service = BulkUpdateService::from_adapters(&adapters).with_config(config);
        let options = ExportOptions::default().with_selection(selection);
        let (filename, bytes) = service
            .export_workbook(resource, &record_ids, &options)
            .await?;

        let path = output.map_or_else(|| PathBuf::from(&filename), Path::to_path_buf);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
        println!("{}", path.display());
        Ok(())
    }

    async fn import_command(
        &self,
        config: BulkUpdateConfig,
        data: &Path,
        file: &Path,
        errors_json: Option<&Path>,
        dry_run: bool,
    ) -> anyhow::Result<()> {
        let adapters = load_dataset(data)?.into_adapters();
        let rows = WorkbookRows::open_path(file, config.import.sheet_name.clone())
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let service = BulkUpdateService::from_adapters(&adapters).with_config(config);

        match service.import_table(&rows).await {
            Ok(summary) => {
                if dry_run {
                    info!("Dry run, dataset not saved");
                } else {
                    adapters
                        .to_dataset()
                        .save(data)
                        .with_context(|| format!("Failed to save {}", data.display()))?;
                }
                println!("Updated {} record(s)", summary.updated);
                for uri in &summary.updated_uris {
                    println!("  {uri}");
                }
                Ok(())
            }
            Err(SheetError::BulkUpdateFailed(entries)) => {
                for entry in &entries {
                    eprintln!("{entry}");
                }
                if let Some(path) = errors_json {
                    std::fs::write(path, serde_json::to_string_pretty(&entries)?)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                bail!("Bulk update failed with {} error(s)", entries.len())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    Dataset::load(path).with_context(|| format!("Failed to load dataset {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_export() {
        let cli = SheetsyncCli::try_parse_from([
            "sheetsync", "export", "-d", "data.json", "-r", "4", "--ids", "1,2,3", "--columns",
            "title,dates",
        ])
        .unwrap();
        match cli.command {
            SheetsyncCommand::Export {
                resource,
                ids,
                all,
                columns,
                ..
            } => {
                assert_eq!(resource, 4);
                assert_eq!(ids, [1, 2, 3]);
                assert!(!all);
                assert_eq!(columns, ["title", "dates"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_export_needs_ids_or_all() {
        assert!(SheetsyncCli::try_parse_from(["sheetsync", "export", "-d", "d.json", "-r", "4"]).is_err());
        assert!(
            SheetsyncCli::try_parse_from([
                "sheetsync", "export", "-d", "d.json", "-r", "4", "--all", "--ids", "1"
            ])
            .is_err()
        );
        assert!(SheetsyncCli::try_parse_from(["sheetsync", "export", "-d", "d.json", "-r", "4", "--all"]).is_ok());
    }

    #[test]
    fn test_parse_import() {
        let cli = SheetsyncCli::try_parse_from([
            "sheetsync",
            "-v",
            "import",
            "-d",
            "data.json",
            "edited.xlsx",
            "--apply-deletes",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            SheetsyncCommand::Import {
                file,
                apply_deletes,
                create_missing_containers,
                ..
            } => {
                assert_eq!(file, PathBuf::from("edited.xlsx"));
                assert!(apply_deletes);
                assert!(!create_missing_containers);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
