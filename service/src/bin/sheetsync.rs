//! `sheetsync` command-line tool
//!
//! Exports records to an editable workbook and imports the edited workbook
//! back into the dataset.

use sheetsync_service::cli::SheetsyncApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    SheetsyncApp::from_args().run().await
}
