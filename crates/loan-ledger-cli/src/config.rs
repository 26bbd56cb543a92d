use log::debug;

use loan_ledger_core::LedgerConfig;

use crate::input;

/// Engine configuration from `--config`, or defaults when absent.
pub fn load_config(path: Option<&str>) -> Result<LedgerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            debug!("loading ledger config from {path}");
            input::file::read_document::<LedgerConfig>(path)?
        }
        None => LedgerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
