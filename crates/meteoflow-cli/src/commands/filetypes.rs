use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use meteoflow_core::config::FiletypeCatalogue;

pub fn run(config_dir: &Path) -> Result<()> {
    let catalogue = FiletypeCatalogue::load_dir(config_dir)
        .with_context(|| format!("loading descriptors from {}", config_dir.display()))?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["filetype", "patterns", "valid from", "valid to", "ok"]);

    for descriptor in catalogue.iter() {
        let status = match descriptor.validate() {
            Ok(()) => "ok".to_string(),
            Err(err) => err.to_string(),
        };
        table.add_row(vec![
            descriptor.id.clone(),
            descriptor.patterns.join(", "),
            descriptor.valid_from.format("%Y-%m-%d %H:%M").to_string(),
            descriptor.valid_to.format("%Y-%m-%d %H:%M").to_string(),
            status,
        ]);
    }
    println!("{table}");
    println!("{} filetypes", catalogue.len());
    Ok(())
}
