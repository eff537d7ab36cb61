use std::path::Path;

use anyhow::Result;

use trade_ingest::settings::{load_settings, save_settings};
use trade_ingest::TimezoneHint;

pub fn run(settings_path: &Path, set_timezone: Option<&str>) -> Result<()> {
    let mut settings = load_settings(settings_path);

    if let Some(tz) = set_timezone {
        let hint = TimezoneHint::parse(tz)?;
        settings.default_timezone = hint.label().to_string();
        save_settings(settings_path, &settings)?;
        println!("Default timezone set to {hint}");
    }

    println!("Settings:  {}", settings_path.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
