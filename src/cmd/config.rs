use anyhow::Result;

use threadreel::config::default_config_path;
use threadreel::Settings;

pub fn cmd_config() -> Result<()> {
    println!("# Default location: {}", default_config_path().display());
    println!("{}", Settings::default().to_toml_string()?);
    Ok(())
}
