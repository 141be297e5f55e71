//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `genrepo_core` linkage.
//! - Optionally bind a persistence unit from a JSON file and report its state.
//!
//! Usage: `genrepo_cli [unit-config.json]`

use genrepo_core::{PersistenceUnit, SessionFactory, SqliteSessionFactory, UnitConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("genrepo_core ping={}", genrepo_core::ping());
    println!("genrepo_core version={}", genrepo_core::core_version());

    let Some(config_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match bind_unit(&config_path) {
        Ok(factory) => {
            println!("unit name={}", factory.unit_name());
            println!("unit schema_version={}", factory.schema_version());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("unit bind failed: {err}");
            ExitCode::FAILURE
        }
    }
}

// Named queries in the file reference entities registered in code, so only
// units without named queries can be bound here.
fn bind_unit(config_path: &str) -> Result<SqliteSessionFactory, genrepo_core::DbError> {
    let config = UnitConfig::from_path(config_path)?;
    let unit = PersistenceUnit::from_config(config)?;
    SqliteSessionFactory::bind(unit)
}
