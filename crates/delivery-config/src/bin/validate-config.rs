//! Config validation CLI tool
//!
//! Validates a delivery configuration file and reports any errors.

use delivery_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a delivery configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match delivery_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", delivery_config::CURRENT_CONFIG_VERSION);
            println!("  Data dir: {}", settings.app.data_dir.display());
            println!("  Delivery fee: {}", settings.cart.delivery_fee);
            println!(
                "  Tracking: ready after {}s",
                settings.tracking.ready_after.as_secs()
            );
            println!();
            println!(
                "Coupons (max {} per code):",
                settings.coupons.max_per_code
            );
            for coupon in &settings.coupons.catalog {
                println!(
                    "  - {}: {}% off, min {}, valid {}d",
                    coupon.code,
                    coupon.discount_percent,
                    coupon.min_order_value,
                    coupon.valid_for.as_secs() / 86_400
                );
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                delivery_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                delivery_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                delivery_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                delivery_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        delivery_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
