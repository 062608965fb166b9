//! releasekit - dependency-ordered, resumable publishing and idempotent
//! tagging for monorepos.

use releasekit::cli;
use releasekit::ReleaseError;
use std::process;

#[tokio::main]
async fn main() {
    let result = cli::run().await;

    match result {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("❌ Fatal error: {:#}", e);

            // Show recovery suggestions for critical errors
            if let Some(release_error) = e.downcast_ref::<ReleaseError>() {
                let suggestions = release_error.recovery_suggestions();
                if !suggestions.is_empty() {
                    eprintln!("\n💡 Recovery suggestions:");
                    for suggestion in suggestions {
                        eprintln!("  • {}", suggestion);
                    }
                }
            }

            process::exit(cli::EXIT_FATAL);
        }
    }
}
