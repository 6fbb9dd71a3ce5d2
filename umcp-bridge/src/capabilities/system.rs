use std::fmt::{Display, Write as _};
use std::path::PathBuf;
use std::thread;

use tracing::info;
use umcp_capability::{Capability, Lifecycle, SyncCapability};
use umcp_primitives::CapabilityResult;

/// Reports the host environment.
pub struct SystemInformation;

impl Lifecycle for SystemInformation {
    fn initialize(&self) -> CapabilityResult<()> {
        info!("initializing system information capability");
        Ok(())
    }

    fn shutdown(&self) -> CapabilityResult<()> {
        info!("shutting down system information capability");
        Ok(())
    }
}

impl SyncCapability for SystemInformation {
    type Input = ();
    type Output = String;

    fn execute(&self, (): ()) -> CapabilityResult<String> {
        Ok(report())
    }
}

/// Registered under the type's own name, `SystemInformation`.
pub fn capability() -> umcp_primitives::Result<Capability<(), String>> {
    Capability::sync(SystemInformation)
        .description("Provides detailed information about the system environment")
        .build()
}

/// Builds the plain-text report, one padded `label: value` line per entry.
pub fn report() -> String {
    let processors = thread::available_parallelism().map_or(1, usize::from);
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into());
    let working_dir = std::env::current_dir().ok();

    let mut report = String::from("System Information Report\n======================\n\n");
    line(&mut report, "OS Family", std::env::consts::FAMILY);
    line(&mut report, "OS Name", std::env::consts::OS);
    line(&mut report, "OS Architecture", std::env::consts::ARCH);
    line(&mut report, "Available Processors", processors);
    line(&mut report, "Bridge Version", env!("CARGO_PKG_VERSION"));
    line(&mut report, "User Name", user);
    line(&mut report, "User Home", display_path(home));
    line(&mut report, "Working Directory", display_path(working_dir));
    line(&mut report, "Process Id", std::process::id());
    report
}

fn line(report: &mut String, label: &str, value: impl Display) {
    // Writing into a String cannot fail.
    let _ = writeln!(report, "{label:<20}: {value}");
}

fn display_path(path: Option<PathBuf>) -> String {
    path.map_or_else(|| "unknown".into(), |path| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umcp_capability::Executor;

    #[test]
    fn report_lines_are_aligned() {
        let report = report();
        assert!(report.starts_with("System Information Report"));
        assert!(report.contains(&format!("{:<20}: {}", "OS Name", std::env::consts::OS)));
        assert!(
            report
                .lines()
                .skip(3)
                .all(|line| line.chars().nth(20) == Some(':'))
        );
    }

    #[tokio::test]
    async fn runs_as_a_direct_capability() {
        let capability = capability().unwrap();
        let output = capability
            .execute_async((), &Executor::current().unwrap())
            .await
            .unwrap();
        assert!(output.contains("Available Processors"));
    }
}
