//! OS popup notifications for the two moments a human has to look at the
//! bot: manual CAPTCHA assistance and run failure.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// Title used when the bot needs a human to finish the CAPTCHA.
pub const ASSIST_TITLE: &str = "UMA 每日禮物 - 需要協助";

/// Title used when the run died.
pub const FAILURE_TITLE: &str = "UMA 每日禮物 - 執行失敗";

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Warning,
    Error,
}

/// Popup notification sink. The system implementation shells out to the
/// platform notifier; tests substitute a recording fake.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str, kind: NotifyKind);
}

/// Sends real popups. Failures are logged and swallowed: a missing
/// notifier binary must never take the run down.
pub struct SystemNotifier;

#[async_trait]
impl Notifier for SystemNotifier {
    async fn notify(&self, title: &str, message: &str, kind: NotifyKind) {
        let mut command = platform_command(title, message, kind);
        let result = tokio::time::timeout(NOTIFY_TIMEOUT, command.output()).await;
        match result {
            Ok(Ok(output)) if output.status.success() => {
                info!("notification sent: {title}");
            }
            Ok(Ok(output)) => {
                warn!(
                    "notifier exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(Err(e)) => warn!("failed to send notification: {e}"),
            Err(_) => warn!("notification timed out after {NOTIFY_TIMEOUT:?}"),
        }
    }
}

#[cfg(target_os = "windows")]
fn platform_command(title: &str, message: &str, kind: NotifyKind) -> Command {
    // Single quotes double up inside PowerShell single-quoted strings.
    let title = title.replace('\'', "''");
    let message = message.replace('\'', "''");
    let icon = match kind {
        NotifyKind::Error => "Error",
        NotifyKind::Warning => "Warning",
    };
    let script = format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         [System.Windows.Forms.MessageBox]::Show('{message}', '{title}', \
         [System.Windows.Forms.MessageBoxButtons]::OK, \
         [System.Windows.Forms.MessageBoxIcon]::{icon})"
    );
    // A second, hidden PowerShell owns the MessageBox so the outer command
    // returns without waiting for the user to dismiss it.
    let wrapped =
        format!("Start-Process powershell -ArgumentList '-Command', \"{script}\" -WindowStyle Hidden");
    let mut command = Command::new("powershell");
    command.args(["-NoProfile", "-Command", &wrapped]);
    command
}

#[cfg(target_os = "macos")]
fn platform_command(title: &str, message: &str, _kind: NotifyKind) -> Command {
    let title = title.replace('"', "\\\"");
    let message = message.replace('"', "\\\"");
    let script = format!("display notification \"{message}\" with title \"{title}\"");
    let mut command = Command::new("osascript");
    command.args(["-e", &script]);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_command(title: &str, message: &str, kind: NotifyKind) -> Command {
    let urgency = match kind {
        NotifyKind::Error => "critical",
        NotifyKind::Warning => "normal",
    };
    let mut command = Command::new("notify-send");
    command.args(["-u", urgency, title, message]);
    command
}
