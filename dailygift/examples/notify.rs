//! Fires one warning and one error popup so the platform notifier can be
//! checked without running the whole bot.
//!
//! ```sh
//! cargo run -p dailygift --example notify
//! ```

use std::time::Duration;

use dailygift::{Notifier, NotifyKind, SystemNotifier};

#[tokio::main]
async fn main() {
    println!("Test 1: warning notification");
    SystemNotifier
        .notify(
            "UMA 每日禮物 - 測試",
            "這是一個測試警告通知",
            NotifyKind::Warning,
        )
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("Test 2: error notification");
    SystemNotifier
        .notify(
            "UMA 每日禮物 - 錯誤測試",
            "這是一個測試錯誤通知",
            NotifyKind::Error,
        )
        .await;

    println!("Test complete");
}
