//! Clipboard interface.

use async_trait::async_trait;

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> String;

    async fn write_text(&self, text: &str);
}
