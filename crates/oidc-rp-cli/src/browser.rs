use async_trait::async_trait;
use colored::Colorize;
use oidc_rp::{Browser, OidcResult, PopupRequest};

/// Prints URLs for the user to open.
pub struct ConsoleBrowser;

#[async_trait]
impl Browser for ConsoleBrowser {
    async fn navigate(&self, url: &str) -> OidcResult<()> {
        println!("{}", "Open this URL in your browser:".cyan());
        println!("  {url}");
        Ok(())
    }

    async fn open_popup(&self, request: &PopupRequest) -> OidcResult<()> {
        println!(
            "{} {}",
            "Open this URL in a popup window:".cyan(),
            format!("({})", request.window_name).dimmed()
        );
        println!("  {}", request.url);
        Ok(())
    }
}
