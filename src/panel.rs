//! Where a cycle reports to the user.

use color_eyre::Result;

/// Reporting surface for a cycle. Failures here are never fatal to the cycle itself.
#[allow(async_fn_in_trait)]
pub trait Panel {
	/// Make the panel visible with a loading indicator.
	async fn loading(&self) -> Result<()>;
	/// Show a model response (or an `Error: ...` line in its place).
	async fn show_response(&self, response: &str) -> Result<()>;
	/// Show a short plain-text status line.
	async fn notice(&self, text: &str) -> Result<()>;
	async fn hide(&self) -> Result<()>;
}

/// Writes everything to stderr. Used where there is no page to draw on.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPanel;

impl Panel for TerminalPanel {
	async fn loading(&self) -> Result<()> {
		eprintln!("Asking the model...");
		Ok(())
	}

	async fn show_response(&self, response: &str) -> Result<()> {
		eprintln!("\n=== Response ===");
		eprintln!("{response}");
		eprintln!();
		Ok(())
	}

	async fn notice(&self, text: &str) -> Result<()> {
		eprintln!("{text}");
		Ok(())
	}

	async fn hide(&self) -> Result<()> {
		Ok(())
	}
}
