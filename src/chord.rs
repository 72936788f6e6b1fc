//! Keyboard chord that triggers a cycle from inside the page.

use std::{fmt, str::FromStr};

use color_eyre::{
	Result,
	eyre::{bail, eyre},
};

/// Page-side counter the listener increments on every press.
pub const CHORD_COUNTER: &str = "__solveChordPresses";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Chord {
	pub ctrl: bool,
	pub shift: bool,
	pub alt: bool,
	pub meta: bool,
	/// Compared against `KeyboardEvent.key`, case-insensitively
	pub key: String,
}

impl FromStr for Chord {
	type Err = color_eyre::Report;

	/// Parses strings like `Ctrl+Shift+A`. Modifiers may come in any order; exactly one non-modifier key is required.
	fn from_str(s: &str) -> Result<Self> {
		let mut chord = Chord::default();
		for part in s.split('+').map(str::trim) {
			match part.to_lowercase().as_str() {
				"" => bail!("Empty key in chord {s:?}"),
				"ctrl" | "control" => chord.ctrl = true,
				"shift" => chord.shift = true,
				"alt" | "option" => chord.alt = true,
				"meta" | "cmd" | "super" => chord.meta = true,
				_ if chord.key.is_empty() => chord.key = part.to_string(),
				_ => bail!("Chord {s:?} has more than one key"),
			}
		}
		if chord.key.is_empty() {
			return Err(eyre!("Chord {s:?} has no key"));
		}
		Ok(chord)
	}
}

impl fmt::Display for Chord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (on, name) in [(self.ctrl, "Ctrl"), (self.alt, "Alt"), (self.shift, "Shift"), (self.meta, "Meta")] {
			if on {
				write!(f, "{name}+")?;
			}
		}
		write!(f, "{}", self.key.to_uppercase())
	}
}

impl Chord {
	/// Script installing a capturing `keydown` listener that counts presses in `window[CHORD_COUNTER]`.
	/// Idempotent: re-running it on the same document does not add a second listener.
	pub fn listener_js(&self) -> String {
		let key = serde_json::to_string(&self.key.to_lowercase()).unwrap_or_else(|_| "\"\"".to_string());
		format!(
			r#"
			(function() {{
				if (typeof window.{CHORD_COUNTER} === 'number') return true;
				window.{CHORD_COUNTER} = 0;
				document.addEventListener('keydown', (event) => {{
					if (event.ctrlKey === {ctrl} && event.shiftKey === {shift} && event.altKey === {alt} && event.metaKey === {meta}
						&& (event.key || '').toLowerCase() === {key}) {{
						event.preventDefault();
						window.{CHORD_COUNTER} += 1;
					}}
				}}, true);
				return true;
			}})()
			"#,
			ctrl = self.ctrl,
			shift = self.shift,
			alt = self.alt,
			meta = self.meta,
		)
	}
}
