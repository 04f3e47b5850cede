//! Pure rendering of the results panel.

use std::fmt;

use crate::prediction::LabelResult;

pub const LOADING_MESSAGE: &str = "Loading predictions...";
pub const PANEL_TITLE: &str = "Text Toxicity Analysis";
pub const MATCH_GLYPH: &str = "🤢";
pub const NO_MATCH_GLYPH: &str = "🥰";

/// What the results panel shows for a given text and prediction set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    /// The input is empty; stored predictions are not shown.
    Hidden,
    /// The input is non-empty but no prediction set exists yet.
    Loading,
    /// One formatted line per category.
    Results(Vec<String>),
}

impl Panel {
    pub fn render(text: &str, predictions: Option<&[LabelResult]>) -> Self {
        if text.is_empty() {
            return Panel::Hidden;
        }
        match predictions {
            None => Panel::Loading,
            Some(results) => Panel::Results(results.iter().map(format_line).collect()),
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, Panel::Hidden)
    }

    pub fn lines(&self) -> &[String] {
        match self {
            Panel::Results(lines) => lines,
            _ => &[],
        }
    }
}

/// `"{label} - {probability} - {glyph}"`
pub fn format_line(result: &LabelResult) -> String {
    let glyph = if result.matched { MATCH_GLYPH } else { NO_MATCH_GLYPH };
    format!("{} - {} - {}", result.label, result.probability, glyph)
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Panel::Hidden => Ok(()),
            Panel::Loading => write!(f, "{}", LOADING_MESSAGE),
            Panel::Results(lines) => {
                write!(f, "{}", PANEL_TITLE)?;
                for line in lines {
                    write!(f, "\n  {}", line)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, matched: bool, positive: f32) -> LabelResult {
        LabelResult {
            label: label.to_string(),
            matched,
            probabilities: [1.0 - positive, positive],
            probability: crate::format_probability(positive),
        }
    }

    #[test]
    fn test_empty_text_hides_panel() {
        let stale = vec![result("insult", true, 0.98)];
        assert_eq!(Panel::render("", Some(stale.as_slice())), Panel::Hidden);
        assert_eq!(Panel::render("", None), Panel::Hidden);
        assert!(!Panel::Hidden.is_visible());
        assert_eq!(Panel::Hidden.to_string(), "");
    }

    #[test]
    fn test_loading_without_predictions() {
        let panel = Panel::render("hello", None);
        assert_eq!(panel, Panel::Loading);
        assert!(panel.is_visible());
        assert!(panel.lines().is_empty());
        assert_eq!(panel.to_string(), "Loading predictions...");
    }

    #[test]
    fn test_result_lines() {
        let results = vec![result("insult", true, 0.98), result("threat", false, 0.012)];
        let panel = Panel::render("I hate you", Some(results.as_slice()));

        assert_eq!(panel.lines(), ["insult - 98.00% - 🤢", "threat - 1.20% - 🥰"]);
        assert_eq!(
            panel.to_string(),
            "Text Toxicity Analysis\n  insult - 98.00% - 🤢\n  threat - 1.20% - 🥰"
        );
    }
}
