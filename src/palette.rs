//! Categorical colour palettes for group traces.

use std::collections::HashMap;

/// Plotly's qualitative "Dark24" palette.
pub const DARK24: [&str; 24] = [
    "#2E91E5", "#E15F99", "#1CA71C", "#FB0D0D", "#DA16FF", "#222A2A", "#B68100", "#750D86",
    "#EB663B", "#511CFB", "#00A08B", "#FB00D1", "#FC0080", "#B2828D", "#6C7C32", "#778AAE",
    "#862A16", "#A777F1", "#620042", "#1616A7", "#DA60CA", "#6C4516", "#0D2A63", "#AF0038",
];

/// Plotly's default qualitative palette.
pub const PLOTLY: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

/// An ordered list of `#RRGGBB` colours. Lookups wrap around, so any number of
/// groups gets a colour; groups beyond the palette length reuse entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_static(&DARK24)
    }
}

impl Palette {
    fn from_static(colors: &[&str]) -> Self {
        Self {
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Built-in palette by name (`dark24`, `plotly`).
    pub fn named(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "dark24" => Some(Self::from_static(&DARK24)),
            "plotly" => Some(Self::from_static(&PLOTLY)),
            _ => None,
        }
    }

    /// Custom palette. Returns `None` when empty or when a colour is not `#RRGGBB`.
    pub fn custom(colors: Vec<String>) -> Option<Self> {
        if colors.is_empty() || colors.iter().any(|c| parse_hex(c).is_none()) {
            return None;
        }
        Some(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colour for the group at `index`, reusing the palette cyclically.
    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    /// Colour per group label, by position in `groups`.
    pub fn assign(&self, groups: &[String]) -> HashMap<String, String> {
        groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), self.color(i).to_string()))
            .collect()
    }
}

/// Parse `#RRGGBB` into its components.
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}
