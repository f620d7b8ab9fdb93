//! Seeded cell-type color assignment.
//!
//! Plot colors are part of a curation run's explicit configuration. The same
//! labels, overrides and seed always give the same mapping.

use crate::error::{CurateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Qualitative base colors, cycled when there are more cell types than entries.
const BASE_COLORS: &[&str] = &[
    "#E41A1C", "#377EB8", "#4DAF4A", "#984EA3", "#FF7F00", "#FFFF33", "#A65628", "#F781BF",
    "#999999", "#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC3", "#A6D854", "#FFD92F", "#E5C494",
    "#1B9E77", "#D95F02", "#7570B3", "#E7298A", "#66A61E", "#E6AB02", "#A6761D", "#666666",
];

/// Simple LCG random number generator.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn shuffle<T>(&mut self, vec: &mut [T]) {
        for i in (1..vec.len()).rev() {
            let j = (self.next_u64() as usize) % (i + 1);
            vec.swap(i, j);
        }
    }
}

/// Check for a `#RRGGBB` color.
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// A label and its color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub label: String,
    pub color: String,
}

/// Cell-type to color mapping, in label order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Palette {
    pub entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Assign a color to every label.
    ///
    /// Labels present in `overrides` keep their color. The rest draw from the
    /// base colors not already taken by an override, shuffled by `seed`.
    pub fn assign<S: AsRef<str>>(
        labels: &[S],
        overrides: &BTreeMap<String, String>,
        seed: u64,
    ) -> Result<Self> {
        for (label, color) in overrides {
            if !is_hex_color(color) {
                return Err(CurateError::InvalidParameter(format!(
                    "Color '{}' for '{}' is not of the form #RRGGBB",
                    color, label
                )));
            }
        }

        let mut pool: Vec<&str> = BASE_COLORS
            .iter()
            .copied()
            .filter(|c| !overrides.values().any(|o| o.eq_ignore_ascii_case(c)))
            .collect();
        if pool.is_empty() {
            pool = BASE_COLORS.to_vec();
        }
        SimpleRng::new(seed).shuffle(&mut pool);

        let mut next = 0;
        let entries = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                let color = match overrides.get(label) {
                    Some(color) => color.clone(),
                    None => {
                        let color = pool[next % pool.len()].to_string();
                        next += 1;
                        color
                    }
                };
                PaletteEntry {
                    label: label.to_string(),
                    color,
                }
            })
            .collect();

        Ok(Self { entries })
    }

    /// Color of one label.
    pub fn color(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.color.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(CurateError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["Astro", "Oligo", "Micro", "Neuron"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_deterministic_per_seed() {
        let a = Palette::assign(&labels(), &BTreeMap::new(), 123).unwrap();
        let b = Palette::assign(&labels(), &BTreeMap::new(), 123).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_seed_changes_assignment() {
        let palettes: Vec<Palette> = (0..8)
            .map(|seed| Palette::assign(&labels(), &BTreeMap::new(), seed).unwrap())
            .collect();
        assert!(palettes.iter().any(|p| *p != palettes[0]));
    }

    #[test]
    fn test_distinct_colors_when_pool_suffices() {
        let palette = Palette::assign(&labels(), &BTreeMap::new(), 7).unwrap();
        let mut colors: Vec<&str> = palette.entries.iter().map(|e| e.color.as_str()).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 4);
    }

    #[test]
    fn test_overrides_respected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Micro".to_string(), "#377EB8".to_string());
        let palette = Palette::assign(&labels(), &overrides, 1).unwrap();

        assert_eq!(palette.color("Micro"), Some("#377EB8"));
        for label in ["Astro", "Oligo", "Neuron"] {
            assert_ne!(palette.color(label), Some("#377EB8"));
        }
    }

    #[test]
    fn test_invalid_override() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Astro".to_string(), "red".to_string());
        assert!(Palette::assign(&labels(), &overrides, 1).is_err());
    }

    #[test]
    fn test_cycles_past_base_colors() {
        let many: Vec<String> = (0..BASE_COLORS.len() + 3).map(|i| format!("T{}", i)).collect();
        let palette = Palette::assign(&many, &BTreeMap::new(), 42).unwrap();
        assert_eq!(palette.len(), many.len());
        assert_eq!(palette.entries[0].color, palette.entries[BASE_COLORS.len()].color);
    }

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#a1B2c3"));
        assert!(!is_hex_color("a1B2c3"));
        assert!(!is_hex_color("#a1B2c"));
        assert!(!is_hex_color("#GGGGGG"));
    }
}
