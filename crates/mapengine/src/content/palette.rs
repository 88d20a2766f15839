use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use super::bitmap::Rgba;

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("palette has no entry for {key}")]
    NotFound { key: String },
    #[error("palette index {index} out of range for {len} colours")]
    OutOfRange { index: isize, len: usize },
    #[error("palette text has no '#' header line")]
    MissingHeader,
    #[error("line {line}: invalid colour component '{value}'")]
    InvalidComponent { line: usize, value: String },
    #[error("failed to read palette file: {0}")]
    Io(#[from] std::io::Error),
}

/// Colour table of a scene: pixel colour <-> lowercase tile name.
///
/// Text format (GIMP palette): everything up to and including the first line starting with
/// `#` is header; each following `R G B Name` row registers one colour. Comment lines and rows
/// with fewer than four fields are skipped.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    names_by_color: HashMap<Rgba, String>,
    colors_by_name: HashMap<String, Rgba>,
    by_index: Vec<Rgba>,
}

impl Palette {
    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, PaletteError> {
        let mut lines = text.lines().enumerate();
        if !lines.any(|(_, line)| line.trim().starts_with('#')) {
            return Err(PaletteError::MissingHeader);
        }

        let mut palette = Palette::default();
        for (line_index, line) in lines {
            let line = line.trim();
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || line.starts_with('#') {
                continue;
            }
            let mut rgb = [0u8; 3];
            for (slot, value) in rgb.iter_mut().zip(&fields[..3]) {
                *slot = value
                    .parse::<u8>()
                    .map_err(|_| PaletteError::InvalidComponent {
                        line: line_index + 1,
                        value: (*value).to_string(),
                    })?;
            }
            let name = fields[3..].join(" ");
            palette.insert([rgb[0], rgb[1], rgb[2], 255], &name);
        }
        Ok(palette)
    }

    /// Registers `color` under `name`. A later row with the same colour or name replaces the
    /// mapping in that direction; the index table keeps every row.
    pub fn insert(&mut self, color: Rgba, name: &str) {
        let name = name.to_lowercase();
        self.names_by_color.insert(color, name.clone());
        self.colors_by_name.insert(name, color);
        self.by_index.push(color);
    }

    pub fn lookup_by_color(&self, color: Rgba) -> Result<&str, PaletteError> {
        self.names_by_color
            .get(&color)
            .map(String::as_str)
            .ok_or_else(|| PaletteError::NotFound {
                key: format!("colour {color:?}"),
            })
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<Rgba, PaletteError> {
        self.colors_by_name
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| PaletteError::NotFound {
                key: format!("name '{name}'"),
            })
    }

    /// Negative indices count from the end.
    pub fn lookup_by_index(&self, index: isize) -> Result<Rgba, PaletteError> {
        let len = self.by_index.len();
        let resolved = if index < 0 {
            len as isize + index
        } else {
            index
        };
        if resolved < 0 || resolved >= len as isize {
            return Err(PaletteError::OutOfRange { index, len });
        }
        Ok(self.by_index[resolved as usize])
    }

    pub fn len(&self) -> usize {
        self.names_by_color.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_by_color.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "GIMP Palette\n\
Name: room\n\
Columns: 3\n\
#\n\
255   0   0 Wall\n\
  0 255   0 ground\n\
  0   0 255 Hero\n\
# trailing comment\n";

    #[test]
    fn name_and_color_lookups_round_trip() {
        let palette = Palette::parse(FIXTURE).expect("palette");
        assert_eq!(palette.len(), 3);
        for color in [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]] {
            let name = palette.lookup_by_color(color).expect("name");
            assert_eq!(palette.lookup_by_name(name).expect("color"), color);
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        let palette = Palette::parse(FIXTURE).expect("palette");
        assert_eq!(palette.lookup_by_color([255, 0, 0, 255]).expect("name"), "wall");
        assert_eq!(palette.lookup_by_name("HERO").expect("color"), [0, 0, 255, 255]);
    }

    #[test]
    fn unknown_color_and_name_are_not_found() {
        let palette = Palette::parse(FIXTURE).expect("palette");
        assert!(matches!(
            palette.lookup_by_color([1, 2, 3, 255]),
            Err(PaletteError::NotFound { .. })
        ));
        assert!(matches!(
            palette.lookup_by_color([255, 0, 0, 0]),
            Err(PaletteError::NotFound { .. })
        ));
        assert!(matches!(
            palette.lookup_by_name("lava"),
            Err(PaletteError::NotFound { .. })
        ));
    }

    #[test]
    fn index_lookup_supports_negative_indices() {
        let palette = Palette::parse(FIXTURE).expect("palette");
        assert_eq!(palette.lookup_by_index(0).expect("first"), [255, 0, 0, 255]);
        assert_eq!(palette.lookup_by_index(-1).expect("last"), [0, 0, 255, 255]);
        assert_eq!(palette.lookup_by_index(-3).expect("first"), [255, 0, 0, 255]);
        assert!(matches!(
            palette.lookup_by_index(3),
            Err(PaletteError::OutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            palette.lookup_by_index(-4),
            Err(PaletteError::OutOfRange { .. })
        ));
    }

    #[test]
    fn header_is_required() {
        assert!(matches!(
            Palette::parse("255 0 0 wall\n"),
            Err(PaletteError::MissingHeader)
        ));
    }

    #[test]
    fn bad_component_reports_line() {
        let err = Palette::parse("#\n300 0 0 wall\n").expect_err("invalid");
        assert!(matches!(err, PaletteError::InvalidComponent { line: 2, .. }));
    }
}
