use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::command::BlobId;
use crate::app::rendering::text::{draw_text, line_height, text_width};
use crate::content::{Bitmap, Rgba};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Justification {
    #[default]
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobStyle {
    /// Wrap column, in characters.
    pub width: usize,
    pub margin: u32,
    /// Border thickness; 0 for none.
    pub frame: u32,
    pub background: Rgba,
    pub color: Rgba,
    pub line_spacing: u32,
    pub justification: Justification,
    pub text_scale: u32,
}

impl Default for BlobStyle {
    fn default() -> Self {
        Self {
            width: 20,
            margin: 12,
            frame: 2,
            background: [0, 0, 0, 172],
            color: [255, 255, 255, 255],
            line_spacing: 2,
            justification: Justification::Left,
            text_scale: 3,
        }
    }
}

/// A text box anchored under its owner.
#[derive(Debug, Clone)]
pub struct Blob {
    id: BlobId,
    text: String,
    style: BlobStyle,
    rendered: Option<(String, Rc<Bitmap>)>,
}

impl Blob {
    pub fn new(id: BlobId, text: impl Into<String>, style: BlobStyle) -> Self {
        Self {
            id,
            text: text.into(),
            style,
            rendered: None,
        }
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// The boxed text, re-rendered only after the text changed.
    pub fn render(&mut self) -> Rc<Bitmap> {
        if let Some((text, image)) = &self.rendered {
            if *text == self.text {
                return Rc::clone(image);
            }
        }
        let image = Rc::new(render_blob(&self.text, &self.style));
        self.rendered = Some((self.text.clone(), Rc::clone(&image)));
        image
    }
}

fn render_blob(text: &str, style: &BlobStyle) -> Bitmap {
    let scale = style.text_scale.max(1);
    let lines = wrap_text(text, style.width);
    let max_width = lines
        .iter()
        .map(|line| text_width(line, scale))
        .max()
        .unwrap_or(0);
    let line_step = line_height(scale) + style.line_spacing;
    let total_height = line_step * lines.len() as u32;
    let margin = style.margin;

    let mut image = Bitmap::solid(
        max_width + 2 * margin,
        total_height + 2 * margin,
        style.background,
    );
    let mut y = margin as i32;
    for line in &lines {
        let width = text_width(line, scale) as i32;
        let x = match style.justification {
            Justification::Left => margin as i32,
            Justification::Right => image.width() as i32 - margin as i32 - width,
            Justification::Center => (image.width() as i32 - width) / 2,
        };
        draw_text(&mut image, x, y, line, scale, style.color);
        y += line_step as i32;
    }

    if style.frame > 0 {
        let half = (margin / 2) as i32;
        image.outline_rect(
            half,
            half,
            (max_width + margin) as i32,
            (total_height + margin) as i32,
            style.frame as i32,
            style.color,
        );
    }
    image
}

/// Greedy word wrap at `width` characters. Words longer than a line are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
