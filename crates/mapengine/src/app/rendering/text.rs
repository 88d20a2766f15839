use crate::content::{Bitmap, Rgba, TRANSPARENT};

pub const GLYPH_WIDTH: u32 = 3;
pub const GLYPH_HEIGHT: u32 = 5;

const FIRST_GLYPH: u32 = ' ' as u32;
const FALLBACK_GLYPH: char = '?';

/// 3x5 bitmap font for printable ASCII. Each row holds three bits, most significant bit on
/// the left.
#[rustfmt::skip]
const GLYPHS: [[u8; GLYPH_HEIGHT as usize]; 95] = [
    [0b000, 0b000, 0b000, 0b000, 0b000], // ' '
    [0b010, 0b010, 0b010, 0b000, 0b010], // '!'
    [0b101, 0b101, 0b000, 0b000, 0b000], // '"'
    [0b101, 0b111, 0b101, 0b111, 0b101], // '#'
    [0b111, 0b110, 0b111, 0b011, 0b111], // '$'
    [0b101, 0b001, 0b010, 0b100, 0b101], // '%'
    [0b010, 0b101, 0b010, 0b101, 0b011], // '&'
    [0b010, 0b010, 0b000, 0b000, 0b000], // "'"
    [0b001, 0b010, 0b010, 0b010, 0b001], // '('
    [0b100, 0b010, 0b010, 0b010, 0b100], // ')'
    [0b000, 0b101, 0b010, 0b101, 0b000], // '*'
    [0b000, 0b010, 0b111, 0b010, 0b000], // '+'
    [0b000, 0b000, 0b000, 0b010, 0b100], // ','
    [0b000, 0b000, 0b111, 0b000, 0b000], // '-'
    [0b000, 0b000, 0b000, 0b000, 0b010], // '.'
    [0b001, 0b001, 0b010, 0b100, 0b100], // '/'
    [0b111, 0b101, 0b101, 0b101, 0b111], // '0'
    [0b010, 0b110, 0b010, 0b010, 0b111], // '1'
    [0b111, 0b001, 0b111, 0b100, 0b111], // '2'
    [0b111, 0b001, 0b111, 0b001, 0b111], // '3'
    [0b101, 0b101, 0b111, 0b001, 0b001], // '4'
    [0b111, 0b100, 0b111, 0b001, 0b111], // '5'
    [0b111, 0b100, 0b111, 0b101, 0b111], // '6'
    [0b111, 0b001, 0b010, 0b010, 0b010], // '7'
    [0b111, 0b101, 0b111, 0b101, 0b111], // '8'
    [0b111, 0b101, 0b111, 0b001, 0b111], // '9'
    [0b000, 0b010, 0b000, 0b010, 0b000], // ':'
    [0b000, 0b010, 0b000, 0b010, 0b100], // ';'
    [0b001, 0b010, 0b100, 0b010, 0b001], // '<'
    [0b000, 0b111, 0b000, 0b111, 0b000], // '='
    [0b100, 0b010, 0b001, 0b010, 0b100], // '>'
    [0b111, 0b001, 0b011, 0b000, 0b010], // '?'
    [0b111, 0b101, 0b111, 0b100, 0b111], // '@'
    [0b010, 0b101, 0b111, 0b101, 0b101], // 'A'
    [0b110, 0b101, 0b110, 0b101, 0b110], // 'B'
    [0b111, 0b100, 0b100, 0b100, 0b111], // 'C'
    [0b110, 0b101, 0b101, 0b101, 0b110], // 'D'
    [0b111, 0b100, 0b110, 0b100, 0b111], // 'E'
    [0b111, 0b100, 0b110, 0b100, 0b100], // 'F'
    [0b111, 0b100, 0b101, 0b101, 0b111], // 'G'
    [0b101, 0b101, 0b111, 0b101, 0b101], // 'H'
    [0b111, 0b010, 0b010, 0b010, 0b111], // 'I'
    [0b111, 0b001, 0b001, 0b101, 0b111], // 'J'
    [0b101, 0b101, 0b110, 0b101, 0b101], // 'K'
    [0b100, 0b100, 0b100, 0b100, 0b111], // 'L'
    [0b101, 0b111, 0b111, 0b101, 0b101], // 'M'
    [0b101, 0b111, 0b111, 0b111, 0b101], // 'N'
    [0b111, 0b101, 0b101, 0b101, 0b111], // 'O'
    [0b110, 0b101, 0b110, 0b100, 0b100], // 'P'
    [0b111, 0b101, 0b101, 0b111, 0b001], // 'Q'
    [0b110, 0b101, 0b110, 0b101, 0b101], // 'R'
    [0b111, 0b100, 0b111, 0b001, 0b111], // 'S'
    [0b111, 0b010, 0b010, 0b010, 0b010], // 'T'
    [0b101, 0b101, 0b101, 0b101, 0b111], // 'U'
    [0b101, 0b101, 0b101, 0b101, 0b010], // 'V'
    [0b101, 0b101, 0b111, 0b111, 0b101], // 'W'
    [0b101, 0b101, 0b010, 0b101, 0b101], // 'X'
    [0b101, 0b101, 0b010, 0b010, 0b010], // 'Y'
    [0b111, 0b001, 0b010, 0b100, 0b111], // 'Z'
    [0b110, 0b100, 0b100, 0b100, 0b110], // '['
    [0b100, 0b100, 0b010, 0b001, 0b001], // '\\'
    [0b011, 0b001, 0b001, 0b001, 0b011], // ']'
    [0b010, 0b101, 0b000, 0b000, 0b000], // '^'
    [0b000, 0b000, 0b000, 0b000, 0b111], // '_'
    [0b100, 0b010, 0b000, 0b000, 0b000], // '`'
    [0b000, 0b111, 0b001, 0b111, 0b111], // 'a'
    [0b100, 0b100, 0b110, 0b101, 0b110], // 'b'
    [0b000, 0b111, 0b100, 0b100, 0b111], // 'c'
    [0b001, 0b001, 0b111, 0b101, 0b111], // 'd'
    [0b000, 0b111, 0b110, 0b100, 0b111], // 'e'
    [0b011, 0b100, 0b110, 0b100, 0b100], // 'f'
    [0b000, 0b111, 0b101, 0b111, 0b001], // 'g'
    [0b100, 0b100, 0b110, 0b101, 0b101], // 'h'
    [0b010, 0b000, 0b010, 0b010, 0b010], // 'i'
    [0b001, 0b000, 0b001, 0b101, 0b010], // 'j'
    [0b100, 0b101, 0b110, 0b101, 0b101], // 'k'
    [0b100, 0b100, 0b100, 0b100, 0b111], // 'l'
    [0b000, 0b110, 0b111, 0b101, 0b101], // 'm'
    [0b000, 0b110, 0b101, 0b101, 0b101], // 'n'
    [0b000, 0b111, 0b101, 0b101, 0b111], // 'o'
    [0b000, 0b110, 0b101, 0b110, 0b100], // 'p'
    [0b000, 0b111, 0b101, 0b111, 0b001], // 'q'
    [0b000, 0b110, 0b101, 0b100, 0b100], // 'r'
    [0b000, 0b111, 0b110, 0b001, 0b111], // 's'
    [0b010, 0b111, 0b010, 0b010, 0b011], // 't'
    [0b000, 0b101, 0b101, 0b101, 0b111], // 'u'
    [0b000, 0b101, 0b101, 0b101, 0b010], // 'v'
    [0b000, 0b101, 0b101, 0b111, 0b010], // 'w'
    [0b000, 0b101, 0b010, 0b010, 0b101], // 'x'
    [0b000, 0b101, 0b101, 0b111, 0b001], // 'y'
    [0b000, 0b111, 0b001, 0b010, 0b111], // 'z'
    [0b011, 0b010, 0b110, 0b010, 0b011], // '{'
    [0b010, 0b010, 0b010, 0b010, 0b010], // '|'
    [0b110, 0b010, 0b011, 0b010, 0b110], // '}'
    [0b000, 0b011, 0b110, 0b000, 0b000], // '~'
];

fn glyph_rows(ch: char) -> [u8; GLYPH_HEIGHT as usize] {
    let code = match ch {
        ' '..='~' => ch as u32,
        _ => FALLBACK_GLYPH as u32,
    };
    GLYPHS[(code - FIRST_GLYPH) as usize]
}

/// Horizontal distance between glyph origins.
pub fn glyph_advance(scale: u32) -> u32 {
    (GLYPH_WIDTH + 1) * scale
}

pub fn line_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Width of `text` on one line, without trailing spacing.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let count = text.chars().count() as u32;
    if count == 0 {
        return 0;
    }
    count * glyph_advance(scale) - scale
}

pub fn draw_text(target: &mut Bitmap, x: i32, y: i32, text: &str, scale: u32, color: Rgba) {
    let scale = scale.max(1) as i32;
    let mut origin_x = x;
    for ch in text.chars() {
        for (row, bits) in glyph_rows(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i32 {
                if bits & (1 << (GLYPH_WIDTH as i32 - 1 - col)) == 0 {
                    continue;
                }
                target.fill_rect(
                    origin_x + col * scale,
                    y + row as i32 * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
        origin_x += glyph_advance(scale as u32) as i32;
    }
}

/// One line of text on a transparent bitmap sized to fit it.
pub fn render_text(text: &str, scale: u32, color: Rgba) -> Bitmap {
    let scale = scale.max(1);
    let mut bitmap = Bitmap::solid(
        text_width(text, scale).max(1),
        line_height(scale),
        TRANSPARENT,
    );
    draw_text(&mut bitmap, 0, 0, text, scale, color);
    bitmap
}
