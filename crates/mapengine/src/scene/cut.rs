use serde::{Deserialize, Serialize};

use crate::app::rendering::text::render_text;
use crate::app::rendering::{PixelRect, RenderTarget};
use crate::app::{InputAction, InputSnapshot};
use crate::content::{Bitmap, Rgba};

const TITLE_SCALE: u32 = 8;
const OPTION_SCALE: u32 = 4;
const TEXT_COLOR: Rgba = [255, 255, 255, 255];
const HIGHLIGHT_COLOR: Rgba = [255, 214, 64, 255];

/// What happens when a cut option is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CutAction {
    /// Leave the cut and resume the scene.
    Continue,
    Restart,
    GameOver,
    LoadScene { scene: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutOption {
    pub label: String,
    #[serde(flatten)]
    pub action: CutAction,
}

/// A full-screen interlude: a title and an optional menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    pub title: String,
    #[serde(default)]
    pub options: Vec<CutOption>,
    /// Taken on acknowledgement when there are no options.
    #[serde(default)]
    pub exit: Option<CutAction>,
    #[serde(default = "default_background")]
    pub background: Rgba,
}

fn default_background() -> Rgba {
    [0, 0, 0, 255]
}

impl Cut {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            options: Vec::new(),
            exit: None,
            background: default_background(),
        }
    }

    pub fn with_option(mut self, label: impl Into<String>, action: CutAction) -> Self {
        self.options.push(CutOption {
            label: label.into(),
            action,
        });
        self
    }

    pub fn with_exit(mut self, action: CutAction) -> Self {
        self.exit = Some(action);
        self
    }

    pub fn game_over() -> Self {
        Self::new("Game Over")
            .with_option("Start new game", CutAction::Restart)
            .with_option("Exit", CutAction::GameOver)
    }
}

/// A cut on screen, with its menu highlight.
#[derive(Debug, Clone)]
pub struct ActiveCut {
    cut: Cut,
    highlighted: usize,
    needs_draw: bool,
}

impl ActiveCut {
    pub fn new(cut: Cut) -> Self {
        Self {
            cut,
            highlighted: 0,
            needs_draw: true,
        }
    }

    pub fn cut(&self) -> &Cut {
        &self.cut
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    /// Without options, fire or escape leave through `exit`. With options, up and down move
    /// the highlight, fire picks it and escape picks the first option.
    pub fn handle_input(&mut self, input: &InputSnapshot) -> Option<CutAction> {
        let options = &self.cut.options;
        if options.is_empty() {
            if input.was_pressed(InputAction::Fire) || input.was_pressed(InputAction::Quit) {
                return Some(self.cut.exit.clone().unwrap_or(CutAction::Continue));
            }
            return None;
        }

        if input.was_pressed(InputAction::Quit) {
            return Some(options[0].action.clone());
        }
        if input.was_pressed(InputAction::Fire) {
            return Some(options[self.highlighted].action.clone());
        }
        let count = options.len();
        if input.was_pressed(InputAction::MoveUp) {
            self.highlighted = (self.highlighted + count - 1) % count;
            self.needs_draw = true;
        } else if input.was_pressed(InputAction::MoveDown) {
            self.highlighted = (self.highlighted + 1) % count;
            self.needs_draw = true;
        }
        None
    }

    /// Paints the whole screen, only when something changed since the last call.
    pub fn draw(&mut self, target: &mut dyn RenderTarget) -> bool {
        if !self.needs_draw {
            return false;
        }
        let (width, height) = target.size();
        target.fill_rect(PixelRect::new(0, 0, width, height), self.cut.background);

        let y_step = (height / (self.cut.options.len() as u32 + 2)) as i32;
        let title = render_text(&self.cut.title, TITLE_SCALE, TEXT_COLOR);
        blit_centered(target, &title, y_step);

        for (index, option) in self.cut.options.iter().enumerate() {
            let color = if index == self.highlighted {
                HIGHLIGHT_COLOR
            } else {
                TEXT_COLOR
            };
            let label = render_text(&option.label, OPTION_SCALE, color);
            blit_centered(target, &label, y_step * (index as i32 + 2));
        }
        self.needs_draw = false;
        true
    }
}

fn blit_centered(target: &mut dyn RenderTarget, image: &Bitmap, center_y: i32) {
    let (width, _) = target.size();
    let x = (width as i32 - image.width() as i32) / 2;
    let y = center_y - image.height() as i32 / 2;
    target.blit(image, x, y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ActionStates;
    use crate::testing::RecordingTarget;

    fn menu() -> ActiveCut {
        ActiveCut::new(
            Cut::new("Pick")
                .with_option("One", CutAction::Continue)
                .with_option("Two", CutAction::Restart)
                .with_option("Three", CutAction::GameOver),
        )
    }

    #[test]
    fn acknowledgement_leaves_a_plain_cut() {
        let mut cut = ActiveCut::new(Cut::new("Chapter 1"));
        assert_eq!(cut.handle_input(&InputSnapshot::empty()), None);
        assert_eq!(
            cut.handle_input(&InputSnapshot::empty().with_action_pressed(InputAction::Fire)),
            Some(CutAction::Continue)
        );

        let mut with_exit = ActiveCut::new(Cut::new("The End").with_exit(CutAction::GameOver));
        assert_eq!(
            with_exit.handle_input(&InputSnapshot::empty().with_action_pressed(InputAction::Quit)),
            Some(CutAction::GameOver)
        );
    }

    #[test]
    fn held_keys_do_not_trigger_options() {
        let mut states = ActionStates::default();
        states.set(InputAction::Fire, true);
        states.clear_edges();
        let held = InputSnapshot::new(false, states);

        let mut cut = menu();
        assert!(held.is_down(InputAction::Fire));
        assert_eq!(cut.handle_input(&held), None);
    }

    #[test]
    fn navigation_wraps_and_fire_selects_the_highlight() {
        let mut cut = menu();
        let up = InputSnapshot::empty().with_action_pressed(InputAction::MoveUp);
        assert_eq!(cut.handle_input(&up), None);
        assert_eq!(cut.highlighted(), 2);

        let down = InputSnapshot::empty().with_action_pressed(InputAction::MoveDown);
        cut.handle_input(&down);
        cut.handle_input(&down);
        assert_eq!(cut.highlighted(), 1);

        let fire = InputSnapshot::empty().with_action_pressed(InputAction::Fire);
        assert_eq!(cut.handle_input(&fire), Some(CutAction::Restart));
    }

    #[test]
    fn escape_selects_the_first_option() {
        let mut cut = menu();
        cut.handle_input(&InputSnapshot::empty().with_action_pressed(InputAction::MoveDown));
        let escape = InputSnapshot::empty().with_action_pressed(InputAction::Quit);
        assert_eq!(cut.handle_input(&escape), Some(CutAction::Continue));
    }

    #[test]
    fn drawing_happens_once_until_the_highlight_moves() {
        let mut cut = menu();
        let mut target = RecordingTarget::new(160, 120);
        assert!(cut.draw(&mut target));
        assert_eq!(target.fills.len(), 1);
        assert!(!cut.draw(&mut target));

        cut.handle_input(&InputSnapshot::empty().with_action_pressed(InputAction::MoveDown));
        assert!(cut.draw(&mut target));
    }

    #[test]
    fn cuts_deserialize_from_tagged_json() {
        let cut: Cut = serde_json::from_str(
            r#"{
                "title": "Crossroads",
                "options": [
                    {"label": "North", "action": "load_scene", "scene": "forest"},
                    {"label": "Stay", "action": "continue"}
                ]
            }"#,
        )
        .expect("cut");
        assert_eq!(
            cut.options[0].action,
            CutAction::LoadScene {
                scene: "forest".to_string()
            }
        );
        assert_eq!(cut.background, [0, 0, 0, 255]);
        assert_eq!(cut.exit, None);
    }
}
