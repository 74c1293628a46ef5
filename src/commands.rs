//! Voice command parsing
//!
//! Transcripts arrive in Russian from the speech recognizer. A command is a
//! keyword prefix followed by an argument; the argument only has to contain
//! one of the known words. Execution goes through the peer handle, so a
//! voice command on a SECONDARY is rejected like any other mutation.

use rand::Rng;
use tracing::debug;

use crate::error::AppResult;
use crate::models::{ShapeFactory, ShapeKind, Theme};
use crate::peer::GameStateHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Add,
    Theme,
    Color,
    Delete,
}

// "удалить" before "удали" so the longer form keeps its full argument
const VERBS: &[(&str, Verb)] = &[
    ("добавить", Verb::Add),
    ("добавь", Verb::Add),
    ("создай", Verb::Add),
    ("тема", Verb::Theme),
    ("цвет", Verb::Color),
    ("удалить", Verb::Delete),
    ("удали", Verb::Delete),
];

const SHAPES: &[(&str, ShapeKind)] = &[
    ("круг", ShapeKind::Circle),
    ("прямоугольник", ShapeKind::Rectangle),
    ("квадрат", ShapeKind::Square),
    ("треугольник", ShapeKind::Triangle),
];

const THEMES: &[(&str, Theme)] = &[
    ("светлая", Theme::Light),
    ("тёмная", Theme::Dark),
    ("темная", Theme::Dark),
    ("системная", Theme::System),
];

const COLORS: &[(&str, &str)] = &[
    ("красный", "#FF0000"),
    ("синий", "#0000FF"),
    ("зелёный", "#00FF00"),
    ("зеленый", "#00FF00"),
    ("жёлтый", "#FFFF00"),
    ("желтый", "#FFFF00"),
];

/// A recognized voice command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    AddShape(ShapeKind),
    SetTheme(Theme),
    SetColor(&'static str),
    DeleteLast,
}

impl VoiceCommand {
    /// Parse a transcript. Returns `None` for anything unrecognized.
    pub fn parse(transcript: &str) -> Option<Self> {
        let transcript = transcript.trim().to_lowercase();
        let Some((verb, argument)) = VERBS.iter().find_map(|(keyword, verb)| {
            transcript
                .strip_prefix(keyword)
                .map(|rest| (*verb, rest.trim()))
        }) else {
            debug!("Unknown voice command: {}", transcript);
            return None;
        };

        let command = match verb {
            Verb::Add => lookup(SHAPES, argument).map(VoiceCommand::AddShape),
            Verb::Theme => lookup(THEMES, argument).map(VoiceCommand::SetTheme),
            Verb::Color => lookup(COLORS, argument).map(VoiceCommand::SetColor),
            Verb::Delete if argument.contains("последний") => Some(VoiceCommand::DeleteLast),
            Verb::Delete => None,
        };
        if command.is_none() {
            debug!(?verb, "Unrecognized argument in voice command: {}", argument);
        }
        command
    }

    /// Carry the command out on `peer`. Returns whether the shared state
    /// changed, which is never the case on a peer that is not MAIN.
    pub async fn execute<R: Rng + ?Sized>(
        &self,
        peer: &GameStateHandle,
        factory: &ShapeFactory,
        rng: &mut R,
    ) -> AppResult<bool> {
        match *self {
            VoiceCommand::AddShape(kind) => {
                let color = peer.state().await?.selected_color;
                let shape = factory.generate(kind, &color, rng);
                peer.add_shape(shape).await
            }
            VoiceCommand::SetTheme(theme) => peer.set_theme(theme).await,
            VoiceCommand::SetColor(color) => peer.set_color(color).await,
            VoiceCommand::DeleteLast => peer.delete_last_shape().await,
        }
    }
}

fn lookup<T: Copy>(table: &[(&str, T)], argument: &str) -> Option<T> {
    table
        .iter()
        .find(|(word, _)| argument.contains(word))
        .map(|(_, value)| *value)
}
