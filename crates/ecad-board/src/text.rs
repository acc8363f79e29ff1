use ecad_core::Kiid;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::layer::Layer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextHJustify {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextVJustify {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Free text on the board or attached to a footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardText {
    pub id: Kiid,
    pub text: String,
    pub position: IVec2,
    pub angle_deg: f64,
    pub size: IVec2,
    pub thickness: i32,
    pub mirrored: bool,
    pub visible: bool,
    pub layer: Layer,
    pub h_justify: TextHJustify,
    pub v_justify: TextVJustify,
}

impl BoardText {
    pub fn new(text: impl Into<String>, layer: Layer) -> Self {
        BoardText {
            id: Kiid::new(),
            text: text.into(),
            position: IVec2::ZERO,
            angle_deg: 0.0,
            size: IVec2::ZERO,
            thickness: 0,
            mirrored: false,
            visible: true,
            layer,
            h_justify: TextHJustify::default(),
            v_justify: TextVJustify::default(),
        }
    }
}
