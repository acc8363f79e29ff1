use std::collections::BTreeMap;

use ecad_core::UnitScale;
use glam::IVec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinType {
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
    Unspecified,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
    /// "free" — not internally connected.
    Free,
}

impl PinType {
    pub fn from_token(tok: &str) -> Option<Self> {
        Some(match tok {
            "input" => PinType::Input,
            "output" => PinType::Output,
            "bidirectional" => PinType::Bidirectional,
            "tri_state" => PinType::TriState,
            "passive" => PinType::Passive,
            "unspecified" => PinType::Unspecified,
            "power_in" => PinType::PowerIn,
            "power_out" => PinType::PowerOut,
            "open_collector" => PinType::OpenCollector,
            "open_emitter" => PinType::OpenEmitter,
            "unconnected" | "no_connect" => PinType::NoConnect,
            "free" => PinType::Free,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinGraphicStyle {
    Line,
    Inverted,
    Clock,
    InvertedClock,
    InputLow,
    ClockLow,
    OutputLow,
    FallingEdgeClock,
    NonLogic,
}

impl PinGraphicStyle {
    pub fn from_token(tok: &str) -> Option<Self> {
        Some(match tok {
            "line" => PinGraphicStyle::Line,
            "inverted" => PinGraphicStyle::Inverted,
            "clock" => PinGraphicStyle::Clock,
            "inverted_clock" => PinGraphicStyle::InvertedClock,
            "input_low" => PinGraphicStyle::InputLow,
            "clock_low" => PinGraphicStyle::ClockLow,
            "output_low" => PinGraphicStyle::OutputLow,
            "edge_clock_high" => PinGraphicStyle::FallingEdgeClock,
            "non_logic" => PinGraphicStyle::NonLogic,
            _ => return None,
        })
    }
}

/// One of the four cardinal directions a pin can point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinOrientation {
    Right,
    Up,
    Left,
    Down,
}

impl PinOrientation {
    /// From the degree integer stored in the file. Anything outside the four
    /// cardinals is a parse error at the call site.
    pub fn from_degrees(deg: i64) -> Option<Self> {
        match deg {
            0 => Some(PinOrientation::Right),
            90 => Some(PinOrientation::Up),
            180 => Some(PinOrientation::Left),
            270 => Some(PinOrientation::Down),
            _ => None,
        }
    }
}

/// An alternate pin assignment (name plus its own electrical type and style).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAlt {
    pub name: String,
    pub pin_type: PinType,
    pub style: PinGraphicStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub pin_type: PinType,
    pub style: PinGraphicStyle,
    pub position: IVec2,
    pub length: i32,
    pub orientation: PinOrientation,
    pub name: String,
    pub number: String,
    pub name_text_size: i32,
    pub number_text_size: i32,
    pub visible: bool,
    pub alternates: BTreeMap<String, PinAlt>,
    pub unit: i32,
    pub body_style: i32,
}

impl Pin {
    pub fn new() -> Self {
        let text_size = UnitScale::SCHEMATIC.mm_to_iu(1.27);
        Pin {
            pin_type: PinType::Unspecified,
            style: PinGraphicStyle::Line,
            position: IVec2::ZERO,
            length: 0,
            orientation: PinOrientation::Right,
            name: String::new(),
            number: String::new(),
            name_text_size: text_size,
            number_text_size: text_size,
            visible: true,
            alternates: BTreeMap::new(),
            unit: 1,
            body_style: 1,
        }
    }
}

impl Default for Pin {
    fn default() -> Self {
        Pin::new()
    }
}
