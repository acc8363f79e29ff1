use ecad_core::Kiid;
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::layer::Layer;
use crate::netinfo::NetCode;

/// A straight routed segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Kiid,
    pub start: IVec2,
    pub end: IVec2,
    pub width: i32,
    pub layer: Layer,
    pub net: Option<NetCode>,
    pub locked: bool,
}

/// A routed arc segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackArc {
    pub id: Kiid,
    pub start: IVec2,
    pub end: IVec2,
    pub center: IVec2,
    /// Signed sweep in degrees; negative is clockwise.
    pub sweep_deg: f64,
    pub width: i32,
    pub layer: Layer,
    pub net: Option<NetCode>,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViaType {
    Through,
    BlindBuried,
    Micro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub id: Kiid,
    pub position: IVec2,
    pub diameter: i32,
    pub drill: i32,
    pub via_type: ViaType,
    /// Start/end copper layers for blind, buried and micro vias.
    pub layer_pair: (Layer, Layer),
    pub net: Option<NetCode>,
    pub locked: bool,
}

/// Any item of the routed-copper list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackItem {
    Segment(Track),
    Arc(TrackArc),
    Via(Via),
}

impl TrackItem {
    pub fn id(&self) -> Kiid {
        match self {
            TrackItem::Segment(t) => t.id,
            TrackItem::Arc(a) => a.id,
            TrackItem::Via(v) => v.id,
        }
    }

    pub fn net(&self) -> Option<NetCode> {
        match self {
            TrackItem::Segment(t) => t.net,
            TrackItem::Arc(a) => a.net,
            TrackItem::Via(v) => v.net,
        }
    }
}
