use ecad_core::{Kiid, LibId};
use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::pad::Pad;
use crate::shape::BoardShape;
use crate::text::BoardText;
use crate::zone::Zone;

/// A placed component: pads, graphics, keepout zones and the reference /
/// value texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub id: Kiid,
    pub fpid: LibId,
    pub position: IVec2,
    pub orientation_deg: f64,
    /// Placed on the back side (flipped).
    pub flipped: bool,
    pub reference: String,
    pub value: String,
    pub description: String,
    pub pads: Vec<Pad>,
    pub shapes: Vec<BoardShape>,
    pub texts: Vec<BoardText>,
    /// Keepout areas owned by the footprint.
    pub zones: Vec<Zone>,
    pub locked: bool,
}

impl Footprint {
    pub fn new(fpid: LibId) -> Self {
        Footprint {
            id: Kiid::new(),
            fpid,
            position: IVec2::ZERO,
            orientation_deg: 0.0,
            flipped: false,
            reference: String::new(),
            value: String::new(),
            description: String::new(),
            pads: Vec::new(),
            shapes: Vec::new(),
            texts: Vec::new(),
            zones: Vec::new(),
            locked: false,
        }
    }

    /// Clone as a fresh instance: every contained item gets a new identifier
    /// so two placements of the same library footprint never share UUIDs.
    pub fn instantiate(&self) -> Footprint {
        let mut fp = self.clone();
        fp.id = Kiid::new();

        for pad in &mut fp.pads {
            pad.id = Kiid::new();
        }
        for shape in &mut fp.shapes {
            shape.id = Kiid::new();
        }
        for text in &mut fp.texts {
            text.id = Kiid::new();
        }
        for zone in &mut fp.zones {
            zone.id = Kiid::new();
        }

        fp
    }

    pub fn pad_by_name(&self, name: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.name == name)
    }

    /// Pads are kept in source order so one-based pad indices resolve.
    pub fn pad_by_index(&self, index: usize) -> Option<&Pad> {
        self.pads.get(index)
    }

    pub fn pad_by_index_mut(&mut self, index: usize) -> Option<&mut Pad> {
        self.pads.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::{Pad, PadAttribute};

    #[test]
    fn instantiate_renews_all_ids() {
        let mut lib = Footprint::new(LibId::from_item("R_0402"));
        lib.pads.push(Pad::new("1", PadAttribute::Smd));
        lib.pads.push(Pad::new("2", PadAttribute::Smd));

        let a = lib.instantiate();
        let b = lib.instantiate();

        assert_ne!(a.id, b.id);
        assert_ne!(a.pads[0].id, b.pads[0].id);
        assert_eq!(a.pads[0].name, "1");
    }
}
