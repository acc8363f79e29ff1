use std::fmt;

use serde::{Deserialize, Serialize};

/// A board layer. Copper layers are numbered so that the front is physical
/// layer 1 and the back is the highest physical layer; `In(n)` is the n-th
/// inner copper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    FCu,
    /// Inner copper layer, 1..=30.
    In(u8),
    BCu,
    FAdhes,
    BAdhes,
    FPaste,
    BPaste,
    FSilkS,
    BSilkS,
    FMask,
    BMask,
    DwgsUser,
    CmtsUser,
    Eco1User,
    Eco2User,
    EdgeCuts,
    Margin,
    FCrtYd,
    BCrtYd,
    FFab,
    BFab,
}

impl Layer {
    /// Map a 1-based physical copper layer number onto the enumeration:
    /// front = 1, back = the stack's maximum physical layer.
    pub fn copper(physical: u32, max_physical: u32) -> Option<Layer> {
        if physical == 1 {
            Some(Layer::FCu)
        } else if physical == max_physical {
            Some(Layer::BCu)
        } else if (2..=31).contains(&physical) {
            Some(Layer::In((physical - 1) as u8))
        } else {
            None
        }
    }

    pub fn is_copper(&self) -> bool {
        matches!(self, Layer::FCu | Layer::In(_) | Layer::BCu)
    }

    /// Bit position for [`LayerSet`]. Copper occupies 0..=31, technical
    /// layers follow.
    fn bit(&self) -> u32 {
        match *self {
            Layer::FCu => 0,
            Layer::In(n) => u32::from(n),
            Layer::BCu => 31,
            Layer::FAdhes => 32,
            Layer::BAdhes => 33,
            Layer::FPaste => 34,
            Layer::BPaste => 35,
            Layer::FSilkS => 36,
            Layer::BSilkS => 37,
            Layer::FMask => 38,
            Layer::BMask => 39,
            Layer::DwgsUser => 40,
            Layer::CmtsUser => 41,
            Layer::Eco1User => 42,
            Layer::Eco2User => 43,
            Layer::EdgeCuts => 44,
            Layer::Margin => 45,
            Layer::FCrtYd => 46,
            Layer::BCrtYd => 47,
            Layer::FFab => 48,
            Layer::BFab => 49,
        }
    }

    fn from_bit(bit: u32) -> Option<Layer> {
        Some(match bit {
            0 => Layer::FCu,
            n @ 1..=30 => Layer::In(n as u8),
            31 => Layer::BCu,
            32 => Layer::FAdhes,
            33 => Layer::BAdhes,
            34 => Layer::FPaste,
            35 => Layer::BPaste,
            36 => Layer::FSilkS,
            37 => Layer::BSilkS,
            38 => Layer::FMask,
            39 => Layer::BMask,
            40 => Layer::DwgsUser,
            41 => Layer::CmtsUser,
            42 => Layer::Eco1User,
            43 => Layer::Eco2User,
            44 => Layer::EdgeCuts,
            45 => Layer::Margin,
            46 => Layer::FCrtYd,
            47 => Layer::BCrtYd,
            48 => Layer::FFab,
            49 => Layer::BFab,
            _ => return None,
        })
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Layer::FCu => write!(f, "F.Cu"),
            Layer::In(n) => write!(f, "In{n}.Cu"),
            Layer::BCu => write!(f, "B.Cu"),
            Layer::FAdhes => write!(f, "F.Adhes"),
            Layer::BAdhes => write!(f, "B.Adhes"),
            Layer::FPaste => write!(f, "F.Paste"),
            Layer::BPaste => write!(f, "B.Paste"),
            Layer::FSilkS => write!(f, "F.SilkS"),
            Layer::BSilkS => write!(f, "B.SilkS"),
            Layer::FMask => write!(f, "F.Mask"),
            Layer::BMask => write!(f, "B.Mask"),
            Layer::DwgsUser => write!(f, "Dwgs.User"),
            Layer::CmtsUser => write!(f, "Cmts.User"),
            Layer::Eco1User => write!(f, "Eco1.User"),
            Layer::Eco2User => write!(f, "Eco2.User"),
            Layer::EdgeCuts => write!(f, "Edge.Cuts"),
            Layer::Margin => write!(f, "Margin"),
            Layer::FCrtYd => write!(f, "F.CrtYd"),
            Layer::BCrtYd => write!(f, "B.CrtYd"),
            Layer::FFab => write!(f, "F.Fab"),
            Layer::BFab => write!(f, "B.Fab"),
        }
    }
}

/// Electrical role of a copper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CopperKind {
    #[default]
    Signal,
    Jumper,
    Power,
}

/// A set of board layers, stored as a bitmask. Items that live on several
/// layers at once (keepouts, layer-set graphics) carry one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerSet(u64);

impl LayerSet {
    pub const fn empty() -> Self {
        LayerSet(0)
    }

    pub fn single(layer: Layer) -> Self {
        let mut set = LayerSet::empty();
        set.insert(layer);
        set
    }

    /// Every copper layer of an `n`-copper-layer board.
    pub fn all_copper(copper_count: u32) -> Self {
        let mut set = LayerSet::empty();
        set.insert(Layer::FCu);
        set.insert(Layer::BCu);
        for n in 1..copper_count.saturating_sub(1).min(31) {
            set.insert(Layer::In(n as u8));
        }
        set
    }

    /// The four documentation layers.
    pub fn all_documentation() -> Self {
        [Layer::DwgsUser, Layer::CmtsUser, Layer::Eco1User, Layer::Eco2User]
            .into_iter()
            .collect()
    }

    /// Every layer the model knows about.
    pub fn all(copper_count: u32) -> Self {
        let mut set = Self::all_copper(copper_count);
        for bit in 32..=49 {
            set.0 |= 1 << bit;
        }
        set
    }

    pub fn insert(&mut self, layer: Layer) {
        self.0 |= 1 << layer.bit();
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.0 & (1 << layer.bit()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(&self, other: LayerSet) -> LayerSet {
        LayerSet(self.0 | other.0)
    }

    pub fn intersect(&self, other: LayerSet) -> LayerSet {
        LayerSet(self.0 & other.0)
    }

    /// Layers in bit order (front copper first).
    pub fn iter(&self) -> impl Iterator<Item = Layer> + '_ {
        (0..=49u32).filter(|bit| self.0 & (1 << bit) != 0).filter_map(Layer::from_bit)
    }

    pub fn first(&self) -> Option<Layer> {
        self.iter().next()
    }

    /// Only the copper members.
    pub fn copper_only(&self) -> LayerSet {
        LayerSet(self.0 & 0xFFFF_FFFF)
    }
}

impl FromIterator<Layer> for LayerSet {
    fn from_iter<T: IntoIterator<Item = Layer>>(iter: T) -> Self {
        let mut set = LayerSet::empty();
        for layer in iter {
            set.insert(layer);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copper_numbering_front_and_back() {
        assert_eq!(Layer::copper(1, 4), Some(Layer::FCu));
        assert_eq!(Layer::copper(4, 4), Some(Layer::BCu));
        assert_eq!(Layer::copper(2, 4), Some(Layer::In(1)));
        assert_eq!(Layer::copper(3, 4), Some(Layer::In(2)));
        assert_eq!(Layer::copper(0, 4), None);
    }

    #[test]
    fn layer_set_roundtrips() {
        let set: LayerSet = [Layer::FCu, Layer::BMask, Layer::In(5)].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains(Layer::In(5)));
        assert!(!set.contains(Layer::In(6)));

        let layers: Vec<Layer> = set.iter().collect();
        assert_eq!(layers, vec![Layer::FCu, Layer::In(5), Layer::BMask]);
    }

    #[test]
    fn copper_mask_for_four_layers() {
        let set = LayerSet::all_copper(4);
        assert!(set.contains(Layer::FCu));
        assert!(set.contains(Layer::In(1)));
        assert!(set.contains(Layer::In(2)));
        assert!(set.contains(Layer::BCu));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn display_names_match_kicad() {
        assert_eq!(Layer::FCu.to_string(), "F.Cu");
        assert_eq!(Layer::In(3).to_string(), "In3.Cu");
        assert_eq!(Layer::EdgeCuts.to_string(), "Edge.Cuts");
    }
}
