/// Schematic internal units per millimetre (one IU = 100 nm).
pub const SCH_IU_PER_MM: f64 = 1e4;

/// Board internal units per millimetre (one IU = 1 nm).
pub const PCB_IU_PER_MM: f64 = 1e6;

/// Conversion between file millimetres and integer internal units.
///
/// Lengths are stored as `i32` internal units. Values are clamped to
/// `i32::MAX * 0.7071` (~1/sqrt(2)) so that a coordinate rotated by 45
/// degrees cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    pub iu_per_mm: f64,
}

impl UnitScale {
    pub const SCHEMATIC: UnitScale = UnitScale { iu_per_mm: SCH_IU_PER_MM };
    pub const BOARD: UnitScale = UnitScale { iu_per_mm: PCB_IU_PER_MM };

    pub fn mm_to_iu(&self, mm: f64) -> i32 {
        let limit = i32::MAX as f64 * 0.7071;
        (mm * self.iu_per_mm).clamp(-limit, limit).round() as i32
    }

    pub fn iu_to_mm(&self, iu: i32) -> f64 {
        iu as f64 / self.iu_per_mm
    }

    /// Mils (thousandths of an inch) to internal units; legacy defaults such
    /// as the schematic line width are specified in mils.
    pub fn mils_to_iu(&self, mils: f64) -> i32 {
        self.mm_to_iu(mils * 0.0254)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_ordinary_lengths() {
        let s = UnitScale::SCHEMATIC;
        assert_eq!(s.mm_to_iu(1.27), 12700);
        assert!((s.iu_to_mm(12700) - 1.27).abs() < 1e-9);
    }

    #[test]
    fn clamps_overflowing_lengths() {
        let s = UnitScale::BOARD;
        let max = s.mm_to_iu(1e15);
        let expected = (i32::MAX as f64 * 0.7071).round() as i32;
        assert_eq!(max, expected);
        assert_eq!(s.mm_to_iu(-1e15), -expected);
    }

    #[test]
    fn default_line_width_in_mils() {
        // 6 mils is the historic schematic default line width.
        assert_eq!(UnitScale::SCHEMATIC.mils_to_iu(6.0), 1524);
    }
}
