use serde::{Deserialize, Serialize};

use crate::layer::{CopperKind, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DielectricForm {
    Core,
    Prepreg,
}

/// One dielectric sublayer. A single stackup dielectric can be built from
/// several sublayers of different materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DielectricSublayer {
    pub name: String,
    pub thickness: i32,
    pub material: Option<String>,
    pub epsilon_r: Option<f64>,
    pub loss_tangent: Option<f64>,
}

/// One entry of the physical board stackup, top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackupLayer {
    Copper {
        layer: Layer,
        name: String,
        kind: CopperKind,
        /// Zero for dummy layers inserted to balance the stack.
        thickness: i32,
    },
    Dielectric {
        form: DielectricForm,
        sublayers: Vec<DielectricSublayer>,
    },
}

/// An ordered physical stackup. Copper count is always even: importers that
/// meet an odd source stack insert a zero-thickness dummy copper layer
/// rather than emit an unbalanced board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardStackup {
    pub layers: Vec<StackupLayer>,
}

impl BoardStackup {
    pub fn copper_count(&self) -> usize {
        self.layers.iter().filter(|l| matches!(l, StackupLayer::Copper { .. })).count()
    }

    pub fn is_balanced(&self) -> bool {
        self.copper_count() % 2 == 0
    }

    pub fn copper_layers(&self) -> impl Iterator<Item = &StackupLayer> {
        self.layers.iter().filter(|l| matches!(l, StackupLayer::Copper { .. }))
    }

    /// Total physical thickness in internal units.
    pub fn thickness(&self) -> i64 {
        self.layers
            .iter()
            .map(|l| match l {
                StackupLayer::Copper { thickness, .. } => i64::from(*thickness),
                StackupLayer::Dielectric { sublayers, .. } => {
                    sublayers.iter().map(|s| i64::from(s.thickness)).sum()
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_thickness() {
        let stackup = BoardStackup {
            layers: vec![
                StackupLayer::Copper {
                    layer: Layer::FCu,
                    name: "Top".into(),
                    kind: CopperKind::Signal,
                    thickness: 35,
                },
                StackupLayer::Dielectric {
                    form: DielectricForm::Core,
                    sublayers: vec![DielectricSublayer {
                        name: "FR4".into(),
                        thickness: 1500,
                        material: Some("FR4".into()),
                        epsilon_r: Some(4.5),
                        loss_tangent: Some(0.02),
                    }],
                },
                StackupLayer::Copper {
                    layer: Layer::BCu,
                    name: "Bottom".into(),
                    kind: CopperKind::Signal,
                    thickness: 35,
                },
            ],
        };

        assert_eq!(stackup.copper_count(), 2);
        assert!(stackup.is_balanced());
        assert_eq!(stackup.thickness(), 1570);
    }
}
