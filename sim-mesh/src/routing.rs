use loam::framework::{MeshSystem, ProtocolParams};

use crate::instruments::FieldInstruments;

/// The simulated deployment: the reference timer plan over synthetic field
/// sensors. One simulated second passes per scheduler tick.
pub struct FieldSystem;

impl MeshSystem for FieldSystem {
    type Instruments = FieldInstruments;

    fn params() -> ProtocolParams {
        ProtocolParams::default()
    }
}
