use loam::framework::{Instruments, NodeId};

/// Synthetic stand-ins for the ADC inputs and the battery gauge. Raw
/// readings wander over a 12-bit range; the conversions match the deployed
/// sensor boards.
pub struct FieldInstruments {
    battery_mv: u16,
    phase: u32,
}

impl Default for FieldInstruments {
    fn default() -> Self {
        Self {
            battery_mv: 3300,
            phase: 0,
        }
    }
}

impl FieldInstruments {
    /// Give each mote its own battery level so link costs differ.
    pub fn calibrate(&mut self, id: NodeId) {
        self.battery_mv = 3200 + 17 * id as u16;
        self.phase = id as u32 * 7;
    }

    fn raw_adc(&mut self) -> u16 {
        self.phase = self.phase.wrapping_add(173);
        (1024 + self.phase.wrapping_mul(37) % 2048) as u16
    }
}

impl Instruments for FieldInstruments {
    fn battery_value(&mut self) -> u16 {
        // batteries only drain
        if self.battery_mv > 2600 {
            self.battery_mv -= 1;
        }
        self.battery_mv
    }

    fn sensor_sample(&mut self, node: NodeId) -> u16 {
        let raw = self.raw_adc();
        let value = match node {
            2 => temperature_celsius(raw).max(0.0),
            4 => soil_moisture(raw, 592.0, 907.0),
            6 => soil_moisture(raw, 621.0, 930.0),
            8 => light_lux(raw),
            // the pH board compensates with the internal temperature sensor
            10 => {
                let board_temp = temperature_celsius(self.raw_adc());
                ph_level(raw, board_temp) * 100.0
            }
            12 => humidity_percent(raw).max(0.0),
            _ => raw as f32,
        };
        value.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

fn temperature_celsius(raw: u16) -> f32 {
    222.2 * (raw as f32 / 4096.0) - 61.111
}

fn humidity_percent(raw: u16) -> f32 {
    190.6 * (raw as f32 / 4096.0) - 40.2 - 128.0
}

fn ph_level(raw: u16, board_temp: f32) -> f32 {
    (2.5 - raw as f32 * 5.0 / 4096.0) / (0.257179 + 0.000941468 * board_temp)
}

fn soil_moisture(raw: u16, dry: f32, wet: f32) -> f32 {
    ((1.0 - (raw as f32 - dry) / (wet - dry)) * 100.0).clamp(0.0, 100.0)
}

fn light_lux(raw: u16) -> f32 {
    (1.2179 * (raw as f32 * 3.3 / 4096.0) * 200.0 + 36.996).min(1000.0)
}
