//! Gamma and white-balance correction tables.
//!
//! Tables are built once when the fade engine is constructed and map the
//! 0-255 logical scale onto the backend's grayscale resolution. Gamma is
//! applied in exactly one place: the conversion layer's color power limit
//! reads [`GammaGroup::rgb`]; the engine itself only applies white balance
//! (RGB channels) and the linear table (white channels).

/// Logical input resolution of every table.
pub const TABLE_SIZE: usize = 256;

/// Gamma curve selection.
#[derive(Debug, Clone, Copy)]
pub enum CurveCoefficients {
    /// One curve shared by all three color channels.
    Common(f32),
    /// Independent curve per color channel.
    PerChannel { red: f32, green: f32, blue: f32 },
}

/// Per-channel scale factors correcting inter-channel intensity mismatch.
///
/// Coefficients are expected in `0.0..=1.0`.
#[derive(Debug, Clone, Copy)]
pub struct WhiteBalance {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// Gamma configuration supplied at engine construction.
#[derive(Debug, Clone, Copy)]
pub struct GammaConfig {
    pub curve: CurveCoefficients,
    pub balance: Option<WhiteBalance>,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            curve: CurveCoefficients::Common(1.0),
            balance: None,
        }
    }
}

enum TableGroup {
    Common([u16; TABLE_SIZE]),
    PerChannel([[u16; TABLE_SIZE]; 3]),
}

/// Correction tables owned by the fade engine.
pub struct GammaGroup {
    tables: TableGroup,
    linear: [u16; TABLE_SIZE],
    balance: [f32; 3],
}

impl GammaGroup {
    pub(crate) fn new(config: &GammaConfig, grayscale_levels: u32, max_input_value: u16) -> Self {
        let tables = match config.curve {
            CurveCoefficients::Common(curve) => {
                TableGroup::Common(build_table(curve, grayscale_levels, max_input_value))
            }
            CurveCoefficients::PerChannel { red, green, blue } => TableGroup::PerChannel([
                build_table(red, grayscale_levels, max_input_value),
                build_table(green, grayscale_levels, max_input_value),
                build_table(blue, grayscale_levels, max_input_value),
            ]),
        };
        let balance = config
            .balance
            .map_or([1.0, 1.0, 1.0], |b| [b.red, b.green, b.blue]);

        Self {
            tables,
            linear: build_table(1.0, grayscale_levels, max_input_value),
            balance,
        }
    }

    /// Engine construction from caller-supplied 256-entry tables, for
    /// hardware calibrated outside this crate.
    pub(crate) fn with_custom_tables(
        tables: &[[u16; TABLE_SIZE]; 3],
        grayscale_levels: u32,
        max_input_value: u16,
        balance: Option<WhiteBalance>,
    ) -> Self {
        Self {
            tables: TableGroup::PerChannel(*tables),
            linear: build_table(1.0, grayscale_levels, max_input_value),
            balance: balance.map_or([1.0, 1.0, 1.0], |b| [b.red, b.green, b.blue]),
        }
    }

    /// Gamma-map an 8-bit RGB triple onto the backend's grayscale range.
    pub fn rgb(&self, r: u8, g: u8, b: u8) -> (u16, u16, u16) {
        match &self.tables {
            TableGroup::Common(table) => {
                (table[r as usize], table[g as usize], table[b as usize])
            }
            TableGroup::PerChannel(group) => (
                group[0][r as usize],
                group[1][g as usize],
                group[2][b as usize],
            ),
        }
    }

    /// Linear (gamma 1.0) mapping used for the white channels.
    pub fn linear(&self, input: u8) -> u16 {
        self.linear[input as usize]
    }

    /// White-balance coefficient for an RGB channel slot.
    pub(crate) fn balance(&self, channel: usize) -> f32 {
        self.balance[channel]
    }
}

/// Build a monotonic mapping table `out[i] = (i/255)^(1/curve) * levels`.
///
/// The top entry is pinned to the hardware's maximum accepted input so a
/// full-scale logical value always reaches full hardware output.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_table(curve: f32, grayscale_levels: u32, max_input_value: u16) -> [u16; TABLE_SIZE] {
    let mut table = [0u16; TABLE_SIZE];
    for (i, slot) in table.iter_mut().enumerate() {
        let x = i as f32 / (TABLE_SIZE - 1) as f32;
        *slot = (libm::powf(x, 1.0 / curve) * grayscale_levels as f32) as u16;
    }
    table[TABLE_SIZE - 1] = max_input_value;
    table
}
