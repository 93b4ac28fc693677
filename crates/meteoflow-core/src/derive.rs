use once_cell::sync::Lazy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("{func} expects {expected} auxiliary input(s), got {found}")]
    MissingInput {
        func: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no soil-moisture calibration for site '{site}' at depth {depth} m")]
    UnknownCalibration { site: String, depth: f64 },
}

/// Context a derived function may need beyond its input series.
#[derive(Debug, Clone)]
pub struct DeriveContext {
    /// Site identifier, e.g. "ch-cha"; selects calibration constants.
    pub site: String,
    /// Sensor depth in metres, read from the vpos token of the canonical
    /// field name.
    pub depth: f64,
}

/// The fixed set of derived-variable computations. Not user-extensible:
/// each function encodes one known correction with constants from the
/// historical screening configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedFunction {
    /// Temperature compensation for O2 sensors.
    CorrectO2,
    /// Long-wave incoming radiation from the raw thermopile signal and the
    /// radiation-sensor temperature (Stefan-Boltzmann).
    CalcLwin,
    /// Soil water content from the dielectric signal in mV.
    CalcSwcFromSdp,
}

impl DerivedFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "correct_o2" => Some(DerivedFunction::CorrectO2),
            "calc_lwin" => Some(DerivedFunction::CalcLwin),
            "calc_swc_from_sdp" => Some(DerivedFunction::CalcSwcFromSdp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DerivedFunction::CorrectO2 => "correct_o2",
            DerivedFunction::CalcLwin => "calc_lwin",
            DerivedFunction::CalcSwcFromSdp => "calc_swc_from_sdp",
        }
    }

    /// Auxiliary series required on top of the primary input.
    pub fn aux_inputs(&self) -> usize {
        match self {
            DerivedFunction::CorrectO2 => 1,
            DerivedFunction::CalcLwin => 1,
            DerivedFunction::CalcSwcFromSdp => 0,
        }
    }

    /// Canonical field of the derived variable when the descriptor does not
    /// assign one explicitly.
    pub fn default_field(&self, primary_field: &str) -> String {
        match self {
            DerivedFunction::CorrectO2 => primary_field.replacen("O2", "O2C", 1),
            DerivedFunction::CalcLwin => primary_field.replacen("_RAW", "", 1),
            DerivedFunction::CalcSwcFromSdp => primary_field.replacen("SDP", "SWC", 1),
        }
    }

    pub fn default_measurement(&self) -> &'static str {
        match self {
            DerivedFunction::CorrectO2 => "O2",
            DerivedFunction::CalcLwin => "LW",
            DerivedFunction::CalcSwcFromSdp => "SWC",
        }
    }

    pub fn default_units(&self) -> &'static str {
        match self {
            DerivedFunction::CorrectO2 => "%",
            DerivedFunction::CalcLwin => "W m-2",
            DerivedFunction::CalcSwcFromSdp => "%",
        }
    }

    /// Runs the computation element-wise. Rows where any input is missing
    /// yield a missing output.
    pub fn apply(
        &self,
        primary: &[Option<f64>],
        aux: &[Vec<Option<f64>>],
        context: &DeriveContext,
    ) -> Result<Vec<Option<f64>>, DeriveError> {
        if aux.len() < self.aux_inputs() {
            return Err(DeriveError::MissingInput {
                func: self.name(),
                expected: self.aux_inputs(),
                found: aux.len(),
            });
        }

        match self {
            DerivedFunction::CorrectO2 => {
                Ok(zip_map(primary, &aux[0], |o2, t| {
                    o2 + 1.975044 - 0.1037942 * t
                }))
            }
            DerivedFunction::CalcLwin => Ok(zip_map(primary, &aux[0], |raw, t| {
                5.67037e-8 * (t + 273.15).powi(4) + raw
            })),
            DerivedFunction::CalcSwcFromSdp => {
                let calibration = SdpCalibration::for_site(&context.site, context.depth)
                    .ok_or_else(|| DeriveError::UnknownCalibration {
                        site: context.site.clone(),
                        depth: context.depth,
                    })?;
                Ok(primary
                    .iter()
                    .map(|value| value.map(|mv| calibration.swc_from_millivolts(mv)))
                    .collect())
            }
        }
    }
}

fn zip_map(
    a: &[Option<f64>],
    b: &[Option<f64>],
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}

/// Gravimetric calibration constants for one sensor installation depth.
#[derive(Debug, Clone, Copy)]
pub struct SdpCalibration {
    /// Sample volume (ml).
    pub l: f64,
    /// Wet reference signal (mV).
    pub v_w: f64,
    /// Wet reference weight (g).
    pub w_w: f64,
    /// Dry reference signal (mV).
    pub v_d: f64,
    /// Dry reference weight (g).
    pub w_d: f64,
}

/// Per-site calibration brackets: the first entry whose maximum depth is
/// not exceeded applies.
static SDP_CALIBRATIONS: Lazy<Vec<(&'static str, Vec<(f64, SdpCalibration)>)>> =
    Lazy::new(|| {
        vec![
            (
                "ch-cha",
                vec![
                    (
                        0.1,
                        SdpCalibration {
                            l: 0.950,
                            v_w: 0.879,
                            w_w: 1.443,
                            v_d: 0.0824,
                            w_d: 0.966,
                        },
                    ),
                    (
                        f64::INFINITY,
                        SdpCalibration {
                            l: 0.910,
                            v_w: 0.863,
                            w_w: 1.505,
                            v_d: 0.0661,
                            w_d: 1.1134,
                        },
                    ),
                ],
            ),
            (
                "ch-fru",
                vec![
                    (
                        0.1,
                        SdpCalibration {
                            l: 0.975,
                            v_w: 0.85,
                            w_w: 1.147,
                            v_d: 0.0563,
                            w_d: 0.715,
                        },
                    ),
                    (
                        0.2,
                        SdpCalibration {
                            l: 0.47,
                            v_w: 0.603,
                            w_w: 0.647,
                            v_d: 0.0442,
                            w_d: 0.478,
                        },
                    ),
                    (
                        1.2,
                        SdpCalibration {
                            l: 0.45,
                            v_w: 0.704,
                            w_w: 0.756,
                            v_d: 0.0451,
                            w_d: 0.558,
                        },
                    ),
                ],
            ),
        ]
    });

impl SdpCalibration {
    pub fn for_site(site: &str, depth: f64) -> Option<SdpCalibration> {
        let site = site.to_ascii_lowercase();
        let brackets = SDP_CALIBRATIONS
            .iter()
            .find(|(name, _)| *name == site)
            .map(|(_, brackets)| brackets)?;
        brackets
            .iter()
            .find(|(max_depth, _)| depth <= *max_depth)
            .map(|(_, calibration)| *calibration)
    }

    /// Dielectric polynomial shared by signal and reference conversions.
    fn poly(v: f64) -> f64 {
        1.07 + 6.4 * v - 6.4 * v.powi(2) + 4.7 * v.powi(3)
    }

    /// Soil water content in % from the raw signal in mV.
    pub fn swc_from_millivolts(&self, millivolts: f64) -> f64 {
        let x = millivolts / 1000.0;
        let e_w_sqr = Self::poly(self.v_w);
        let e_d_sqr = Self::poly(self.v_d);
        let theta_w = (self.w_w - self.w_d) / self.l;
        let a_0 = e_d_sqr;
        let a_1 = (e_w_sqr - e_d_sqr) / theta_w;
        let theta = (Self::poly(x) - a_0) / a_1;
        theta * 100.0
    }
}
