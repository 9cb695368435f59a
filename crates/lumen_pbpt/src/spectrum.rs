//! Spectra and RGB reflectance values of PBPT scenes.
//!
//! Reflectance spectra are converted to linear sRGB by integrating them
//! against the CIE 1931 2° colour matching functions under D65, sampled every
//! 10 nm from 380 to 780 nm. The result is white balanced so that a constant
//! spectrum maps to an equal-energy grey.

use glam::Vec3;
use lumen_core::errors::{LumenError, Result};
use lumen_scene::{PbptSpectrum, PbptSpectrumPoint};

const LAMBDA_START_NM: f32 = 380.0;
const LAMBDA_STEP_NM: f32 = 10.0;

/// `(x̄, ȳ, z̄)` from 380 nm to 780 nm.
#[rustfmt::skip]
const CIE_1931_XYZ: [[f32; 3]; 41] = [
    [0.001368, 0.000039, 0.006450], [0.004243, 0.000120, 0.020050],
    [0.014310, 0.000396, 0.067850], [0.043510, 0.001210, 0.207400],
    [0.134380, 0.004000, 0.645600], [0.283900, 0.011600, 1.385600],
    [0.348280, 0.023000, 1.747060], [0.336200, 0.038000, 1.772110],
    [0.290800, 0.060000, 1.669200], [0.195360, 0.090980, 1.287640],
    [0.095640, 0.139020, 0.812950], [0.032010, 0.208020, 0.465180],
    [0.004900, 0.323000, 0.272000], [0.009300, 0.503000, 0.158200],
    [0.063270, 0.710000, 0.078250], [0.165500, 0.862000, 0.042160],
    [0.290400, 0.954000, 0.020300], [0.433450, 0.994950, 0.008750],
    [0.594500, 0.995000, 0.003900], [0.762100, 0.952000, 0.002100],
    [0.916300, 0.870000, 0.001650], [1.026300, 0.757000, 0.001100],
    [1.062200, 0.631000, 0.000800], [1.002600, 0.503000, 0.000340],
    [0.854450, 0.381000, 0.000190], [0.642400, 0.265000, 0.000050],
    [0.447900, 0.175000, 0.000020], [0.283500, 0.107000, 0.000000],
    [0.164900, 0.061000, 0.000000], [0.087400, 0.032000, 0.000000],
    [0.046770, 0.017000, 0.000000], [0.022700, 0.008210, 0.000000],
    [0.011359, 0.004102, 0.000000], [0.005790, 0.002091, 0.000000],
    [0.002899, 0.001047, 0.000000], [0.001440, 0.000520, 0.000000],
    [0.000690, 0.000249, 0.000000], [0.000332, 0.000120, 0.000000],
    [0.000166, 0.000060, 0.000000], [0.000083, 0.000030, 0.000000],
    [0.000042, 0.000015, 0.000000],
];

/// Relative spectral power of CIE illuminant D65 on the same grid.
#[rustfmt::skip]
const CIE_D65: [f32; 41] = [
    49.9755, 54.6482, 82.7549, 91.4860, 93.4318, 86.6823, 104.865, 117.008,
    117.812, 114.861, 115.923, 108.811, 109.354, 107.802, 104.790, 107.689,
    104.405, 104.046, 100.000, 96.3342, 95.7880, 88.6856, 90.0062, 89.5991,
    87.6987, 83.2886, 83.6992, 80.0268, 80.2146, 82.2778, 78.2842, 69.7213,
    71.6091, 74.3490, 61.6040, 69.8856, 75.0870, 63.5927, 46.4182, 66.8054,
    63.3828,
];

/// Evaluates a piecewise-linear spectrum; values beyond the first and last
/// samples are held constant.
fn sample(points: &[PbptSpectrumPoint], lambda_nm: f32) -> f32 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if lambda_nm <= first.lambda_nm {
        return first.value;
    }
    if lambda_nm >= last.lambda_nm {
        return last.value;
    }
    let upper = points.partition_point(|point| point.lambda_nm < lambda_nm);
    let (a, b) = (points[upper - 1], points[upper]);
    let t = (lambda_nm - a.lambda_nm) / (b.lambda_nm - a.lambda_nm);
    a.value + (b.value - a.value) * t
}

fn xyz_to_linear_srgb(xyz: Vec3) -> Vec3 {
    Vec3::new(
        3.240_454_2 * xyz.x - 1.537_138_5 * xyz.y - 0.498_531_4 * xyz.z,
        -0.969_266 * xyz.x + 1.876_010_8 * xyz.y + 0.041_556 * xyz.z,
        0.055_643_4 * xyz.x - 0.204_025_9 * xyz.y + 1.057_225_2 * xyz.z,
    )
}

fn reflectance_xyz(points: &[PbptSpectrumPoint]) -> Vec3 {
    let mut xyz = Vec3::ZERO;
    let mut white_y = 0.0;
    for (index, (cmf, illuminant)) in CIE_1931_XYZ.iter().zip(CIE_D65).enumerate() {
        let lambda_nm = LAMBDA_START_NM + LAMBDA_STEP_NM * index as f32;
        let weight = sample(points, lambda_nm) * illuminant;
        xyz += Vec3::from_array(*cmf) * weight;
        white_y += cmf[1] * illuminant;
    }
    xyz / white_y
}

fn white_point_rgb() -> Vec3 {
    let white = [PbptSpectrumPoint {
        lambda_nm: LAMBDA_START_NM,
        value: 1.0,
    }];
    xyz_to_linear_srgb(reflectance_xyz(&white))
}

/// Linear sRGB of `spectrum` without clamping the upper end. Negative
/// components are clipped to zero.
pub fn spectrum_to_linear_rgb(spectrum: &PbptSpectrum) -> Result<Vec3> {
    spectrum.validate("spectrum")?;
    let rgb = xyz_to_linear_srgb(reflectance_xyz(&spectrum.points)) / white_point_rgb();
    Ok(rgb.max(Vec3::ZERO))
}

/// Linear sRGB of a reflectance spectrum, clamped to `[0, 1]`.
pub fn spectrum_to_rgb(spectrum: &PbptSpectrum) -> Result<Vec3> {
    Ok(spectrum_to_linear_rgb(spectrum)?.clamp(Vec3::ZERO, Vec3::ONE))
}

/// Rejects reflectance components outside `[0, 1]`.
pub fn validate_rgb(rgb: Vec3, field_name: &str) -> Result<()> {
    if rgb.to_array().iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c)) {
        return Ok(());
    }
    Err(LumenError::invariant(format!(
        "{field_name} must have components in [0, 1], got ({}, {}, {}).",
        rgb.x, rgb.y, rgb.z
    )))
}

/// Deduplication key of an RGB reflectance.
#[must_use]
pub fn rgb_key(rgb: Vec3) -> String {
    format!("rgb:{:.6} {:.6} {:.6}", rgb.x, rgb.y, rgb.z)
}

/// Parses `"λ:v, λ:v, ..."`. Empty tokens are skipped.
pub fn parse_spectrum(text: &str, field_name: &str) -> Result<PbptSpectrum> {
    let mut points = Vec::new();
    for token in text.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let malformed = || LumenError::invalid_argument(format!("{field_name} token must be formatted as lambda:value."));
        let (lambda, value) = token.split_once(':').ok_or_else(malformed)?;
        let (lambda, value) = (lambda.trim(), value.trim());
        if lambda.is_empty() || value.is_empty() {
            return Err(malformed());
        }
        let non_numeric =
            |_| LumenError::invalid_argument(format!("{field_name} contains non-numeric spectrum value."));
        points.push(PbptSpectrumPoint {
            lambda_nm: lambda.parse().map_err(non_numeric)?,
            value: value.parse().map_err(non_numeric)?,
        });
    }
    let spectrum = PbptSpectrum { points };
    spectrum.validate(field_name)?;
    Ok(spectrum)
}

/// Parses a list of floats separated by whitespace and/or commas.
pub fn parse_float_list(text: &str, field_name: &str) -> Result<Vec<f32>> {
    let values = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| LumenError::invalid_argument(format!("{field_name} contains non-numeric value '{token}'.")))
        })
        .collect::<Result<Vec<_>>>()?;
    if values.is_empty() {
        return Err(LumenError::invalid_argument(format!("{field_name} has no numeric values.")));
    }
    Ok(values)
}

pub fn parse_vec3(text: &str, field_name: &str) -> Result<Vec3> {
    match parse_float_list(text, field_name)?.as_slice() {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(LumenError::invalid_argument(format!("{field_name} must have exactly 3 values."))),
    }
}

/// Parses three reflectance components and checks they lie in `[0, 1]`.
pub fn parse_rgb(text: &str, field_name: &str) -> Result<Vec3> {
    let rgb = parse_vec3(text, field_name)?;
    validate_rgb(rgb, field_name)?;
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn constant_spectrum_maps_to_grey() {
        let rgb = spectrum_to_rgb(&PbptSpectrum::constant(0.7)).unwrap();
        assert_abs_diff_eq!(rgb.x, 0.7, epsilon = 1e-4);
        assert_abs_diff_eq!(rgb.y, 0.7, epsilon = 1e-4);
        assert_abs_diff_eq!(rgb.z, 0.7, epsilon = 1e-4);
    }

    #[test]
    fn long_wavelengths_look_red() {
        let red = PbptSpectrum::from_pairs(&[(400.0, 0.0), (560.0, 0.0), (620.0, 0.9), (700.0, 0.9)]);
        let rgb = spectrum_to_rgb(&red).unwrap();
        assert!(rgb.x > rgb.y && rgb.x > rgb.z, "{rgb:?}");
    }

    #[test]
    fn emission_is_not_clamped() {
        let rgb = spectrum_to_linear_rgb(&PbptSpectrum::constant(8.0)).unwrap();
        assert_abs_diff_eq!(rgb.y, 8.0, epsilon = 1e-3);
        assert_eq!(spectrum_to_rgb(&PbptSpectrum::constant(8.0)).unwrap(), Vec3::ONE);
    }

    #[test]
    fn spectrum_parsing() {
        let spectrum = parse_spectrum(" 400:0.1, 500 : 0.2,, 600:0.3 ", "s").unwrap();
        assert_eq!(spectrum.points.len(), 3);
        assert_eq!(spectrum.points[1], PbptSpectrumPoint { lambda_nm: 500.0, value: 0.2 });

        assert!(parse_spectrum("400=0.1", "s").is_err());
        assert!(parse_spectrum("400:abc", "s").is_err());
        assert!(parse_spectrum("500:0.1, 400:0.1", "s").is_err());
        assert!(parse_spectrum("", "s").is_err());
    }

    #[test]
    fn rgb_parsing_accepts_spaces_and_commas() {
        assert_eq!(parse_rgb("0.1 0.2 0.3", "c").unwrap(), Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(parse_rgb("0.1, 0.2,0.3", "c").unwrap(), Vec3::new(0.1, 0.2, 0.3));
        assert!(parse_rgb("0.1 0.2", "c").is_err());
        assert!(parse_rgb("0.1 0.2 1.5", "c").is_err());
    }

    #[test]
    fn rgb_keys_collapse_equal_colors() {
        assert_eq!(rgb_key(Vec3::splat(0.5)), rgb_key(Vec3::new(0.5, 0.5, 0.500_000_01)));
        assert_ne!(rgb_key(Vec3::splat(0.5)), rgb_key(Vec3::splat(0.6)));
    }
}
